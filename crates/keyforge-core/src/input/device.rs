// Keyforge Input Layer - Device Detection
// Decides which event devices are real keyboards

use std::collections::HashSet;

/// Name prefix of the virtual keyboard keyforge creates for its own output.
/// Devices carrying it are never grabbed, or output would loop back as input.
pub const VIRTUAL_DEVICE_PREFIX: &str = "Keyforge (virtual)";

// Q W E R T Y
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];

// SPACE, A, Z
const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44];

/// Key capabilities of an input device
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub has_ev_key: bool,
    keys: HashSet<u16>,
}

impl DeviceCapabilities {
    pub fn new<I: IntoIterator<Item = u16>>(has_ev_key: bool, keys: I) -> Self {
        Self {
            has_ev_key,
            keys: keys.into_iter().collect(),
        }
    }

    pub fn supports_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    /// A keyboard reports EV_KEY with the QWERTY row, A, Z and SPACE.
    ///
    /// Mice, power buttons and media remotes also report EV_KEY but lack
    /// the letter block.
    pub fn is_keyboard(&self) -> bool {
        self.has_ev_key
            && QWERTY_CODES
                .iter()
                .chain(A_Z_SPACE_CODES)
                .all(|code| self.supports_key(*code))
    }
}

pub fn is_virtual_device(name: &str) -> bool {
    name.starts_with(VIRTUAL_DEVICE_PREFIX)
}
