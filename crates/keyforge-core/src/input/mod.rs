// Keyforge Input Layer
// Key codes, keyboard detection and the evdev hook

mod device;
mod filter;
mod keycode;

#[cfg(feature = "native-hook")]
mod event_loop;
#[cfg(feature = "native-hook")]
mod hook;
#[cfg(feature = "native-hook")]
mod listener;

pub use device::{is_virtual_device, DeviceCapabilities, VIRTUAL_DEVICE_PREFIX};
pub use filter::DeviceFilter;
pub use keycode::{code_for, known_names, name_for};

#[cfg(feature = "native-hook")]
pub use event_loop::{
    DeviceInfo, EventLoop, EventLoopError, EventLoopResult, KeyBatch, RawKeyEvent,
};
#[cfg(feature = "native-hook")]
pub use hook::EvdevHook;
#[cfg(feature = "native-hook")]
pub use listener::EvdevKeySource;
