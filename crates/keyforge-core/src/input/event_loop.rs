// Keyforge Event Loop
// Direct evdev access: discovery, exclusive grab and poll(2) over all keyboards

use std::io;
use std::os::unix::io::AsRawFd;

use evdev::{Device, EventType, InputEvent};
use log::{debug, warn};
use smallvec::SmallVec;

use super::device::{is_virtual_device, DeviceCapabilities};
use super::filter::DeviceFilter;

pub type EventLoopResult<T> = Result<T, EventLoopError>;

/// Key events from one poll; a poll rarely yields more than a few
pub type KeyBatch = SmallVec<[RawKeyEvent; 8]>;

#[derive(Debug, thiserror::Error)]
pub enum EventLoopError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EventLoopError {
    fn from_io(err: io::Error, what: &str) -> Self {
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => {
                EventLoopError::Permission(format!("{}: {}", what, err))
            }
            _ => EventLoopError::Io(err),
        }
    }
}

/// A keyboard found during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub path: String,
}

/// A key transition read from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub code: u16,
    pub value: i32,
}

impl RawKeyEvent {
    fn from_input(event: &InputEvent) -> Option<Self> {
        (event.event_type() == EventType::KEY).then(|| Self {
            code: event.code(),
            value: event.value(),
        })
    }
}

/// The selected keyboards, optionally grabbed.
///
/// Grabbed devices deliver their events to us only, which is what makes
/// suppression possible. The grab is released on drop, including while
/// unwinding, so a crash never leaves the keyboard dead.
pub struct EventLoop {
    devices: Vec<(DeviceInfo, Device)>,
    poll_fds: Vec<libc::pollfd>,
    grabbed: bool,
}

impl EventLoop {
    /// Open the keyboards selected by `filter`, grabbing them when asked
    pub fn open(filter: &DeviceFilter, grab: bool) -> EventLoopResult<Self> {
        let mut devices = Self::find_keyboards(filter)?;

        if grab {
            // A previous instance that crashed may still hold the grab
            for (_, device) in &mut devices {
                let _ = device.ungrab();
            }
            for (info, device) in &mut devices {
                device
                    .grab()
                    .map_err(|e| EventLoopError::from_io(e, &format!("grab {}", info.path)))?;
                debug!("Grabbed {} ({})", info.name, info.path);
            }
        }

        let poll_fds = devices
            .iter()
            .map(|(_, d)| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        Ok(Self {
            devices,
            poll_fds,
            grabbed: grab,
        })
    }

    /// List the keyboards `filter` would select, for `--devices`
    pub fn list_devices(filter: &DeviceFilter) -> EventLoopResult<Vec<DeviceInfo>> {
        Ok(Self::find_keyboards(filter)?
            .into_iter()
            .map(|(info, _)| info)
            .collect())
    }

    fn find_keyboards(filter: &DeviceFilter) -> EventLoopResult<Vec<(DeviceInfo, Device)>> {
        let mut keyboards = Vec::new();

        for (path, device) in evdev::enumerate() {
            let info = DeviceInfo {
                name: device.name().unwrap_or("Unknown").to_string(),
                path: path.to_string_lossy().into_owned(),
            };
            let caps = capabilities(&device);
            if filter.matches(
                &info.name,
                &info.path,
                caps.is_keyboard(),
                is_virtual_device(&info.name),
            ) {
                keyboards.push((info, device));
            }
        }

        if keyboards.is_empty() {
            // enumerate() skips nodes it cannot open, so an empty result
            // usually means missing permissions rather than missing hardware
            if let Some(denied) = first_unreadable_event_node() {
                return Err(EventLoopError::Permission(format!(
                    "cannot open {} (is the user in the 'input' group?)",
                    denied
                )));
            }
            return Err(EventLoopError::DeviceNotFound(
                "No keyboard devices found".to_string(),
            ));
        }

        Ok(keyboards)
    }

    /// Wait up to `timeout_ms` and return the key events that arrived.
    ///
    /// A timeout or EINTR yields an empty batch.
    pub fn poll_key_events(&mut self, timeout_ms: i32) -> EventLoopResult<KeyBatch> {
        let mut events = KeyBatch::new();

        // SAFETY: poll_fds is a live, correctly sized array of pollfd
        let ready = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(events);
            }
            return Err(EventLoopError::Io(err));
        }
        if ready == 0 {
            return Ok(events);
        }

        let mut gone = Vec::new();
        for (i, (info, device)) in self.devices.iter_mut().enumerate() {
            let revents = self.poll_fds[i].revents;
            if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                gone.push(i);
                continue;
            }
            if revents & libc::POLLIN == 0 {
                continue;
            }
            match device.fetch_events() {
                Ok(batch) => events.extend(batch.filter_map(|e| RawKeyEvent::from_input(&e))),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.raw_os_error() == Some(libc::ENODEV) => gone.push(i),
                Err(e) => warn!("Read from {} failed: {}", info.path, e),
            }
        }

        // Highest index first so the remaining indices stay valid
        for i in gone.into_iter().rev() {
            self.remove_device(i);
        }
        if self.devices.is_empty() {
            return Err(EventLoopError::DeviceNotFound(
                "All keyboards disconnected".to_string(),
            ));
        }

        Ok(events)
    }

    /// Stop listening to an unplugged keyboard; the others keep working
    fn remove_device(&mut self, index: usize) {
        let (info, mut device) = self.devices.remove(index);
        self.poll_fds.remove(index);
        if self.grabbed {
            let _ = device.ungrab();
        }
        warn!("Keyboard {} ({}) disconnected", info.name, info.path);
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().map(|(info, _)| info)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    pub fn ungrab_all(&mut self) {
        if self.grabbed {
            for (_, device) in &mut self.devices {
                let _ = device.ungrab();
            }
            self.grabbed = false;
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.ungrab_all();
    }
}

fn capabilities(device: &Device) -> DeviceCapabilities {
    let has_ev_key = device.supported_events().contains(EventType::KEY);
    let keys = device
        .supported_keys()
        .map(|set| set.iter().map(|k| k.code()).collect::<Vec<_>>())
        .unwrap_or_default();
    DeviceCapabilities::new(has_ev_key, keys)
}

fn first_unreadable_event_node() -> Option<String> {
    let entries = std::fs::read_dir("/dev/input").ok()?;
    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("event"))
        })
        .find(|p| {
            matches!(
                std::fs::File::open(p),
                Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied
            )
        })
        .map(|p| p.display().to_string())
}
