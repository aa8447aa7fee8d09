//! Devices
//!
//! A device serves the ports of one scheme (`memory://notes` is served by the
//! `memory` device). Operations may answer [`DeviceStatus::Pending`]; the
//! interpreter then polls again, checking for cancellation between polls.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Outcome of one device poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no such target: {0}")]
    NotFound(String),
    #[error("handle {0} is not open")]
    BadHandle(u32),
    #[error("{0}")]
    Io(String),
}

pub trait Device {
    /// Open `target`, returning a handle for later operations
    fn open(&mut self, target: &str) -> Result<DeviceStatus<u32>, DeviceError>;

    fn read(&mut self, handle: u32) -> Result<DeviceStatus<Vec<u8>>, DeviceError>;

    /// Write `data`, returning the number of bytes taken
    fn write(&mut self, handle: u32, data: &[u8]) -> Result<DeviceStatus<usize>, DeviceError>;

    fn close(&mut self, handle: u32) -> Result<(), DeviceError>;
}

/// In-memory byte stores keyed by target name. Writes append; reads return
/// the whole store. `with_latency(n)` makes every operation answer
/// `Pending` `n` times before it completes.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    stores: FxHashMap<String, Vec<u8>>,
    handles: FxHashMap<u32, String>,
    next_handle: u32,
    latency: u32,
    waiting: u32,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: u32) -> Self {
        MemoryDevice {
            latency,
            waiting: latency,
            ..Self::default()
        }
    }

    /// Contents of a store, for inspection from the host
    pub fn contents(&self, target: &str) -> Option<&[u8]> {
        self.stores.get(target).map(Vec::as_slice)
    }

    /// Count down the simulated latency; true once the operation may finish
    fn ready(&mut self) -> bool {
        if self.waiting > 0 {
            self.waiting -= 1;
            return false;
        }
        self.waiting = self.latency;
        true
    }

    fn target(&self, handle: u32) -> Result<&String, DeviceError> {
        self.handles.get(&handle).ok_or(DeviceError::BadHandle(handle))
    }
}

impl Device for MemoryDevice {
    fn open(&mut self, target: &str) -> Result<DeviceStatus<u32>, DeviceError> {
        if !self.ready() {
            return Ok(DeviceStatus::Pending);
        }
        self.stores.entry(target.to_string()).or_default();
        self.next_handle += 1;
        self.handles.insert(self.next_handle, target.to_string());
        Ok(DeviceStatus::Ready(self.next_handle))
    }

    fn read(&mut self, handle: u32) -> Result<DeviceStatus<Vec<u8>>, DeviceError> {
        let target = self.target(handle)?.clone();
        if !self.ready() {
            return Ok(DeviceStatus::Pending);
        }
        match self.stores.get(&target) {
            Some(bytes) => Ok(DeviceStatus::Ready(bytes.clone())),
            None => Err(DeviceError::NotFound(target)),
        }
    }

    fn write(&mut self, handle: u32, data: &[u8]) -> Result<DeviceStatus<usize>, DeviceError> {
        let target = self.target(handle)?.clone();
        if !self.ready() {
            return Ok(DeviceStatus::Pending);
        }
        self.stores.entry(target).or_default().extend_from_slice(data);
        Ok(DeviceStatus::Ready(data.len()))
    }

    fn close(&mut self, handle: u32) -> Result<(), DeviceError> {
        self.handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(DeviceError::BadHandle(handle))
    }
}

/// Devices by scheme name
pub struct DeviceRegistry {
    devices: FxHashMap<String, Box<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry {
            devices: FxHashMap::default(),
        }
    }

    /// Registry with the `memory` scheme
    pub fn with_builtins() -> Self {
        let mut registry = DeviceRegistry::new();
        registry.register("memory", Box::new(MemoryDevice::new()));
        registry
    }

    pub fn register(&mut self, scheme: &str, device: Box<dyn Device>) {
        log::debug!("registered device for scheme {}", scheme);
        self.devices.insert(scheme.to_lowercase(), device);
    }

    pub fn get_mut(&mut self, scheme: &str) -> Option<&mut (dyn Device + 'static)> {
        self.devices.get_mut(&scheme.to_lowercase()).map(|device| device.as_mut())
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.devices.contains_key(&scheme.to_lowercase())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_device_round_trip() {
        let mut device = MemoryDevice::new();
        let DeviceStatus::Ready(handle) = device.open("notes").unwrap() else {
            panic!("open should complete immediately");
        };
        assert_eq!(device.write(handle, b"ab").unwrap(), DeviceStatus::Ready(2));
        assert_eq!(device.write(handle, b"c").unwrap(), DeviceStatus::Ready(1));
        assert_eq!(device.read(handle).unwrap(), DeviceStatus::Ready(b"abc".to_vec()));
        device.close(handle).unwrap();
        assert_eq!(device.read(handle), Err(DeviceError::BadHandle(handle)));
    }

    #[test]
    fn test_latency_answers_pending_first() {
        let mut device = MemoryDevice::with_latency(2);
        assert_eq!(device.open("x").unwrap(), DeviceStatus::Pending);
        assert_eq!(device.open("x").unwrap(), DeviceStatus::Pending);
        assert!(matches!(device.open("x").unwrap(), DeviceStatus::Ready(_)));
    }
}
