//! NVS-backed configuration and key-value storage adapter.
//!
//! Implements [`StoragePort`] over the ESP-IDF NVS partition and
//! [`ConfigPort`] on top of it: the [`SystemConfig`] is stored as one
//! postcard-encoded blob.  NVS writes are atomic, so a power loss mid-save
//! leaves the previous config intact.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: the default NVS partition, one namespace per subsystem.
//! On host/test: an in-memory map with the same semantics.

#[cfg(not(target_os = "espidf"))]
use core::cell::RefCell;

#[cfg(target_os = "espidf")]
use log::info;

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

/// Namespace for the controller's own keys.
const NAMESPACE: &str = "servopoint";
/// Key holding the postcard-encoded [`SystemConfig`].
const CONFIG_KEY: &str = "config";

/// Upper bound on any stored blob; the config encodes far below this.
const MAX_BLOB: usize = 1024;

pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: Option<EspDefaultNvsPartition>,
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<std::collections::HashMap<String, Vec<u8>>>,
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    /// Open the default NVS partition.
    pub fn new() -> anyhow::Result<Self> {
        let partition = EspDefaultNvsPartition::take()?;
        info!("nvs: default partition opened");
        Ok(Self { partition: Some(partition) })
    }

    fn open(&self, namespace: &str, writable: bool) -> Result<EspNvs<NvsDefault>, StorageError> {
        let partition = self.partition.clone().ok_or(StorageError::IoError)?;
        EspNvs::new(partition, namespace, writable).map_err(|_| StorageError::IoError)
    }

    fn get_blob(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let nvs = self.open(namespace, false)?;
        match nvs.get_raw(key, buf) {
            Ok(Some(data)) => Ok(data.len()),
            Ok(None) => Err(StorageError::NotFound),
            Err(_) => Err(StorageError::IoError),
        }
    }

    /// Interior-mutable write: the NVS handle is opened per call, so no
    /// `&mut self` is needed and [`ConfigPort::save`] can route through it.
    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut nvs = self.open(namespace, true)?;
        nvs.set_raw(key, data).map_err(|_| StorageError::Full)?;
        Ok(())
    }

    fn drop_blob(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut nvs = self.open(namespace, true)?;
        nvs.remove(key).map_err(|_| StorageError::IoError)?;
        Ok(())
    }

    fn has_blob(&self, namespace: &str, key: &str) -> bool {
        self.open(namespace, false)
            .and_then(|nvs| nvs.contains(key).map_err(|_| StorageError::IoError))
            .unwrap_or(false)
    }
}

#[cfg(target_os = "espidf")]
impl Default for NvsAdapter {
    /// Degraded adapter with no backing store — every read misses and
    /// every write fails.  Lets the system run on defaults when the NVS
    /// partition cannot be opened.
    fn default() -> Self {
        Self { partition: None }
    }
}

// ── Host backend ──────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    fn get_blob(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let data = store
            .get(&format!("{namespace}/{key}"))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB {
            return Err(StorageError::Full);
        }
        self.store
            .borrow_mut()
            .insert(format!("{namespace}/{key}"), data.to_vec());
        Ok(())
    }

    fn drop_blob(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.borrow_mut().remove(&format!("{namespace}/{key}"));
        Ok(())
    }

    fn has_blob(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&format!("{namespace}/{key}"))
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for NvsAdapter {
    fn default() -> Self {
        Self { store: RefCell::new(std::collections::HashMap::new()) }
    }
}

// ───────────────────────────────────────────────────────────────
// StoragePort
// ───────────────────────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.get_blob(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.drop_blob(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.has_blob(namespace, key)
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB];
        let len = match self.get_blob(NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        let config: SystemConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        // A blob that decodes but fails range validation must not reach
        // the coordinator — it would let a corrupted store wire two
        // switches to one servo.
        config.validate().map_err(ConfigError::ValidationFailed)?;
        Ok(config)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        match self.put_blob(NAMESPACE, CONFIG_KEY, &bytes) {
            Ok(()) => Ok(()),
            Err(StorageError::Full) => Err(ConfigError::StorageFull),
            Err(_) => Err(ConfigError::IoError),
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::config::BindingConfig;

    #[test]
    fn config_roundtrip() {
        let nvs = NvsAdapter::default();
        assert_eq!(nvs.load().err(), Some(ConfigError::NotFound));

        let mut config = SystemConfig::default();
        config.poll_interval_ms = 150;
        nvs.save(&config).unwrap();

        let loaded = nvs.load().unwrap();
        assert_eq!(loaded.poll_interval_ms, 150);
        assert_eq!(loaded.servos, config.servos);
    }

    #[test]
    fn corrupted_blob_is_rejected() {
        let mut nvs = NvsAdapter::default();
        nvs.write(NAMESPACE, CONFIG_KEY, &[0xff; 7]).unwrap();
        assert_eq!(nvs.load().err(), Some(ConfigError::Corrupted));
    }

    #[test]
    fn invalid_config_never_persists() {
        let nvs = NvsAdapter::default();
        let mut config = SystemConfig::default();
        config
            .bindings
            .push(BindingConfig { switch: 0, servo: 0, invert: true })
            .unwrap();
        assert!(matches!(
            nvs.save(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
        assert!(!nvs.exists(NAMESPACE, CONFIG_KEY));
    }

    #[test]
    fn storage_delete_and_exists() {
        let mut nvs = NvsAdapter::default();
        nvs.write("aux", "blob", b"abc").unwrap();
        assert!(nvs.exists("aux", "blob"));
        let mut buf = [0u8; 8];
        assert_eq!(nvs.read("aux", "blob", &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        nvs.delete("aux", "blob").unwrap();
        assert!(!nvs.exists("aux", "blob"));
    }
}
