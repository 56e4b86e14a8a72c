//! Device-local identity
//!
//! A guest device id is issued once per local profile and read back on every
//! later visit. It only correlates anonymous orders; it is never merged into an
//! account after login.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::aggregates::OrderOwner;
use crate::domain::value_objects::GuestDeviceId;
use crate::Result;

pub const GUEST_DEVICE_KEY: &str = "guestDeviceId";

/// Small string key-value storage that survives restarts on one device.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let legal = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !legal {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("illegal storage key {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(std::fs::write(self.path_for(key)?, value)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)?) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.entries.lock().get(key).cloned()) }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Returns the persisted guest id, issuing and persisting one on first use.
pub fn guest_device_id(storage: &dyn LocalStorage) -> Result<GuestDeviceId> {
    if let Some(existing) = storage.get(GUEST_DEVICE_KEY)? {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(GuestDeviceId::from(existing.to_string()));
        }
    }
    let issued = GuestDeviceId::generate();
    storage.set(GUEST_DEVICE_KEY, issued.as_str())?;
    tracing::debug!(guest_device_id = %issued, "issued guest device id");
    Ok(issued)
}

/// An authenticated user owns the order when present. Otherwise the device's guest id does.
pub fn resolve_owner(user_id: Option<&str>, storage: &dyn LocalStorage) -> Result<OrderOwner> {
    match user_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => Ok(OrderOwner::User(id.to_string())),
        None => Ok(OrderOwner::Guest(guest_device_id(storage)?.into_string())),
    }
}
