use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::queue::Identity;

/// Identity remembered on the device between visits.
pub trait IdentityStore {
    fn get(&self) -> Option<&Identity>;
    fn set(&mut self, identity: Identity) -> Result<(), DeviceStoreError>;
    /// Forget the identity ("trocar usuário").
    fn clear(&mut self) -> Result<(), DeviceStoreError>;
}

/// Last known session gate value, used before the first snapshot arrives.
pub trait GateCache {
    fn cached_open(&self) -> bool;
    fn remember_open(&mut self, open: bool) -> Result<(), DeviceStoreError>;
}

#[derive(Debug, Error)]
pub enum DeviceStoreError {
    #[error("failed to write device state to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialise device state")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DeviceData {
    #[serde(default)]
    user: Option<Identity>,
    #[serde(default = "default_active")]
    karaoke_active: bool,
}

impl Default for DeviceData {
    fn default() -> Self {
        Self {
            user: None,
            karaoke_active: default_active(),
        }
    }
}

fn default_active() -> bool {
    true
}

/// JSON file backing [`IdentityStore`] and [`GateCache`]. Every change is
/// written through immediately.
#[derive(Debug)]
pub struct DeviceStore {
    path: PathBuf,
    data: DeviceData,
}

impl DeviceStore {
    /// Open the store at `path`. A missing or unreadable file starts fresh.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "device state is corrupt; starting fresh"
                    );
                    DeviceData::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no device state yet");
                DeviceData::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read device state; starting fresh"
                );
                DeviceData::default()
            }
        };
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), DeviceStoreError> {
        let contents = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, contents).map_err(|source| DeviceStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl IdentityStore for DeviceStore {
    fn get(&self) -> Option<&Identity> {
        self.data.user.as_ref()
    }

    fn set(&mut self, identity: Identity) -> Result<(), DeviceStoreError> {
        self.data.user = Some(identity);
        self.persist()
    }

    fn clear(&mut self) -> Result<(), DeviceStoreError> {
        self.data.user = None;
        self.persist()
    }
}

impl GateCache for DeviceStore {
    fn cached_open(&self) -> bool {
        self.data.karaoke_active
    }

    fn remember_open(&mut self, open: bool) -> Result<(), DeviceStoreError> {
        if self.data.karaoke_active == open {
            return Ok(());
        }
        self.data.karaoke_active = open;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use uuid::Uuid;

    use super::*;

    fn scratch_path() -> PathBuf {
        env::temp_dir().join(format!("karaoke-device-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn fresh_device_has_no_identity_and_an_open_gate() {
        let store = DeviceStore::open(scratch_path());
        assert!(store.get().is_none());
        assert!(store.cached_open());
    }

    #[test]
    fn identity_and_gate_survive_reopening() {
        let path = scratch_path();
        let mut store = DeviceStore::open(&path);
        store.set(Identity::new("Ana", "5")).unwrap();
        store.remember_open(false).unwrap();

        let reopened = DeviceStore::open(&path);
        assert_eq!(reopened.get(), Some(&Identity::new("Ana", "5")));
        assert!(!reopened.cached_open());

        let mut reopened = reopened;
        reopened.clear().unwrap();
        assert!(DeviceStore::open(&path).get().is_none());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let path = scratch_path();
        fs::write(&path, "{not json").unwrap();
        let store = DeviceStore::open(&path);
        assert!(store.get().is_none());
        assert!(store.cached_open());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_gate_field_defaults_to_open() {
        let path = scratch_path();
        fs::write(&path, r#"{"user":{"name":"João","table":"7"}}"#).unwrap();
        let store = DeviceStore::open(&path);
        assert_eq!(store.get(), Some(&Identity::new("João", "7")));
        assert!(store.cached_open());
        let _ = fs::remove_file(path);
    }
}
