//! Inventory store with mtime-based cache refresh.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;

use super::model::{Caller, DevicePublic, DeviceRecord};
use crate::error::InventoryError;
use crate::platform;

/// Hostname-keyed device table. Insertion order follows the file so
/// listings are stable across reloads.
type DeviceTable = Arc<IndexMap<String, Arc<DeviceRecord>>>;

/// Top-level shape of the inventory YAML file.
#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    devices: Vec<DeviceRecord>,
}

/// Loads and caches device records from a YAML file, answering
/// authorization-filtered lookups.
///
/// The file's modification time is re-checked on every access; when it
/// changes the whole table is reloaded and swapped atomically, so readers
/// see either the old or the new table in full. A reload that fails
/// validation keeps the last-known-good table serving (fail-closed); only
/// the first load at [`open`](Self::open) is allowed to fail.
pub struct InventoryStore {
    path: PathBuf,
    cache: RwLock<Cached>,
}

struct Cached {
    mtime: SystemTime,
    table: DeviceTable,
}

impl InventoryStore {
    /// Load the inventory file and build the store. Fails on a missing
    /// file, YAML errors, duplicate hostnames or unknown platforms.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        let (mtime, table) = load_table(&path).await?;
        debug!("Loaded inventory from {} ({} devices)", path.display(), table.len());
        Ok(Self {
            path,
            cache: RwLock::new(Cached { mtime, table }),
        })
    }

    /// Resolve a hostname for a caller.
    ///
    /// Returns `None` both when the hostname is absent and when it exists
    /// but the caller is not authorized; the two are indistinguishable by
    /// design.
    pub async fn resolve(&self, hostname: &str, caller: &Caller) -> Option<Arc<DeviceRecord>> {
        let table = self.current_table().await;
        let record = table.get(hostname)?;
        if record.visible_to(caller) {
            Some(Arc::clone(record))
        } else {
            None
        }
    }

    /// List the credential-stripped view of every device visible to the
    /// caller, in file order.
    pub async fn list(&self, caller: &Caller) -> Vec<DevicePublic> {
        let table = self.current_table().await;
        table
            .values()
            .filter(|record| record.visible_to(caller))
            .map(|record| record.public())
            .collect()
    }

    /// Return the cached table, reloading first if the file changed.
    async fn current_table(&self) -> DeviceTable {
        let cached_mtime = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            cache.mtime
        };

        let fresh_mtime = match tokio::fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(
                    "Inventory freshness check failed for {}: {e}; serving cached table",
                    self.path.display()
                );
                return self.snapshot();
            }
        };

        if fresh_mtime <= cached_mtime {
            return self.snapshot();
        }

        match load_table(&self.path).await {
            Ok((mtime, table)) => {
                debug!(
                    "Reloaded inventory from {} ({} devices)",
                    self.path.display(),
                    table.len()
                );
                let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                cache.mtime = mtime;
                cache.table = Arc::clone(&table);
                table
            }
            Err(e) => {
                // Fail closed: a bad edit never drops devices silently.
                warn!(
                    "Inventory reload from {} failed: {e}; serving last-known-good table",
                    self.path.display()
                );
                self.snapshot()
            }
        }
    }

    fn snapshot(&self) -> DeviceTable {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&cache.table)
    }
}

/// Read and validate the inventory file, returning its mtime and table.
async fn load_table(path: &Path) -> Result<(SystemTime, DeviceTable), InventoryError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InventoryError::Missing(path.to_path_buf()));
        }
        Err(e) => return Err(InventoryError::Io(e)),
    };
    let mtime = metadata.modified()?;

    let text = tokio::fs::read_to_string(path).await?;
    let file: InventoryFile = serde_yaml::from_str(&text).map_err(|source| InventoryError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    let mut table = IndexMap::with_capacity(file.devices.len());
    for record in file.devices {
        if !platform::is_supported(&record.platform) {
            return Err(InventoryError::InvalidRecord {
                hostname: record.hostname,
                message: format!("unsupported platform '{}'", record.platform),
            });
        }
        if record.username.is_some() != record.password.is_some() {
            return Err(InventoryError::InvalidRecord {
                hostname: record.hostname,
                message: "username and password must be set together".to_string(),
            });
        }
        let hostname = record.hostname.clone();
        if table.insert(hostname.clone(), Arc::new(record)).is_some() {
            return Err(InventoryError::InvalidRecord {
                hostname,
                message: "duplicate hostname".to_string(),
            });
        }
    }

    Ok((mtime, Arc::new(table)))
}
