use crate::domain::method_map::MethodMap;
use crate::error::{Result, TraceError};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::{debug, warn};

/// Trait for per-service method map persistence.
/// Implementations must be thread-safe (Send + Sync).
pub trait MethodMapStore: Send + Sync {
    /// The cached map of `service`, or `None` when nothing usable is stored.
    fn load(&self, service: &str) -> Result<Option<MethodMap>>;
    fn save(&self, service: &str, map: &MethodMap) -> Result<()>;
    fn invalidate(&self, service: &str) -> Result<()>;
}

// ============================================================================
// MemoryMapStore - in-process storage using DashMap
// ============================================================================

#[derive(Default)]
pub struct MemoryMapStore {
    pub maps: DashMap<String, MethodMap>,
}

impl MethodMapStore for MemoryMapStore {
    fn load(&self, service: &str) -> Result<Option<MethodMap>> {
        Ok(self.maps.get(service).map(|r| r.clone()))
    }

    fn save(&self, service: &str, map: &MethodMap) -> Result<()> {
        self.maps.insert(service.to_string(), map.clone());
        Ok(())
    }

    fn invalidate(&self, service: &str) -> Result<()> {
        self.maps.remove(service);
        Ok(())
    }
}

// ============================================================================
// DiskMapStore - persistent storage using sled
// ============================================================================

/// Stored value, versioned so that format changes read as a cache miss.
#[derive(Debug, Serialize, Deserialize)]
struct CachedMethodMap {
    version: u32,
    map: MethodMap,
}

impl CachedMethodMap {
    const CURRENT_VERSION: u32 = 1;
}

pub struct DiskMapStore {
    _db: Db,
    maps_tree: sled::Tree,
}

impl DiskMapStore {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| {
            TraceError::Cache(format!("failed to open {}: {}", path.display(), e))
        })?;
        let maps_tree = db
            .open_tree("method_maps")
            .map_err(|e| TraceError::Cache(format!("failed to open tree: {}", e)))?;
        Ok(Self { _db: db, maps_tree })
    }
}

impl MethodMapStore for DiskMapStore {
    fn load(&self, service: &str) -> Result<Option<MethodMap>> {
        let Some(bytes) = self
            .maps_tree
            .get(service.as_bytes())
            .map_err(|e| TraceError::Cache(format!("failed to read {}: {}", service, e)))?
        else {
            debug!(service, "no cached method map");
            return Ok(None);
        };
        let corrupt =
            |e: bincode::Error| TraceError::Cache(format!("corrupt method map for {}: {}", service, e));
        // The version leads the envelope; check it before decoding the map.
        let version: u32 = bincode::deserialize(&bytes).map_err(corrupt)?;
        if version != CachedMethodMap::CURRENT_VERSION {
            warn!(service, version, "cached method map version mismatch");
            return Ok(None);
        }
        let cached: CachedMethodMap = bincode::deserialize(&bytes).map_err(corrupt)?;
        Ok(Some(cached.map))
    }

    fn save(&self, service: &str, map: &MethodMap) -> Result<()> {
        let bytes = bincode::serialize(&CachedMethodMap {
            version: CachedMethodMap::CURRENT_VERSION,
            map: map.clone(),
        })
        .map_err(|e| TraceError::Cache(format!("failed to encode {}: {}", service, e)))?;
        self.maps_tree
            .insert(service.as_bytes(), bytes)
            .map_err(|e| TraceError::Cache(format!("failed to write {}: {}", service, e)))?;
        self.maps_tree
            .flush()
            .map_err(|e| TraceError::Cache(format!("failed to flush {}: {}", service, e)))?;
        Ok(())
    }

    fn invalidate(&self, service: &str) -> Result<()> {
        self.maps_tree
            .remove(service.as_bytes())
            .map_err(|e| TraceError::Cache(format!("failed to remove {}: {}", service, e)))?;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::method::RpcMethod;
    use tempfile::tempdir;

    fn sample_map() -> MethodMap {
        let mut map = MethodMap::new();
        let entry = map.entry_mut("createorder.createorderrequest.createorderresponse");
        entry.source_url = Some("https://github.com/acme/orders/blob/master/server.go#L10".to_string());
        entry.methods.push(RpcMethod::new(
            "payments",
            "github.com/acme/protos/gen/payments",
            "Charge",
            "ChargeRequest",
            "ChargeResponse",
        ));
        map
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryMapStore::default();
        assert!(store.load("orders").unwrap().is_none());
        store.save("orders", &sample_map()).unwrap();
        assert_eq!(store.load("orders").unwrap(), Some(sample_map()));
        store.invalidate("orders").unwrap();
        assert!(store.load("orders").unwrap().is_none());
    }

    #[test]
    fn test_disk_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = DiskMapStore::new(dir.path()).unwrap();
        store.save("orders", &sample_map()).unwrap();
        assert_eq!(store.load("orders").unwrap(), Some(sample_map()));
        assert!(store.load("payments").unwrap().is_none());

        store.invalidate("orders").unwrap();
        assert!(store.load("orders").unwrap().is_none());
    }

    #[test]
    fn test_disk_store_rejects_corrupt_bytes() {
        let dir = tempdir().unwrap();
        let store = DiskMapStore::new(dir.path()).unwrap();
        store.maps_tree.insert("orders", &[0xff, 0xff, 0xff][..]).unwrap();
        assert!(matches!(store.load("orders"), Err(TraceError::Cache(_))));
    }

    #[test]
    fn test_disk_store_old_version_is_a_miss() {
        let dir = tempdir().unwrap();
        let store = DiskMapStore::new(dir.path()).unwrap();
        let stale = bincode::serialize(&(99u32, "older layout")).unwrap();
        store.maps_tree.insert("orders", stale).unwrap();
        assert!(store.load("orders").unwrap().is_none());
    }
}
