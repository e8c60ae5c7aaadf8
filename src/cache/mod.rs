//! The spatio-temporal result cache.
//!
//! Operator results are memoized per payload type, keyed by the semantic
//! fingerprint of the operator graph that produced them and retrieved by
//! query-rectangle containment at a compatible resolution. A hit hands back
//! an independent copy; a miss is a signal, never a failure.

mod manager;
mod policy;
mod remote;
mod store;
mod structure;
mod types;

pub use manager::{
    CacheManager, CacheWrapper, CachingStrategy, LocalCacheManager, LocalCacheWrapper,
    NopCacheManager, NopCacheWrapper,
};
pub use policy::{EntryHandle, EvictionPolicy, FifoPolicy, LfuPolicy, LruPolicy};
pub use remote::{
    ClientCacheManager, DeliveryResponse, CLIENT_CMD_GET, CLIENT_RESP_ERROR, CLIENT_RESP_OK,
    DELIVERY_CMD_GET, DELIVERY_RESP_ERROR, DELIVERY_RESP_OK,
};
pub use store::{CacheStore, StoreStats};
pub use types::{CacheError, CachePayload, CacheType, Replacement};

use std::sync::OnceLock;

use crate::config::{CacheKind, Settings};

static INSTANCE: OnceLock<Box<dyn CacheManager>> = OnceLock::new();

/// Install the process-wide cache manager.
///
/// Must be called exactly once, before any [`instance`] call.
pub fn init(manager: Box<dyn CacheManager>) -> Result<(), CacheError> {
    INSTANCE
        .set(manager)
        .map_err(|_| CacheError::AlreadyInitialized)
}

/// The process-wide cache manager installed by [`init`].
pub fn instance() -> Result<&'static dyn CacheManager, CacheError> {
    INSTANCE
        .get()
        .map(|b| b.as_ref())
        .ok_or(CacheError::NotInitialized)
}

/// Build the manager the configuration asks for.
pub fn manager_from_settings(settings: &Settings) -> Box<dyn CacheManager> {
    if !settings.cache.enabled {
        return Box::new(NopCacheManager::new());
    }
    match settings.cache.kind {
        CacheKind::Local => Box::new(LocalCacheManager::new(settings)),
        CacheKind::Remote => Box::new(ClientCacheManager::new(
            &settings.indexserver.host,
            settings.indexserver.port,
        )),
    }
}
