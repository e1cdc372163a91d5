//! obs-store - Huawei OBS backing store for chunk storage
//!
//! This crate provides:
//! - A generic bucket client contract (`ObjectClient`) with get, put, delete,
//!   list and stop
//! - An OBS backend speaking the OBS REST API, with transparent list pagination
//! - A local filesystem backend for development and testing
//! - Per-request latency instrumentation through an injected sink

pub mod config;
pub mod metrics;
pub mod object_store;
pub mod obs;

use std::sync::Arc;

use config::{StorageBackend, StorageConfig};
use metrics::RequestDurationSink;
use object_store::{LocalStore, ObjectClient, ObjectStoreError};
use obs::ObsStorage;

/// Build the object client selected by `config`.
pub fn open_object_client(
    config: &StorageConfig,
    metrics: Arc<dyn RequestDurationSink>,
) -> Result<Arc<dyn ObjectClient>, ObjectStoreError> {
    let client: Arc<dyn ObjectClient> = match config.backend {
        StorageBackend::Local => {
            let store = LocalStore::new(&config.local_storage_path)?;
            tracing::info!(
                "Using local storage backend at: {}",
                config.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::Obs => {
            let store = ObsStorage::new(config.obs.clone(), metrics)?;
            tracing::info!("Using OBS storage backend, bucket: {}", config.obs.bucket);
            Arc::new(store)
        }
    };
    Ok(client)
}
