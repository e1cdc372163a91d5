use std::sync::Arc;

use async_trait::async_trait;

use super::{ListObjectsInput, ObsApi, ObsHttpClient};
use crate::config::ObsStorageConfig;
use crate::metrics::{collected_request, RequestDurationSink};
use crate::object_store::{
    ObjectClient, ObjectReader, ObjectSource, ObjectStoreError, StorageCommonPrefix, StorageObject,
};

pub const GET_OBJECT: &str = "OBS.GetObject";
pub const PUT_OBJECT: &str = "OBS.PutObject";
pub const DELETE_OBJECT: &str = "OBS.DeleteObject";
pub const LIST_OBJECT: &str = "OBS.ListObject";

/// [`ObjectClient`] for a single OBS bucket.
pub struct ObsStorage<A: ObsApi = ObsHttpClient> {
    cfg: ObsStorageConfig,
    api: A,
    metrics: Arc<dyn RequestDurationSink>,
}

impl ObsStorage<ObsHttpClient> {
    /// Validate `cfg` and connect to its endpoint. Nothing touches the
    /// network if validation fails.
    pub fn new(
        cfg: ObsStorageConfig,
        metrics: Arc<dyn RequestDurationSink>,
    ) -> Result<Self, ObjectStoreError> {
        cfg.validate()?;
        let api = ObsHttpClient::new(&cfg.access_key, &cfg.secret_key, &cfg.endpoint)?;
        tracing::info!(endpoint = %cfg.endpoint, bucket = %cfg.bucket, "OBS storage client created");
        Ok(Self { cfg, api, metrics })
    }
}

impl<A: ObsApi> ObsStorage<A> {
    pub fn with_api(
        cfg: ObsStorageConfig,
        api: A,
        metrics: Arc<dyn RequestDurationSink>,
    ) -> Result<Self, ObjectStoreError> {
        cfg.validate()?;
        Ok(Self { cfg, api, metrics })
    }

    /// Follow markers until a page is not truncated. A truncated page with
    /// no marker also ends the listing, keeping what was seen so far.
    async fn list_all_pages(
        &self,
        prefix: &str,
        delimiter: &str,
    ) -> Result<(Vec<StorageObject>, Vec<StorageCommonPrefix>), ObjectStoreError> {
        let mut input = ListObjectsInput {
            bucket: self.cfg.bucket.clone(),
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
            marker: String::new(),
        };
        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();

        loop {
            let page = self.api.list_objects(&input).await?;
            objects.extend(page.contents);
            common_prefixes.extend(page.common_prefixes.into_iter().map(StorageCommonPrefix));

            if !page.is_truncated {
                break;
            }
            if page.next_marker.is_empty() {
                tracing::warn!(
                    bucket = %self.cfg.bucket,
                    prefix,
                    listed = objects.len(),
                    "truncated list page without a marker, stopping"
                );
                break;
            }
            input.marker = page.next_marker;
        }

        Ok((objects, common_prefixes))
    }
}

#[async_trait]
impl<A: ObsApi> ObjectClient for ObsStorage<A> {
    async fn get_object(&self, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        collected_request(
            self.metrics.as_ref(),
            GET_OBJECT,
            self.api.get_object(&self.cfg.bucket, key),
        )
        .await
    }

    async fn put_object(
        &self,
        key: &str,
        object: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError> {
        collected_request(
            self.metrics.as_ref(),
            PUT_OBJECT,
            self.api.put_object(&self.cfg.bucket, key, object),
        )
        .await
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        collected_request(
            self.metrics.as_ref(),
            DELETE_OBJECT,
            self.api.delete_object(&self.cfg.bucket, key),
        )
        .await
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
    ) -> Result<(Vec<StorageObject>, Vec<StorageCommonPrefix>), ObjectStoreError> {
        collected_request(
            self.metrics.as_ref(),
            LIST_OBJECT,
            self.list_all_pages(prefix, delimiter),
        )
        .await
    }

    fn stop(&self) {}
}
