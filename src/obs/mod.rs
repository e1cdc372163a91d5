//! Huawei OBS backend.
//!
//! [`ObsApi`] is the narrow seam over the object storage service itself;
//! [`ObsHttpClient`] implements it against the OBS REST API. [`ObsStorage`]
//! adapts any `ObsApi` to the generic [`ObjectClient`](crate::object_store::ObjectClient)
//! contract, adding pagination and request instrumentation.

mod http;
pub mod signer;
mod storage;

pub use http::ObsHttpClient;
pub use storage::{ObsStorage, DELETE_OBJECT, GET_OBJECT, LIST_OBJECT, PUT_OBJECT};

use async_trait::async_trait;

use crate::object_store::{ObjectReader, ObjectSource, ObjectStoreError, StorageObject};

/// One list request. An empty `delimiter` or `marker` is not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsInput {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: String,
    pub marker: String,
}

/// One page of list results.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOutput {
    pub contents: Vec<StorageObject>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: String,
}

#[async_trait]
pub trait ObsApi: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, ObjectStoreError>;
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError>;
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError>;
    async fn list_objects(
        &self,
        input: &ListObjectsInput,
    ) -> Result<ListObjectsOutput, ObjectStoreError>;
}

#[async_trait]
impl<T: ObsApi + ?Sized> ObsApi for std::sync::Arc<T> {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        (**self).get_object(bucket, key).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError> {
        (**self).put_object(bucket, key, body).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        (**self).delete_object(bucket, key).await
    }

    async fn list_objects(
        &self,
        input: &ListObjectsInput,
    ) -> Result<ListObjectsOutput, ObjectStoreError> {
        (**self).list_objects(input).await
    }
}
