use std::io::{ErrorKind, SeekFrom};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncSeekExt;
use tokio_util::io::{ReaderStream, StreamReader};
use url::{Host, Url};

use super::signer::{http_date, string_to_sign, Signer};
use super::{ListObjectsInput, ListObjectsOutput, ObsApi};
use crate::object_store::{ObjectReader, ObjectSource, ObjectStoreError, StorageObject};

const OCTET_STREAM: &str = "application/octet-stream";

/// Everything but RFC 3986 unreserved characters.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// OBS REST API client.
///
/// Requests are virtual-hosted (`bucket.endpoint`) unless the endpoint host
/// is an IP address, in which case the bucket goes in the path.
pub struct ObsHttpClient {
    client: Client,
    endpoint: Url,
    signer: Option<Signer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: String,
    #[serde(default)]
    contents: Vec<ListedObject>,
    #[serde(default)]
    common_prefixes: Vec<ListedCommonPrefix>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    last_modified: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedCommonPrefix {
    prefix: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct ErrorBody {
    code: String,
    message: String,
}

impl ObsHttpClient {
    /// Build a client for `endpoint`. Empty keys mean anonymous access.
    /// No request is made here; a malformed endpoint is the only failure.
    pub fn new(access_key: &str, secret_key: &str, endpoint: &str) -> Result<Self, ObjectStoreError> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = Client::builder()
            .build()
            .map_err(|e| ObjectStoreError::Connection(e.to_string()))?;

        let signer = if access_key.is_empty() || secret_key.is_empty() {
            None
        } else {
            Some(Signer::new(access_key, secret_key))
        };

        Ok(Self {
            client,
            endpoint,
            signer,
        })
    }

    fn path_style(&self) -> bool {
        matches!(
            self.endpoint.host(),
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_))
        )
    }

    fn bucket_url(&self, bucket: &str) -> Result<Url, ObjectStoreError> {
        self.url_for(bucket, &[""])
    }

    /// Keys are sent verbatim, one percent-encoded segment per `/`.
    /// `.` and `..` segments are refused: URL parsing resolves them in any
    /// encoding, which would address a different object.
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, ObjectStoreError> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.iter().any(|s| matches!(*s, "." | "..")) {
            return Err(ObjectStoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("object key {key:?} contains a dot segment"),
            )));
        }
        self.url_for(bucket, &segments)
    }

    fn url_for(&self, bucket: &str, segments: &[&str]) -> Result<Url, ObjectStoreError> {
        let mut url = self.endpoint.clone();

        if !self.path_style() {
            let host = url
                .host_str()
                .ok_or_else(|| ObjectStoreError::Connection("endpoint has no host".to_string()))?;
            let virtual_host = format!("{bucket}.{host}");
            url.set_host(Some(&virtual_host))
                .map_err(|e| ObjectStoreError::Connection(format!("bad bucket host: {e}")))?;
        }

        let mut path = url.path().trim_end_matches('/').to_string();
        if self.path_style() {
            path.push('/');
            path.extend(utf8_percent_encode(bucket, KEY_SEGMENT));
        }
        for segment in segments {
            path.push('/');
            path.extend(utf8_percent_encode(segment, KEY_SEGMENT));
        }
        url.set_path(&path);

        Ok(url)
    }

    /// The signed resource is always `/bucket/...`, whatever the addressing.
    fn resource(&self, bucket: &str, url: &Url) -> String {
        if self.path_style() {
            url.path().to_string()
        } else {
            format!("/{bucket}{}", url.path())
        }
    }

    fn request(
        &self,
        method: Method,
        bucket: &str,
        url: Url,
        content_type: &str,
    ) -> RequestBuilder {
        let date = http_date(Utc::now());
        let resource = self.resource(bucket, &url);

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(header::DATE, &date);

        if !content_type.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        if let Some(signer) = &self.signer {
            let payload = string_to_sign(method.as_str(), "", content_type, &date, &resource);
            builder = builder.header(header::AUTHORIZATION, signer.authorization(&payload));
        }

        builder
    }
}

#[async_trait]
impl ObsApi for ObsHttpClient {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, ObjectStoreError> {
        let url = self.object_url(bucket, key)?;
        let resp = self
            .request(Method::GET, bucket, url, "")
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: Box<dyn ObjectSource>,
    ) -> Result<(), ObjectStoreError> {
        let length = body.seek(SeekFrom::End(0)).await?;
        body.seek(SeekFrom::Start(0)).await?;

        let url = self.object_url(bucket, key)?;
        let resp = self
            .request(Method::PUT, bucket, url, OCTET_STREAM)
            .header(header::CONTENT_LENGTH, length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        let url = self.object_url(bucket, key)?;
        let resp = self
            .request(Method::DELETE, bucket, url, "")
            .send()
            .await
            .map_err(transport)?;

        // Whatever OBS says about missing keys is passed through.
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }

        Ok(())
    }

    async fn list_objects(
        &self,
        input: &ListObjectsInput,
    ) -> Result<ListObjectsOutput, ObjectStoreError> {
        let mut url = self.bucket_url(&input.bucket)?;
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in [
                ("prefix", &input.prefix),
                ("delimiter", &input.delimiter),
                ("marker", &input.marker),
            ] {
                if !value.is_empty() {
                    query.append_pair(name, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let resp = self
            .request(Method::GET, &input.bucket, url, "")
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }

        let body = resp.text().await.map_err(transport)?;
        decode_list(&body)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ObjectStoreError> {
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ObjectStoreError::Connection(format!("invalid endpoint {endpoint:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ObjectStoreError::Connection(format!(
            "unsupported endpoint scheme: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ObjectStoreError::Connection(format!(
            "endpoint {endpoint:?} has no host"
        )));
    }

    Ok(url)
}

fn decode_list(body: &str) -> Result<ListObjectsOutput, ObjectStoreError> {
    let result: ListBucketResult =
        quick_xml::de::from_str(body).map_err(|e| ObjectStoreError::Decode(e.to_string()))?;

    Ok(ListObjectsOutput {
        contents: result
            .contents
            .into_iter()
            .map(|o| StorageObject {
                key: o.key,
                modified_at: o.last_modified,
            })
            .collect(),
        common_prefixes: result
            .common_prefixes
            .into_iter()
            .map(|p| p.prefix)
            .collect(),
        is_truncated: result.is_truncated,
        next_marker: result.next_marker,
    })
}

fn transport(e: reqwest::Error) -> ObjectStoreError {
    ObjectStoreError::Transport(e.to_string())
}

async fn server_error(resp: Response) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let parsed: ErrorBody = quick_xml::de::from_str(&body).unwrap_or_default();

    let code = if parsed.code.is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        parsed.code
    };
    let message = if parsed.message.is_empty() {
        body
    } else {
        parsed.message
    };

    ObjectStoreError::Server {
        status: status.as_u16(),
        code,
        message,
    }
}
