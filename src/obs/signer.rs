//! OBS request signing (the `OBS ak:signature` header scheme).

use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;

/// Format a timestamp the way the `Date` header expects (RFC 1123, GMT).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the canonical string covered by the signature. `resource` is
/// `/bucket/` for bucket requests and `/bucket/encoded-key` for objects;
/// query parameters are not part of it.
pub fn string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    resource: &str,
) -> String {
    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{resource}")
}

pub struct Signer {
    access_key: String,
    key: hmac::Key,
}

impl Signer {
    pub fn new(access_key: &str, secret_key: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            key: hmac::Key::new(
                hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
                secret_key.as_bytes(),
            ),
        }
    }

    pub fn signature(&self, string_to_sign: &str) -> String {
        let tag = hmac::sign(&self.key, string_to_sign.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self, string_to_sign: &str) -> String {
        format!("OBS {}:{}", self.access_key, self.signature(string_to_sign))
    }
}
