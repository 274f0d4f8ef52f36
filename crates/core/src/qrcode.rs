//! QR Provisioning Client
//!
//! Looks up the QR code image that lets a user continue a conversation in the
//! WeChat mini program. The image is keyed by the user's session identifier.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "qrcode";

/// Resolves the QR code image URL for a scene (the user id).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QrCodeProvider: Send + Sync {
    async fn image_url(&self, scene: &str) -> Result<String, TransportError>;
}

#[derive(Deserialize)]
struct QrCodeBody {
    url: String,
}

/// A `QrCodeProvider` backed by the provisioning HTTP endpoint.
pub struct HttpQrCodeProvider {
    client: reqwest::Client,
    base_url: String,
    source: String,
}

impl HttpQrCodeProvider {
    pub fn new(base_url: String, source: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
        })
    }
}

#[async_trait]
impl QrCodeProvider for HttpQrCodeProvider {
    async fn image_url(&self, scene: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(format!("{}/qrcode", self.base_url))
            .query(&[("scene", scene), ("source", self.source.as_str())])
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;

        // Only a plain 200 carries an image reference.
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TransportError::Status {
                service: SERVICE,
                status,
            });
        }

        let body: QrCodeBody = response
            .json()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;
        Ok(format!("{}{}", self.base_url, body.url))
    }
}
