//! # Pomelo API Client Module
//!
//! This module provides the authenticated client for the Pomelo food-scan
//! API: scan creation from a photo URL or composition text, and snapshot
//! fetches by scan id. The bearer token is read once at construction; a
//! missing token is a startup error, never a per-call one.

use log::info;
use reqwest::multipart;
use reqwest::StatusCode;

use crate::scan_errors::ScanError;
use crate::scan_model::{ScanEnvelope, ScanSnapshot};
use crate::scan_tracker::SnapshotSource;

/// Production endpoint of the Pomelo API
pub const DEFAULT_BASE_URL: &str = "https://pomelo.colorbit.ru/api";

/// Classification tag sent with every scan creation request
const SCAN_TYPE: &str = "food";

/// Authenticated client for the Pomelo food-scan API
pub struct PomeloClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PomeloClient {
    /// Create a client against the production endpoint
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Create a scan from a photo URL
    ///
    /// Downloads the image bytes from `photo_url`, then uploads them as
    /// multipart form data. Returns the new scan's snapshot.
    pub async fn create_photo_scan(&self, photo_url: &str) -> Result<ScanSnapshot, ScanError> {
        let image_response = self.http.get(photo_url).send().await?;
        if !image_response.status().is_success() {
            return Err(ScanError::Remote(format!(
                "image download failed with status {}",
                image_response.status()
            )));
        }
        let image_bytes = image_response.bytes().await?;

        info!("Uploading {} byte photo for scanning", image_bytes.len());

        let photo_part = multipart::Part::bytes(image_bytes.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = multipart::Form::new()
            .part("photo", photo_part)
            .text("type", SCAN_TYPE);

        self.create_scan(form).await
    }

    /// Create a scan from composition text
    pub async fn create_text_scan(&self, composition: &str) -> Result<ScanSnapshot, ScanError> {
        let form = multipart::Form::new()
            .text("composition", composition.to_string())
            .text("type", SCAN_TYPE);

        self.create_scan(form).await
    }

    async fn create_scan(&self, form: multipart::Form) -> Result<ScanSnapshot, ScanError> {
        let response = self
            .http
            .post(format!("{}/scans", self.base_url))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScanError::Remote(format!(
                "scan creation failed with status {}",
                response.status()
            )));
        }

        let envelope: ScanEnvelope = response
            .json()
            .await
            .map_err(|e| ScanError::Remote(format!("scan creation response decode: {e}")))?;

        let snapshot = envelope.scan;
        if snapshot.id.is_empty() {
            return Err(ScanError::Validation(
                "scan creation response carries no scan id".to_string(),
            ));
        }

        info!("Created scan {}", snapshot.id);
        Ok(snapshot)
    }

    /// Fetch the current snapshot of a scan
    pub async fn get_scan_result(&self, scan_id: &str) -> Result<ScanSnapshot, ScanError> {
        let response = self
            .http
            .get(format!("{}/scans/{}", self.base_url, scan_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScanError::NotFound(scan_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(ScanError::Remote(format!(
                "scan fetch failed with status {}",
                response.status()
            )));
        }

        let envelope: ScanEnvelope = response
            .json()
            .await
            .map_err(|e| ScanError::Remote(format!("scan fetch response decode: {e}")))?;

        Ok(envelope.scan)
    }
}

impl SnapshotSource for PomeloClient {
    fn fetch_snapshot<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> futures_util::future::BoxFuture<'a, Result<ScanSnapshot, ScanError>> {
        Box::pin(self.get_scan_result(scan_id))
    }
}
