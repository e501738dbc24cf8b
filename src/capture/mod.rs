//! Capture server client and the session that pairs a capture with its
//! on-screen choreography.

pub mod session;

use std::future::Future;
use std::time::Duration;

use image::RgbaImage;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{BoothError, BoothResult};

pub use session::CaptureSession;

/// Body returned by `/capture` and `/capture_3`
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureResponse {
    pub status: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filenames: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CaptureResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// The external capture endpoint.
pub trait CaptureClient: Send + Sync + 'static {
    /// Take one photo; returns its file name
    fn capture_single(&self) -> impl Future<Output = BoothResult<String>> + Send;

    /// Take three photos in a row; returns their file names
    fn capture_triple(&self) -> impl Future<Output = BoothResult<Vec<String>>> + Send;

    /// Download a captured photo for preview
    fn fetch_photo(&self, filename: &str) -> impl Future<Output = BoothResult<RgbaImage>> + Send;
}

/// [`CaptureClient`] talking JSON over HTTP to the booth's capture server.
#[derive(Debug, Clone)]
pub struct HttpCaptureClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCaptureClient {
    pub fn new(base_url: &str, timeout: Duration) -> BoothResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str) -> BoothResult<CaptureResponse> {
        let url = self.url(path);
        debug!(%url, "capture request");
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        parse_response(status, &body)
    }
}

impl CaptureClient for HttpCaptureClient {
    async fn capture_single(&self) -> BoothResult<String> {
        let response = self.post("/capture").await?;
        if !response.is_success() {
            return Err(failure(&response, "Failed to capture image"));
        }
        response
            .filename
            .ok_or_else(|| BoothError::Capture("Capture response carried no filename".into()))
    }

    async fn capture_triple(&self) -> BoothResult<Vec<String>> {
        let response = self.post("/capture_3").await?;
        if !response.is_success() {
            return Err(failure(&response, "Failed to capture images"));
        }
        Ok(response.filenames)
    }

    async fn fetch_photo(&self, filename: &str) -> BoothResult<RgbaImage> {
        let url = self.url(&photo_path(filename));
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
        Ok(image.to_rgba8())
    }
}

/// Server path of a captured photo
pub fn photo_path(filename: &str) -> String {
    format!("/captures/{filename}")
}

/// Absolute URL of a captured photo on the server at `base_url`
pub fn photo_url(base_url: &str, filename: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), photo_path(filename))
}

/// Decode a capture reply. The server answers errors with a JSON body too,
/// so the body is read whatever the HTTP status; an unreadable body on a
/// failed request reports the HTTP status instead.
pub fn parse_response(status: StatusCode, body: &[u8]) -> BoothResult<CaptureResponse> {
    match serde_json::from_slice::<CaptureResponse>(body) {
        Ok(response) => Ok(response),
        Err(e) if status.is_success() => Err(e.into()),
        Err(_) => {
            warn!(%status, "capture server returned an unreadable error");
            Err(BoothError::Capture(format!("Capture server returned {status}")))
        }
    }
}

fn failure(response: &CaptureResponse, fallback: &str) -> BoothError {
    let message = response
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    warn!(status = %response.status, %message, "capture rejected by server");
    BoothError::Capture(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triple_success() {
        let body = br#"{"status":"success","filenames":["a.jpg","b.jpg","c.jpg"]}"#;
        let response = parse_response(StatusCode::OK, body).unwrap();
        assert!(response.is_success());
        assert_eq!(response.filenames, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert!(response.filename.is_none());
    }

    #[test]
    fn error_body_is_read_on_server_error() {
        let body = br#"{"status":"error","message":"Camera system not initialized"}"#;
        let response = parse_response(StatusCode::INTERNAL_SERVER_ERROR, body).unwrap();
        assert!(!response.is_success());
        let err = failure(&response, "Failed to capture image");
        assert_eq!(err.to_string(), "Camera system not initialized");
    }

    #[test]
    fn missing_message_uses_fallback() {
        let response = parse_response(StatusCode::OK, br#"{"status":"busy"}"#).unwrap();
        assert_eq!(
            failure(&response, "Failed to capture images").to_string(),
            "Failed to capture images"
        );
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(matches!(
            parse_response(StatusCode::OK, b"<html>"),
            Err(BoothError::Json(_))
        ));
        assert!(matches!(
            parse_response(StatusCode::BAD_GATEWAY, b""),
            Err(BoothError::Capture(_))
        ));
    }

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let client = HttpCaptureClient::new("http://booth.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/capture_3"), "http://booth.local/capture_3");
        assert_eq!(client.url(&photo_path("x.jpg")), "http://booth.local/captures/x.jpg");
    }
}
