use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{OcrError, Result};

/// Blocking HTTP client for a local OCR inference server
#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl SidecarClient {
    /// Create a client and verify the server answers its health endpoint
    pub fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let sidecar = Self::unchecked(base_url, timeout)?;
        sidecar.health_check()?;
        Ok(sidecar)
    }

    /// Create a client without contacting the server
    pub fn unchecked(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OcrError::EngineUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if server is healthy
    pub fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().map_err(|e| {
            OcrError::EngineUnavailable(format!("OCR server at {} unreachable: {}", self.base_url, e))
        })?;

        if !response.status().is_success() {
            return Err(OcrError::EngineUnavailable(format!(
                "OCR server at {} unhealthy: {}",
                self.base_url,
                response.status()
            )));
        }
        Ok(())
    }

    /// POST a JSON body and decode the JSON reply
    pub fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| OcrError::Recognition(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OcrError::Recognition(format!(
                "OCR server error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .map_err(|e| OcrError::Recognition(format!("Failed to parse response: {}", e)))
    }
}

/// Decode the image at `path` and re-encode it as base64 PNG
pub fn encode_image(path: &Path) -> Result<String> {
    let image = image::open(path)?;

    let mut buffer = Vec::new();
    image.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(&buffer))
}

/// Minimal canned-response HTTP server for adapter tests
#[cfg(test)]
pub(crate) mod stub {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Recorded request: path and body
    pub type Requests = Arc<Mutex<Vec<(String, String)>>>;

    /// Serve `routes` (path, status, json body) until the process exits.
    /// Returns the base URL and the log of received requests.
    pub fn serve(routes: Vec<(&'static str, u16, String)>) -> (String, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let path = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let mut content_length = 0usize;
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }

                let mut body = vec![0u8; content_length];
                let _ = reader.read_exact(&mut body);
                log.lock()
                    .unwrap()
                    .push((path.clone(), String::from_utf8_lossy(&body).to_string()));

                let (status, payload) = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, payload)| (*status, payload.clone()))
                    .unwrap_or((404, "{}".to_string()));

                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        (base_url, requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn test_connect_to_healthy_server() {
        let (url, requests) = stub::serve(vec![("/health", 200, "{}".to_string())]);

        let client = SidecarClient::connect(&url, Duration::from_secs(5));
        assert!(client.is_ok());
        assert_eq!(requests.lock().unwrap()[0].0, "/health");
    }

    #[test]
    fn test_connect_to_unhealthy_server() {
        let (url, _) = stub::serve(vec![("/health", 503, "{}".to_string())]);

        let result = SidecarClient::connect(&url, Duration::from_secs(5));
        assert!(matches!(result, Err(OcrError::EngineUnavailable(_))));
    }

    #[test]
    fn test_server_error_becomes_recognition_error() {
        let (url, _) = stub::serve(vec![("/ocr", 500, r#"{"detail":"bad"}"#.to_string())]);
        let client = SidecarClient::unchecked(&url, Duration::from_secs(5)).unwrap();

        let result: Result<serde_json::Value> = client.post_json("/ocr", &serde_json::json!({}));
        assert!(matches!(result, Err(OcrError::Recognition(_))));
    }

    #[test]
    fn test_trailing_slash_is_dropped() {
        let client = SidecarClient::unchecked("http://localhost:1/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1");
    }

    #[test]
    fn test_encode_image_roundtrips_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 3, Luma([200u8])))
            .save(&path)
            .unwrap();

        let encoded = encode_image(&path).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_encode_image_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(matches!(encode_image(&path), Err(OcrError::Image(_))));
    }
}
