use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::{isolate, OcrEngine};
use super::http_ocr::{encode_image, SidecarClient};
use super::layout::LayoutReconstructor;
use crate::error::{OcrError, Result};
use crate::models::config::{BackendSettings, EngineConfig, EngineKind, LayoutConfig};
use crate::models::fragment::{BoundingBox, Fragment};
use crate::models::ocr_result::RecognitionResult;

#[derive(Serialize)]
struct ReadTextRequest<'a> {
    image_base64: String,
    lang_list: &'a [String],
    gpu: bool,
}

/// One `readtext` detection: corners, text, probability
type Detection = ([[f64; 2]; 4], String, f64);

#[derive(Deserialize)]
struct ReadTextResponse {
    #[serde(default)]
    results: Vec<Detection>,
}

/// EasyOCR adapter backed by an EasyOCR inference server
pub struct EasyOcrEngine {
    client: SidecarClient,
    lang_list: Vec<String>,
    use_gpu: bool,
    layout: LayoutReconstructor,
}

impl EasyOcrEngine {
    /// Connect to the EasyOCR server for the configured language list
    pub fn new(config: &EngineConfig, backends: &BackendSettings, layout: LayoutConfig) -> Result<Self> {
        let lang_list = config.effective_language().codes();
        if lang_list.is_empty() {
            return Err(OcrError::Configuration(
                "EasyOCR needs at least one language code".to_string(),
            ));
        }

        info!(
            "Initializing EasyOCR with lang={:?}, gpu={}",
            lang_list, config.use_gpu
        );
        let client = SidecarClient::connect(
            &backends.easyocr_url,
            Duration::from_secs(backends.request_timeout_secs),
        )?;
        info!("EasyOCR initialized successfully");

        Ok(Self {
            client,
            lang_list,
            use_gpu: config.use_gpu,
            layout: LayoutReconstructor::new(layout),
        })
    }

    fn run(&self, image_path: &Path) -> Result<RecognitionResult> {
        info!("Starting EasyOCR recognition on {}", image_path.display());

        let image_base64 = encode_image(image_path)?;
        let response: ReadTextResponse = self.client.post_json(
            "/readtext",
            &ReadTextRequest {
                image_base64,
                lang_list: &self.lang_list,
                gpu: self.use_gpu,
            },
        )?;

        info!(
            "EasyOCR recognition completed. Found {} text segments.",
            response.results.len()
        );

        let fragments = to_fragments(response.results);
        if fragments.is_empty() {
            return Ok(RecognitionResult::empty(EngineKind::Easy.name()));
        }

        let text = self.layout.reconstruct(&fragments);
        Ok(RecognitionResult::recognized(EngineKind::Easy.name(), text, fragments))
    }
}

/// Corner coordinates are truncated to whole pixels
fn to_fragments(detections: Vec<Detection>) -> Vec<Fragment> {
    detections
        .into_iter()
        .map(|(corners, text, prob)| {
            let points = corners.map(|[x, y]| (x.trunc(), y.trunc()));
            Fragment::new(text, prob, BoundingBox::quad(points))
        })
        .collect()
}

impl OcrEngine for EasyOcrEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Easy
    }

    fn recognize(&self, image_path: &Path) -> RecognitionResult {
        isolate(EngineKind::Easy, || self.run(image_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::Language;
    use crate::services::ocr::http_ocr::stub;
    use image::{DynamicImage, Rgb, RgbImage};

    const SAMPLE: &str = r#"{
        "results": [
            [[[0.4, 0.0], [50.9, 0.0], [50.9, 20.2], [0.4, 20.2]], "Total", 0.97],
            [[[75.0, 1.0], [120.0, 1.0], [120.0, 21.0], [75.0, 21.0]], "42.00", 0.88]
        ]
    }"#;

    fn write_test_image(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("receipt.jpg");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([240, 240, 240])))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_points_are_truncated() {
        let response: ReadTextResponse = serde_json::from_str(SAMPLE).unwrap();
        let fragments = to_fragments(response.results);

        assert_eq!(
            fragments[0].bbox,
            BoundingBox::quad([(0.0, 0.0), (50.0, 0.0), (50.0, 20.0), (0.0, 20.0)])
        );
        assert_eq!(fragments[0].confidence, 0.97);
        assert_eq!(fragments[1].text, "42.00");
    }

    #[test]
    fn test_recognize_with_language_list() {
        let (url, requests) = stub::serve(vec![
            ("/health", 200, "{}".to_string()),
            ("/readtext", 200, SAMPLE.to_string()),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let image = write_test_image(dir.path());

        let backends = BackendSettings {
            easyocr_url: url,
            request_timeout_secs: 5,
            ..BackendSettings::default()
        };
        let config = EngineConfig::new(EngineKind::Easy)
            .with_language("en,fr".parse::<Language>().unwrap())
            .with_gpu(true);
        let engine = EasyOcrEngine::new(&config, &backends, LayoutConfig::default()).unwrap();
        let result = engine.recognize(&image);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.engine, "easyocr");
        // 25px gap between 50 and 75
        assert_eq!(result.text, "Total  42.00");

        let requests = requests.lock().unwrap();
        let (_, body) = requests.iter().find(|(path, _)| path == "/readtext").unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["lang_list"], serde_json::json!(["en", "fr"]));
        assert_eq!(body["gpu"], true);
    }

    #[test]
    fn test_unreachable_server_fails_construction() {
        let backends = BackendSettings {
            easyocr_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..BackendSettings::default()
        };
        let result = EasyOcrEngine::new(&EngineConfig::new(EngineKind::Easy), &backends, LayoutConfig::default());
        assert!(matches!(result, Err(OcrError::EngineUnavailable(_))));
    }

    #[test]
    fn test_missing_image_is_failed_result() {
        let (url, _) = stub::serve(vec![("/health", 200, "{}".to_string())]);
        let backends = BackendSettings {
            easyocr_url: url,
            request_timeout_secs: 5,
            ..BackendSettings::default()
        };
        let engine =
            EasyOcrEngine::new(&EngineConfig::new(EngineKind::Easy), &backends, LayoutConfig::default())
                .unwrap();

        let result = engine.recognize(Path::new("/nonexistent/receipt.jpg"));
        assert!(!result.success);
        assert_eq!(result.engine, "easyocr");
    }
}
