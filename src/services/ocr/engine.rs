use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use tracing::error;

use super::easyocr::EasyOcrEngine;
use super::paddle::PaddleEngine;
use super::sidecar::SidecarLauncher;
use super::tesseract::TesseractEngine;
use crate::error::Result;
use crate::models::config::{BackendSettings, EngineConfig, EngineKind, LayoutConfig};
use crate::models::ocr_result::RecognitionResult;

/// OCR Engine trait - abstraction over the supported backends
pub trait OcrEngine: Send + Sync {
    /// Which backend this adapter drives
    fn kind(&self) -> EngineKind;

    /// Recognize text in the image at `image_path`.
    ///
    /// Backend failures are reported inside the result, never returned or
    /// raised. An image without text is a success with empty text.
    fn recognize(&self, image_path: &Path) -> RecognitionResult;
}

/// Builds engine adapters from a configuration
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>>;
}

/// Factory for the real backends.
///
/// Owns the inference servers it had to start; they stop with the factory.
pub struct BackendFactory {
    backends: BackendSettings,
    layout: LayoutConfig,
    launcher: SidecarLauncher,
}

impl BackendFactory {
    pub fn new(backends: BackendSettings, layout: LayoutConfig) -> Self {
        Self {
            launcher: SidecarLauncher::new(backends.clone()),
            backends,
            layout,
        }
    }
}

impl EngineFactory for BackendFactory {
    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>> {
        self.launcher.ensure_running(config.engine_kind)?;

        let engine: Arc<dyn OcrEngine> = match config.engine_kind {
            EngineKind::Paddle => Arc::new(PaddleEngine::new(config, &self.backends, self.layout)?),
            EngineKind::Tesseract => Arc::new(TesseractEngine::new(config, &self.backends)?),
            EngineKind::Easy => Arc::new(EasyOcrEngine::new(config, &self.backends, self.layout)?),
        };
        Ok(engine)
    }
}

/// Run a recognition body and fold every failure, panics included, into a
/// failed result for `kind`.
pub(crate) fn isolate<F>(kind: EngineKind, body: F) -> RecognitionResult
where
    F: FnOnce() -> Result<RecognitionResult>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("{} recognition failed: {}", kind, e);
            RecognitionResult::failed(kind.name(), e.to_string())
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("{} recognition panicked: {}", kind, message);
            RecognitionResult::failed(kind.name(), format!("Engine panicked: {}", message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;

    #[test]
    fn test_isolate_passes_results_through() {
        let result = isolate(EngineKind::Paddle, || Ok(RecognitionResult::empty("paddleocr")));
        assert!(result.success);
    }

    #[test]
    fn test_isolate_converts_errors() {
        let result = isolate(EngineKind::Easy, || {
            Err(OcrError::Recognition("model exploded".to_string()))
        });

        assert!(!result.success);
        assert_eq!(result.engine, "easyocr");
        assert_eq!(
            result.error.as_deref(),
            Some("OCR processing failed: model exploded")
        );
    }

    #[test]
    fn test_isolate_converts_panics() {
        let result = isolate(EngineKind::Tesseract, || panic!("index out of bounds"));

        assert!(!result.success);
        assert_eq!(result.engine, "tesseract");
        assert!(result.error.unwrap().contains("index out of bounds"));
    }

    #[test]
    fn test_factory_reports_unreachable_sidecar() {
        let backends = BackendSettings {
            paddle_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            autostart_sidecars: false,
            ..BackendSettings::default()
        };
        let factory = BackendFactory::new(backends, LayoutConfig::default());

        let result = factory.create(&EngineConfig::new(EngineKind::Paddle));
        assert!(matches!(result, Err(OcrError::EngineUnavailable(_))));
    }

    #[test]
    fn test_factory_reports_failed_server_start() {
        let dir = tempfile::tempdir().unwrap();
        let backends = BackendSettings {
            easyocr_url: "http://127.0.0.1:9".to_string(),
            sidecar_dir: Some(dir.path().to_path_buf()),
            ..BackendSettings::default()
        };
        let factory = BackendFactory::new(backends, LayoutConfig::default());

        let result = factory.create(&EngineConfig::new(EngineKind::Easy));
        match result {
            Err(OcrError::EngineUnavailable(message)) => {
                assert!(message.contains("easyocr_server.py"), "{}", message)
            }
            Err(other) => panic!("expected EngineUnavailable, got {}", other),
            Ok(_) => panic!("expected EngineUnavailable, got an engine"),
        }
    }
}
