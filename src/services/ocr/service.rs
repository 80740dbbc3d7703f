use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::engine::{BackendFactory, EngineFactory, OcrEngine};
use crate::error::Result;
use crate::models::config::{BackendSettings, EngineConfig, EngineKind, Language, LayoutConfig};
use crate::models::ocr_result::RecognitionResult;

/// OCR service façade.
///
/// Owns the default engine configuration and one lazily built adapter for it.
/// A request with a different language gets its own short-lived adapter; the
/// default is never reconfigured.
pub struct OcrService {
    config: EngineConfig,
    factory: Arc<dyn EngineFactory>,
    engine: Mutex<Option<Arc<dyn OcrEngine>>>,
}

impl OcrService {
    /// Service backed by the real engines
    pub fn new(config: EngineConfig, backends: BackendSettings, layout: LayoutConfig) -> Self {
        Self::with_factory(config, Arc::new(BackendFactory::new(backends, layout)))
    }

    pub fn with_factory(config: EngineConfig, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            config,
            factory,
            engine: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.config.engine_kind
    }

    /// Whether the default adapter has been built
    pub fn is_ready(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// Recognize text in `image_path`.
    ///
    /// A missing file yields a failed result without building any adapter.
    /// `Err` is reserved for configuration and construction failures.
    pub fn process(&self, image_path: &Path, language: Option<&Language>) -> Result<RecognitionResult> {
        if !image_path.exists() {
            warn!("Image file not found: {}", image_path.display());
            return Ok(RecognitionResult::failed(
                self.engine_kind().name(),
                format!("Image file not found: {}", image_path.display()),
            ));
        }

        let engine = match language {
            Some(language) if !self.config.effective_language().same_codes(language) => {
                debug!("Language override {} for {}", language, image_path.display());
                let scoped = self.config.clone().with_language(language.clone());
                self.factory.create(&scoped)?
            }
            _ => self.default_engine()?,
        };

        info!(
            "Processing {} with {}",
            image_path.display(),
            engine.kind()
        );
        let result = engine.recognize(image_path);

        if result.success {
            info!(
                "OCR finished: {} fragments, avg confidence {:?}",
                result.fragments.len(),
                result.average_confidence()
            );
        }
        Ok(result)
    }

    /// Shared default adapter, built on first use.
    ///
    /// A failed build is not remembered; the next call tries again.
    fn default_engine(&self) -> Result<Arc<dyn OcrEngine>> {
        let mut slot = self.engine.lock();
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        info!("Initializing {} engine", self.config.engine_kind);
        let engine = self.factory.create(&self.config)?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }
}
