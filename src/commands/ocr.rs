use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use rayon::prelude::*;
use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::error::{OcrError, Result};
use crate::models::config::{AppConfig, EngineKind, InputLimits, Language, PreprocessingConfig};
use crate::models::ocr_result::RecognitionResult;
use crate::models::region::CropRegion;
use crate::services::ocr::{ImagePreprocessor, OcrService};

/// One recognition request
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    pub image_path: PathBuf,
    /// Run the preprocessing pipeline (Tesseract only)
    pub preprocess: bool,
    /// Request-scoped language override
    pub language: Option<Language>,
    pub crop: Option<CropRegion>,
}

impl OcrRequest {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            preprocess: true,
            language: None,
            crop: None,
        }
    }

    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_crop(mut self, crop: CropRegion) -> Self {
        self.crop = Some(crop);
        self
    }
}

/// Request workflow around the OCR service: validate, crop, preprocess,
/// recognize. Intermediate images live in a scratch directory that is removed
/// when the request finishes.
pub struct OcrWorkflow {
    service: Arc<OcrService>,
    preprocessor: ImagePreprocessor,
    limits: InputLimits,
    workers: usize,
}

impl OcrWorkflow {
    pub fn new(
        service: Arc<OcrService>,
        preprocessing: PreprocessingConfig,
        limits: InputLimits,
        workers: usize,
    ) -> Self {
        Self {
            service,
            preprocessor: ImagePreprocessor::new(preprocessing),
            limits,
            workers: workers.max(1),
        }
    }

    /// Workflow over the real engines described by `config`
    pub fn from_config(config: &AppConfig) -> Self {
        let service = OcrService::new(
            config.engine.clone(),
            config.backends.clone(),
            config.layout,
        );
        Self::new(
            Arc::new(service),
            config.preprocessing,
            config.input.clone(),
            config.workers,
        )
    }

    pub fn service(&self) -> &OcrService {
        &self.service
    }

    /// Run one request.
    ///
    /// Crop and preprocessing problems fall back to the previous image;
    /// `Err` means the input was rejected or the engine could not be built.
    pub fn run(&self, request: &OcrRequest) -> Result<RecognitionResult> {
        let source = request.image_path.as_path();
        info!(
            "OCR request for {}, preprocess={}, language={:?}",
            source.display(),
            request.preprocess,
            request.language.as_ref().map(|l| l.to_string())
        );

        // a missing file is reported by the service as a failed result
        if !source.exists() {
            return self.service.process(source, request.language.as_ref());
        }
        self.validate(source)?;

        let scratch = tempfile::Builder::new().prefix("ocr-service-").tempdir()?;
        let mut input = source.to_path_buf();

        if let Some(region) = request.crop.filter(CropRegion::is_valid) {
            info!("Crop parameters: {}", region);
            match self.crop_to(&input, &region, &scratch) {
                Ok(cropped) => input = cropped,
                Err(e) => error!("Failed to crop image: {}", e),
            }
        }

        let kind = self.service.engine_kind();
        if !request.preprocess {
            info!("Preprocess: disabled, input={}", input.display());
        } else if kind != EngineKind::Tesseract {
            // the neural engines enhance internally and binarization loses detail
            info!("Preprocess: engine={}, applied=none", kind);
        } else {
            match self.preprocess_to(&input, &scratch) {
                Ok(processed) => {
                    info!("Preprocess: engine={}, input={}", kind, processed.display());
                    input = processed;
                }
                Err(e) => {
                    warn!("Preprocessing failed: {}, using original image", e);
                }
            }
        }

        let result = self.service.process(&input, request.language.as_ref())?;
        if result.success {
            info!(
                "OCR result: engine={}, text_len={}, lines={}, avg_conf={:?}",
                result.engine,
                result.text.chars().count(),
                result.fragments.len(),
                result.average_confidence()
            );
        }
        Ok(result)
    }

    /// Run requests on a pool of `workers` threads sharing the default engine.
    /// Results come back in request order.
    pub fn run_batch(&self, requests: &[OcrRequest]) -> Result<Vec<Result<RecognitionResult>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("ocr-worker-{}", i))
            .build()
            .map_err(|e| OcrError::Configuration(format!("Failed to start worker pool: {}", e)))?;

        info!("Batch of {} images on {} workers", requests.len(), self.workers);
        Ok(pool.install(|| requests.par_iter().map(|request| self.run(request)).collect()))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if !self.limits.allows_extension(extension) {
            return Err(OcrError::InvalidInput(format!(
                "Invalid file type. Allowed: {}",
                self.limits.allowed_extensions.join(", ")
            )));
        }

        let size = std::fs::metadata(path)?.len();
        if size > self.limits.max_file_size_bytes() {
            return Err(OcrError::InvalidInput(format!(
                "File too large. Maximum size: {}MB",
                self.limits.max_file_size_mb
            )));
        }
        Ok(())
    }

    fn crop_to(&self, input: &Path, region: &CropRegion, scratch: &TempDir) -> Result<PathBuf> {
        let image = self.preprocessor.load(input)?;
        let cropped = self.preprocessor.crop(&image, region);

        let output = scratch.path().join("cropped.png");
        cropped.save_with_format(&output, ImageFormat::Png)?;
        info!("Image cropped to {}x{}", cropped.width(), cropped.height());
        Ok(output)
    }

    fn preprocess_to(&self, input: &Path, scratch: &TempDir) -> Result<PathBuf> {
        let preprocessor = &self.preprocessor;
        let processed = panic::catch_unwind(AssertUnwindSafe(|| preprocessor.preprocess(input)))
            .map_err(|_| OcrError::Preprocessing("pipeline panicked".to_string()))??;

        let output = scratch.path().join("processed.png");
        processed.save_with_format(&output, ImageFormat::Png)?;
        Ok(output)
    }
}
