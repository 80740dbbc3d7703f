//! OCR over image files.
//!
//! Three interchangeable engines (PaddleOCR and EasyOCR inference servers, the
//! Tesseract CLI) sit behind one [`OcrEngine`] trait. Their fragments are
//! normalized into a [`RecognitionResult`] whose text is rebuilt from fragment
//! geometry so rows and horizontal gaps survive. An optional preprocessing
//! pipeline prepares scans for Tesseract.

pub mod commands;
pub mod error;
pub mod models;
pub mod services;

pub use commands::{OcrRequest, OcrWorkflow};
pub use error::{OcrError, Result};
pub use models::config::{AppConfig, EngineConfig, EngineKind, Language};
pub use models::fragment::{BoundingBox, Fragment};
pub use models::ocr_result::RecognitionResult;
pub use models::region::CropRegion;
pub use services::ocr::{
    reconstruct_layout, ImagePreprocessor, LayoutReconstructor, OcrEngine, OcrService,
};
