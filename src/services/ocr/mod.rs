pub mod easyocr;
pub mod engine;
pub mod geometry;
pub mod http_ocr;
pub mod layout;
pub mod paddle;
pub mod preprocessing;
pub mod service;
pub mod sidecar;
pub mod tesseract;

// Re-export main types
pub use engine::{BackendFactory, EngineFactory, OcrEngine};
pub use layout::{reconstruct_layout, LayoutReconstructor};
pub use preprocessing::ImagePreprocessor;
pub use service::OcrService;
