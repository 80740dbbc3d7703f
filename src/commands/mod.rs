pub mod config;
pub mod ocr;

pub use config::{load_config, save_config, update_config, ConfigOverrides};
pub use ocr::{OcrRequest, OcrWorkflow};
