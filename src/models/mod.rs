pub mod config;
pub mod fragment;
pub mod ocr_result;
pub mod region;
