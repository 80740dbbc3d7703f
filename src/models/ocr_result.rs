use serde::{Deserialize, Serialize};

use super::fragment::Fragment;

/// Outcome of one OCR call.
///
/// Failures are carried in the value (`success == false` plus `error`)
/// instead of being raised, so a caller can always build a response from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub success: bool,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "lines", default)]
    pub fragments: Vec<Fragment>,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecognitionResult {
    /// Successful recognition
    pub fn recognized(engine: &str, text: String, fragments: Vec<Fragment>) -> Self {
        Self {
            success: true,
            text,
            fragments,
            engine: engine.to_string(),
            error: None,
        }
    }

    /// Successful recognition of an image with no detectable text
    pub fn empty(engine: &str) -> Self {
        Self::recognized(engine, String::new(), Vec::new())
    }

    /// Failed recognition
    pub fn failed(engine: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            fragments: Vec::new(),
            engine: engine.to_string(),
            error: Some(error.into()),
        }
    }

    /// Mean fragment confidence, `None` when nothing was recognized
    pub fn average_confidence(&self) -> Option<f64> {
        if self.fragments.is_empty() {
            return None;
        }
        let total: f64 = self.fragments.iter().map(|f| f.confidence).sum();
        Some(total / self.fragments.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fragment::BoundingBox;

    #[test]
    fn test_failed_result_serialization() {
        let result = RecognitionResult::failed("tesseract", "boom");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["engine"], "tesseract");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["lines"].as_array().map(|l| l.len()), Some(0));
    }

    #[test]
    fn test_error_is_omitted_on_success() {
        let result = RecognitionResult::empty("easyocr");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["text"], "");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_average_confidence() {
        let bbox = BoundingBox::rect(0.0, 0.0, 10.0, 10.0);
        let result = RecognitionResult::recognized(
            "paddleocr",
            "a b".to_string(),
            vec![Fragment::new("a", 0.5, bbox), Fragment::new("b", 1.0, bbox)],
        );
        assert_eq!(result.average_confidence(), Some(0.75));
        assert_eq!(RecognitionResult::empty("paddleocr").average_confidence(), None);
    }
}
