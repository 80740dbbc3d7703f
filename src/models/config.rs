use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// OCR backend choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "paddleocr", alias = "paddle")]
    Paddle,
    #[serde(rename = "tesseract")]
    Tesseract,
    #[serde(rename = "easyocr", alias = "easy")]
    Easy,
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Paddle
    }
}

impl EngineKind {
    /// Engine identity reported in results
    pub fn name(&self) -> &'static str {
        match self {
            Self::Paddle => "paddleocr",
            Self::Tesseract => "tesseract",
            Self::Easy => "easyocr",
        }
    }

    /// Language used when the configuration does not name one
    pub fn default_language(&self) -> Language {
        match self {
            Self::Paddle => Language::Single("ch".to_string()),
            Self::Tesseract => Language::Single("chi_sim+eng".to_string()),
            Self::Easy => Language::List(vec!["ch_sim".to_string(), "en".to_string()]),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paddleocr" | "paddle" => Ok(Self::Paddle),
            "tesseract" => Ok(Self::Tesseract),
            "easyocr" | "easy" => Ok(Self::Easy),
            other => Err(OcrError::Configuration(format!(
                "Unknown OCR engine: {}. Supported engines: 'paddleocr', 'tesseract', 'easyocr'",
                other
            ))),
        }
    }
}

/// Language selection: one code string (`"chi_sim+eng"`) or a list of codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Language {
    Single(String),
    List(Vec<String>),
}

impl Language {
    /// Individual language codes, in order
    pub fn codes(&self) -> Vec<String> {
        let split = |s: &str| -> Vec<String> {
            s.split(|c| c == '+' || c == ',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect()
        };
        match self {
            Self::Single(s) => split(s),
            Self::List(list) => list.iter().flat_map(|s| split(s)).collect(),
        }
    }

    /// Whether both selections name the same set of codes
    pub fn same_codes(&self, other: &Language) -> bool {
        let a: BTreeSet<String> = self.codes().into_iter().collect();
        let b: BTreeSet<String> = other.codes().into_iter().collect();
        a == b
    }

    /// Codes joined the way Tesseract expects (`eng+deu`)
    pub fn tesseract_spec(&self) -> String {
        self.codes().join("+")
    }

}

impl FromStr for Language {
    type Err = OcrError;

    /// Parse a request-supplied language: `"ch_sim,en"` becomes a list
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OcrError::Configuration("Empty language code".to_string()));
        }
        if trimmed.contains(',') {
            Ok(Self::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(str::to_string)
                    .collect(),
            ))
        } else {
            Ok(Self::Single(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(s) => f.write_str(s),
            Self::List(list) => f.write_str(&list.join(",")),
        }
    }
}

/// Engine selection and its recognition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine_kind: EngineKind,
    /// Falls back to the engine's default language when absent
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub use_gpu: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(EngineKind::default())
    }
}

impl EngineConfig {
    pub fn new(engine_kind: EngineKind) -> Self {
        Self {
            engine_kind,
            language: None,
            use_gpu: false,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Configured language or the engine default
    pub fn effective_language(&self) -> Language {
        self.language
            .clone()
            .unwrap_or_else(|| self.engine_kind.default_language())
    }
}

/// Layout reconstruction heuristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Fraction of the previous fragment's height within which centers share a row
    pub row_threshold: f64,
    /// Horizontal pixels represented by one space character
    pub pixels_per_space: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_threshold: 0.5,
            pixels_per_space: 10.0,
        }
    }
}

/// Binarization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    /// Global automatic threshold
    Otsu,
    /// Local Gaussian-weighted threshold
    Adaptive,
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        Self::Otsu
    }
}

impl FromStr for ThresholdMethod {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "otsu" => Ok(Self::Otsu),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(OcrError::Configuration(format!(
                "Unknown threshold method: {}",
                other
            ))),
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub grayscale: bool,
    pub threshold: bool,
    pub threshold_method: ThresholdMethod,
    pub denoise: bool,
    pub deskew: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            grayscale: true,
            threshold: true,
            threshold_method: ThresholdMethod::Otsu,
            denoise: true,
            deskew: false,
        }
    }
}

/// Where the engine backends live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// PaddleOCR inference server
    pub paddle_url: String,
    /// EasyOCR inference server
    pub easyocr_url: String,
    /// Per-request timeout for the inference servers
    pub request_timeout_secs: u64,
    /// Tesseract executable
    pub tesseract_bin: String,
    /// Start the bundled server when nothing answers on its URL
    pub autostart_sidecars: bool,
    /// Interpreter for the bundled server scripts
    pub python_bin: String,
    /// Directory holding `paddle_server.py` and `easyocr_server.py`.
    /// Searched next to the executable and in `./sidecars` when unset.
    pub sidecar_dir: Option<PathBuf>,
    pub startup_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            paddle_url: "http://127.0.0.1:8866".to_string(),
            easyocr_url: "http://127.0.0.1:8867".to_string(),
            request_timeout_secs: 120,
            tesseract_bin: "tesseract".to_string(),
            autostart_sidecars: true,
            python_bin: "python3".to_string(),
            sidecar_dir: None,
            // first start downloads model weights
            startup_timeout_secs: 300,
        }
    }
}

impl BackendSettings {
    /// Server URL for an out-of-process engine; Tesseract has none
    pub fn url_for(&self, kind: EngineKind) -> &str {
        match kind {
            EngineKind::Paddle => &self.paddle_url,
            EngineKind::Easy => &self.easyocr_url,
            EngineKind::Tesseract => "",
        }
    }
}

/// Accepted input files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputLimits {
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
    pub max_file_size_mb: u64,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            max_file_size_mb: 5,
        }
    }
}

impl InputLimits {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&extension))
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub backends: BackendSettings,
    pub layout: LayoutConfig,
    pub preprocessing: PreprocessingConfig,
    pub input: InputLimits,
    /// Worker threads for batch recognition
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            backends: BackendSettings::default(),
            layout: LayoutConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            input: InputLimits::default(),
            workers: 2,
        }
    }
}
