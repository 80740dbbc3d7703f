use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, info};

use super::engine::{isolate, OcrEngine};
use crate::error::{OcrError, Result};
use crate::models::config::{BackendSettings, EngineConfig, EngineKind};
use crate::models::fragment::{BoundingBox, Fragment};
use crate::models::ocr_result::RecognitionResult;

/// Tesseract OCR engine implementation driving the `tesseract` binary
pub struct TesseractEngine {
    bin: String,
    /// Language spec as passed to `-l` (`chi_sim+eng`)
    lang: String,
}

impl TesseractEngine {
    /// Create a new Tesseract engine instance.
    ///
    /// Fails when the binary cannot run or a requested language has no
    /// installed traineddata.
    pub fn new(config: &EngineConfig, backends: &BackendSettings) -> Result<Self> {
        let language = config.effective_language();
        let lang = language.tesseract_spec();
        if lang.is_empty() {
            return Err(OcrError::Configuration("Tesseract needs a language code".to_string()));
        }

        let bin = backends.tesseract_bin.clone();
        let version = Self::version(&bin)?;
        let available = Self::installed_languages(&bin)?;

        let missing = missing_languages(&language.codes(), &available);
        if !missing.is_empty() {
            return Err(OcrError::Configuration(format!(
                "Tesseract language data not installed: {}",
                missing.join(", ")
            )));
        }

        info!("Tesseract {} initialized with lang={}", version, lang);
        Ok(Self { bin, lang })
    }

    fn command(bin: &str, args: &[&str]) -> Result<Output> {
        Command::new(bin).args(args).output().map_err(|e| {
            OcrError::EngineUnavailable(format!(
                "Tesseract not found ({}): {}. Please install Tesseract OCR",
                bin, e
            ))
        })
    }

    fn version(bin: &str) -> Result<String> {
        let output = Self::command(bin, &["--version"])?;
        if !output.status.success() {
            return Err(OcrError::EngineUnavailable(format!(
                "Tesseract --version failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // Older releases print the banner on stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        Ok(banner.lines().next().unwrap_or("").trim().to_string())
    }

    fn installed_languages(bin: &str) -> Result<HashSet<String>> {
        let output = Self::command(bin, &["--list-langs"])?;
        if !output.status.success() {
            return Err(OcrError::EngineUnavailable(format!(
                "Tesseract --list-langs failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut listing = String::from_utf8_lossy(&output.stdout).to_string();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&listing))
    }

    /// Run tesseract on `image_path` writing to stdout, with optional config
    fn run_tesseract(&self, image_path: &Path, config: Option<&str>) -> Result<String> {
        let mut command = Command::new(&self.bin);
        command.arg(image_path).arg("stdout").arg("-l").arg(&self.lang);
        if let Some(config) = config {
            command.arg(config);
        }

        let output = command
            .output()
            .map_err(|e| OcrError::Recognition(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            return Err(OcrError::Recognition(format!(
                "Tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run(&self, image_path: &Path) -> Result<RecognitionResult> {
        let tsv = self.run_tesseract(image_path, Some("tsv"))?;
        let fragments = parse_tsv(&tsv);

        // Tesseract's own text pass already follows reading order
        let text = self.run_tesseract(image_path, None)?.trim().to_string();
        debug!("Tesseract produced {} fragments", fragments.len());

        Ok(RecognitionResult::recognized(
            EngineKind::Tesseract.name(),
            text,
            fragments,
        ))
    }
}

impl OcrEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tesseract
    }

    fn recognize(&self, image_path: &Path) -> RecognitionResult {
        isolate(EngineKind::Tesseract, || self.run(image_path))
    }
}

/// Language names from `--list-langs` output (skips the header line)
fn parse_language_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(':') && !line.contains(' '))
        .map(str::to_string)
        .collect()
}

fn missing_languages(requested: &[String], available: &HashSet<String>) -> Vec<String> {
    requested
        .iter()
        .filter(|code| !available.contains(code.as_str()))
        .cloned()
        .collect()
}

/// Parse `tsv` output into fragments.
///
/// Rows with confidence <= 0 are layout rows or blank regions and are dropped;
/// the rest are rescaled from 0..100 to 0..1.
fn parse_tsv(tsv: &str) -> Vec<Fragment> {
    tsv.lines()
        .filter(|line| !line.starts_with("level"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 11 {
                return None;
            }

            let num = |i: usize| cols[i].trim().parse::<f64>().ok();
            let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);
            let conf = num(10)?;
            if conf.trunc() <= 0.0 {
                return None;
            }

            let text = cols.get(11).map(|t| t.trim_end_matches('\r')).unwrap_or("");
            Some(Fragment::new(
                text,
                conf / 100.0,
                BoundingBox::rect(left, top, width, height),
            ))
        })
        .collect()
}
