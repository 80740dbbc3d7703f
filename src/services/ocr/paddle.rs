use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::{isolate, OcrEngine};
use super::http_ocr::{encode_image, SidecarClient};
use super::layout::LayoutReconstructor;
use crate::error::{OcrError, Result};
use crate::models::config::{BackendSettings, EngineConfig, EngineKind, LayoutConfig};
use crate::models::fragment::{BoundingBox, Fragment};
use crate::models::ocr_result::RecognitionResult;

#[derive(Serialize)]
struct PaddleRequest<'a> {
    image_base64: String,
    lang: &'a str,
    use_gpu: bool,
    use_angle_cls: bool,
}

/// Single text box with its quadrilateral
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: [[f64; 2]; 4],
    text: String,
    score: f64,
}

#[derive(Deserialize)]
struct PaddleResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
}

/// PaddleOCR adapter backed by a PaddleOCR inference server
pub struct PaddleEngine {
    client: SidecarClient,
    lang: String,
    use_gpu: bool,
    layout: LayoutReconstructor,
}

impl PaddleEngine {
    /// Connect to the PaddleOCR server and validate the language selection
    pub fn new(config: &EngineConfig, backends: &BackendSettings, layout: LayoutConfig) -> Result<Self> {
        let lang = Self::single_language(config)?;
        let client = SidecarClient::connect(
            &backends.paddle_url,
            Duration::from_secs(backends.request_timeout_secs),
        )?;

        info!("PaddleOCR initialized with lang={}, gpu={}", lang, config.use_gpu);

        Ok(Self::with_client(client, lang, config.use_gpu, layout))
    }

    fn with_client(client: SidecarClient, lang: String, use_gpu: bool, layout: LayoutConfig) -> Self {
        Self {
            client,
            lang,
            use_gpu,
            layout: LayoutReconstructor::new(layout),
        }
    }

    /// PaddleOCR loads exactly one language model
    fn single_language(config: &EngineConfig) -> Result<String> {
        let codes = config.effective_language().codes();
        match codes.as_slice() {
            [code] => Ok(code.clone()),
            [] => Err(OcrError::Configuration("PaddleOCR needs a language code".to_string())),
            _ => Err(OcrError::Configuration(format!(
                "PaddleOCR takes a single language, got {}",
                codes.join(",")
            ))),
        }
    }

    fn run(&self, image_path: &Path) -> Result<RecognitionResult> {
        let image_base64 = encode_image(image_path)?;
        let response: PaddleResponse = self.client.post_json(
            "/ocr",
            &PaddleRequest {
                image_base64,
                lang: &self.lang,
                use_gpu: self.use_gpu,
                use_angle_cls: true,
            },
        )?;

        let fragments = to_fragments(response.boxes);
        if fragments.is_empty() {
            return Ok(RecognitionResult::empty(EngineKind::Paddle.name()));
        }

        let text = self.layout.reconstruct(&fragments);
        Ok(RecognitionResult::recognized(
            EngineKind::Paddle.name(),
            text,
            fragments,
        ))
    }
}

/// Confidence already lies in [0, 1]; boxes are kept as quadrilaterals
fn to_fragments(boxes: Vec<TextBox>) -> Vec<Fragment> {
    boxes
        .into_iter()
        .map(|b| {
            Fragment::new(
                b.text,
                b.score,
                BoundingBox::quad(b.bbox.map(|[x, y]| (x, y))),
            )
        })
        .collect()
}

impl OcrEngine for PaddleEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Paddle
    }

    fn recognize(&self, image_path: &Path) -> RecognitionResult {
        isolate(EngineKind::Paddle, || self.run(image_path))
    }
}
