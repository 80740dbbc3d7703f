use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ocr_service::commands::{load_config, update_config, ConfigOverrides};
use ocr_service::models::config::{PreprocessingConfig, ThresholdMethod};
use ocr_service::{CropRegion, EngineKind, ImagePreprocessor, Language, OcrRequest, OcrWorkflow};

#[derive(Parser, Debug)]
#[command(name = "ocr-service", version, about = "Layout-preserving OCR for image files")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize text, printing one JSON result per image
    Recognize(RecognizeArgs),
    /// Run the preprocessing pipeline and write the result
    Preprocess(PreprocessArgs),
    /// Print the effective configuration, optionally changing and saving it
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct RecognizeArgs {
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// paddleocr, tesseract or easyocr
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Language for this run, e.g. `eng`, `chi_sim+eng` or `ch_sim,en`
    #[arg(long)]
    lang: Option<Language>,

    #[arg(long)]
    gpu: bool,

    #[arg(long)]
    no_preprocess: bool,

    /// x,y,width,height
    #[arg(long, allow_hyphen_values = true)]
    crop: Option<CropRegion>,

    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct PreprocessArgs {
    input: PathBuf,
    output: PathBuf,

    #[arg(long, default_value = "otsu")]
    threshold: ThresholdMethod,

    #[arg(long)]
    deskew: bool,

    #[arg(long)]
    no_denoise: bool,

    #[arg(long)]
    no_threshold: bool,

    #[arg(long)]
    no_grayscale: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Default language for the configured engine
    #[arg(long)]
    lang: Option<Language>,

    #[arg(long)]
    gpu: bool,

    #[arg(long)]
    workers: Option<usize>,

    /// Write the result back to the config file
    #[arg(long)]
    save: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocr_service=info"));
    // stdout carries results
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn recognize(cli_config: Option<PathBuf>, args: RecognizeArgs) -> Result<bool> {
    let stored = load_config(cli_config.as_deref()).context("Failed to load configuration")?;
    let overrides = ConfigOverrides {
        engine: args.engine,
        // --lang scopes each request; the stored default stays as is
        language: None,
        use_gpu: args.gpu,
        workers: args.workers,
    };
    let config = overrides.apply(stored);
    info!(
        "Engine {} ({} workers)",
        config.engine.engine_kind, config.workers
    );

    let workflow = OcrWorkflow::from_config(&config);
    let requests: Vec<OcrRequest> = args
        .images
        .iter()
        .map(|image| {
            let mut request = OcrRequest::new(image).with_preprocess(!args.no_preprocess);
            if let Some(lang) = &args.lang {
                request = request.with_language(lang.clone());
            }
            if let Some(crop) = args.crop {
                request = request.with_crop(crop);
            }
            request
        })
        .collect();

    let mut all_ok = true;
    for (request, outcome) in requests.iter().zip(workflow.run_batch(&requests)?) {
        match outcome {
            Ok(result) => {
                all_ok &= result.success;
                println!("{}", serde_json::to_string(&result)?);
            }
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| {
                    format!("Cannot process {}", request.image_path.display())
                });
            }
            Err(e) => {
                all_ok = false;
                error!("{}: {}", request.image_path.display(), e);
            }
        }
    }
    Ok(all_ok)
}

fn preprocess(args: PreprocessArgs) -> Result<()> {
    let preprocessor = ImagePreprocessor::new(PreprocessingConfig {
        grayscale: !args.no_grayscale,
        threshold: !args.no_threshold,
        threshold_method: args.threshold,
        denoise: !args.no_denoise,
        deskew: args.deskew,
    });

    let image = preprocessor
        .preprocess(&args.input)
        .with_context(|| format!("Failed to preprocess {}", args.input.display()))?;
    preprocessor
        .save(&image, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!("Wrote {}", args.output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Recognize(args) => {
            if !recognize(cli.config, args)? {
                std::process::exit(2);
            }
        }
        Command::Preprocess(args) => preprocess(args)?,
        Command::Config(args) => {
            let overrides = ConfigOverrides {
                engine: args.engine,
                language: args.lang,
                use_gpu: args.gpu,
                workers: args.workers,
            };
            let config = update_config(cli.config.as_deref(), &overrides, args.save)
                .context("Failed to update configuration")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
