//! CLI for document field extraction
//!
//! Runs the extraction pipeline against an image file, replays captured model
//! output through the normalizer, or classifies an upload. Results are
//! printed to stdout as JSON; logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kyc_extraction::ai::OpenAIRequester;
use kyc_extraction::{
    system_prompt, DocumentKind, ExtractedFields, KycExtractor, Normalizer, SpanStrategy,
    UploadClassification, VisionConfig,
};

#[derive(Parser)]
#[command(name = "kyc")]
#[command(about = "Extract identity document fields with a vision model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a document image to the vision model and print the cleaned fields
    Extract {
        /// JPEG or PNG image of the document
        image: PathBuf,

        /// Document kind (pan, aadhaar, passport, generic); inferred from the file name if omitted
        #[arg(long)]
        kind: Option<DocumentKind>,

        /// Also print the model's raw reply
        #[arg(long)]
        raw: bool,

        /// Stop at the brace matching the first `{` instead of the last `}`
        #[arg(long)]
        balanced: bool,

        /// Override KYC_VISION_MODEL
        #[arg(long)]
        model: Option<String>,

        /// Override KYC_VISION_BASE_URL
        #[arg(long)]
        base_url: Option<String>,

        /// Override KYC_VISION_TIMEOUT_SECS (0 disables)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Normalize captured model output read from a file or stdin
    Normalize {
        /// File with the raw reply; stdin when omitted
        file: Option<PathBuf>,

        #[arg(long, default_value = "pan")]
        kind: DocumentKind,

        #[arg(long)]
        balanced: bool,
    },

    /// Classify an upload by file name and content type
    Classify {
        filename: String,
        content_type: String,
    },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct ExtractResponse {
    kind: DocumentKind,
    model: String,
    fields: ExtractedFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

#[derive(Serialize)]
struct ClassifyResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification: Option<UploadClassification>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kyc_extraction=debug,openai_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            image,
            kind,
            raw,
            balanced,
            model,
            base_url,
            timeout_secs,
        } => {
            let mut config = VisionConfig::from_env().context("Failed to load configuration")?;
            if let Some(model) = model {
                config = config.with_model(model);
            }
            if let Some(base_url) = base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(secs) = timeout_secs {
                config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
            }

            let kind = kind.unwrap_or_else(|| DocumentKind::infer_from_filename(&file_name(&image)));
            run_extract(&config, &image, kind, raw, span_strategy(balanced)).await
        }
        Commands::Normalize {
            file,
            kind,
            balanced,
        } => run_normalize(file.as_deref(), kind, span_strategy(balanced)),
        Commands::Classify {
            filename,
            content_type,
        } => {
            let classification = DocumentKind::classify(&filename, &content_type);
            print_json(&ClassifyResponse {
                accepted: classification.is_some(),
                classification,
            })
        }
    }
}

async fn run_extract(
    config: &VisionConfig,
    image_path: &Path,
    kind: DocumentKind,
    include_raw: bool,
    span: SpanStrategy,
) -> Result<()> {
    let image = std::fs::read(image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;
    if image.is_empty() {
        bail!("Image {} is empty", image_path.display());
    }

    let policy = kind.policy();
    let requester = OpenAIRequester::from_config(config).with_system_prompt(system_prompt(&policy));
    let extractor = KycExtractor::new(requester, policy)
        .with_timeout(config.timeout)
        .with_span_strategy(span);

    tracing::info!(
        image = %image_path.display(),
        kind = %kind,
        model = %config.model,
        base_url = %config.base_url,
        "Extracting document fields"
    );

    let extraction = extractor
        .extract(&image)
        .await
        .with_context(|| format!("Extraction failed for {}", image_path.display()))?;

    print_json(&ExtractResponse {
        kind,
        model: config.model.clone(),
        fields: extraction.fields,
        raw: include_raw.then(|| extraction.raw.into_string()),
    })
}

fn run_normalize(file: Option<&Path>, kind: DocumentKind, span: SpanStrategy) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let fields = Normalizer::for_kind(kind)
        .with_span_strategy(span)
        .normalize(&raw)
        .context("Failed to normalize model output")?;

    print_json(&fields)
}

fn span_strategy(balanced: bool) -> SpanStrategy {
    if balanced {
        SpanStrategy::Balanced
    } else {
        SpanStrategy::Greedy
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract_args() {
        let cli = Cli::try_parse_from([
            "kyc",
            "extract",
            "scans/aadhaar_front.jpg",
            "--kind",
            "aadhaar",
            "--raw",
            "--timeout-secs",
            "0",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract {
                image,
                kind,
                raw,
                balanced,
                timeout_secs,
                ..
            } => {
                assert_eq!(image, PathBuf::from("scans/aadhaar_front.jpg"));
                assert_eq!(kind, Some(DocumentKind::Aadhaar));
                assert!(raw);
                assert!(!balanced);
                assert_eq!(timeout_secs, Some(0));
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["kyc", "normalize", "--kind", "licence"]).is_err());
    }

    #[test]
    fn test_normalize_defaults_to_pan() {
        let cli = Cli::try_parse_from(["kyc", "normalize"]).unwrap();
        match cli.command {
            Commands::Normalize {
                file,
                kind,
                balanced,
            } => {
                assert!(file.is_none());
                assert_eq!(kind, DocumentKind::Pan);
                assert!(!balanced);
            }
            _ => panic!("expected normalize"),
        }
    }

    #[test]
    fn test_file_name_helper() {
        assert_eq!(file_name(Path::new("/tmp/Pan_Card.JPG")), "Pan_Card.JPG");
        assert_eq!(file_name(Path::new("/")), "");
    }
}
