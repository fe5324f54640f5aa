//! `office2pdf`: convert one presentation or document to PDF.
//!
//! A thin shim over `office-to-pdf-core` that maps flags to settings, drives a
//! progress bar from the processor's callback and writes the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use office_to_pdf_core::{
    progress, ConverterProvider, DocumentFamily, InputFile, ProcessError, ProcessInput,
    ProcessOutput, Processor, Settings, SUPPORTED_EXTENSIONS,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "office2pdf", version, about = "Convert office documents to PDF via LibreOffice")]
struct Args {
    /// Presentation (.pptx .ppt .odp) or document (.docx .doc .odt .rtf)
    input: PathBuf,

    /// Output directory. Defaults to the input's directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Conversion timeout in seconds.
    #[arg(long, env = "OFFICE2PDF_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to the soffice binary.
    #[arg(long, env = "OFFICE2PDF_SOFFICE")]
    soffice: Option<PathBuf>,

    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result as JSON instead of a progress bar.
    #[arg(long)]
    json: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_json_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(secs) = self.timeout {
            settings.processor.conversion_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = &self.soffice {
            settings.engine.soffice_path = Some(path.clone());
        }
        Ok(settings)
    }
}

fn family_for(path: &Path) -> Result<DocumentFamily> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match DocumentFamily::from_extension(ext) {
        Some(family) => Ok(family),
        None => bail!(
            "unsupported file type '{}' (supported: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        ),
    }
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green/238}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// `--json` prints the failure and exits non-zero; otherwise it becomes the
/// command's error.
fn failure(e: &ProcessError, json: bool) -> Result<ExitCode> {
    if json {
        let summary = serde_json::json!({ "status": "failure", "error": e });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(ExitCode::FAILURE);
    }
    match &e.detail {
        Some(detail) => bail!("{} ({})", e, detail),
        None => bail!("{}", e),
    }
}

// Returns instead of calling `process::exit` so the engine's temp dirs are
// dropped.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = args.settings()?;
    let family = family_for(&args.input)?;
    debug!("Settings: {:?}", settings);

    let provider = Arc::new(ConverterProvider::libreoffice(settings.engine.clone()));
    let processor = Arc::new(Processor::new(family, provider, settings.processor.clone())?);

    let file = InputFile::from_path(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => args
            .input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let bar = progress_bar(args.json);
    let on_progress = {
        let bar = bar.clone();
        progress::callback(move |percent, message| {
            bar.set_position(u64::from(percent));
            bar.set_message(message.to_string());
        })
    };

    let cancel_on_ctrl_c = {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                processor.cancel();
            }
        })
    };

    info!("Converting {} as {}", args.input.display(), family);
    let output = processor
        .process(ProcessInput::single(file), Some(on_progress))
        .await;
    cancel_on_ctrl_c.abort();

    match output {
        ProcessOutput::Success(pdf) => {
            bar.finish_and_clear();
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("creating {}", output_dir.display()))?;
            let target = output_dir.join(&pdf.filename);
            std::fs::write(&target, &pdf.data)
                .with_context(|| format!("writing {}", target.display()))?;

            if args.json {
                let summary = serde_json::json!({
                    "status": "success",
                    "output": target,
                    "bytes": pdf.data.len(),
                    "metadata": pdf.metadata,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{} ({} bytes)", target.display(), pdf.data.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        ProcessOutput::Failure(e) => {
            bar.abandon();
            failure(&e, args.json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use office_to_pdf_core::ErrorKind;

    #[test]
    fn test_family_for_known_extensions() {
        assert_eq!(
            family_for(Path::new("talk.PPTX")).unwrap(),
            DocumentFamily::Presentation
        );
        assert_eq!(family_for(Path::new("a/b/memo.rtf")).unwrap(), DocumentFamily::Document);
    }

    #[test]
    fn test_family_for_unknown_extension_lists_supported() {
        let err = family_for(Path::new("sheet.xlsx")).unwrap_err().to_string();
        assert!(err.contains("sheet.xlsx"));
        assert!(err.contains("pptx"));
        assert!(err.contains("rtf"));
    }

    #[test]
    fn test_args_override_settings() {
        let args = Args::parse_from([
            "office2pdf",
            "deck.pptx",
            "--timeout",
            "42",
            "--soffice",
            "/opt/lo/soffice",
        ]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.processor.conversion_timeout, Duration::from_secs(42));
        assert_eq!(
            settings.engine.soffice_path,
            Some(PathBuf::from("/opt/lo/soffice"))
        );
    }

    #[test]
    fn test_json_failure_returns_exit_code() {
        let e = ProcessError::new(ErrorKind::ProcessingFailed, "Failed to convert document to PDF");
        let code = failure(&e, true).unwrap();
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn test_plain_failure_is_an_error_with_detail() {
        let e = ProcessError::new(ErrorKind::ProcessingFailed, "Failed to convert document to PDF")
            .with_detail("soffice exited with 1");
        let msg = failure(&e, false).unwrap_err().to_string();
        assert!(msg.contains("PROCESSING_FAILED"));
        assert!(msg.contains("soffice exited with 1"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["office2pdf", "doc.docx"]);
        assert!(args.output.is_none());
        assert!(!args.json);
        assert_eq!(args.settings().unwrap(), Settings::default());
    }
}
