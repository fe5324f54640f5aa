//! # office-to-pdf-core
//!
//! Office document to PDF conversion on top of an external rendering engine.
//!
//! The crate does not parse or lay out documents itself. It:
//!
//! - validates requests (one file, per-family extension whitelist, 50 MiB cap)
//! - owns a lazily initialized, shared engine handle ([`ConverterProvider`])
//! - reports progress, including a synthetic ticker while the engine works
//! - enforces a conversion timeout and honors cancellation at checkpoints
//! - folds every failure into a small [`ErrorKind`] taxonomy
//!
//! The bundled engine is headless **LibreOffice** ([`LibreOfficeEngine`]);
//! anything implementing [`PdfEngine`] can be plugged in instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use office_to_pdf_core::{progress, InputFile, ProcessInput, ProcessOutput, Processor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let processor = Processor::document();
//!     let input = ProcessInput::single(InputFile::from_path("Report.docx")?);
//!
//!     let on_progress = progress::callback(|percent, message| {
//!         println!("{:>3}% {}", percent, message);
//!     });
//!
//!     match processor.process(input, Some(on_progress)).await {
//!         ProcessOutput::Success(pdf) => std::fs::write(&pdf.filename, &pdf.data)?,
//!         ProcessOutput::Failure(e) => eprintln!("{}", e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom engines
//!
//! ```rust,no_run
//! use office_to_pdf_core::{
//!     ConverterProvider, DocumentFamily, EngineConfig, Processor, ProcessorConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> office_to_pdf_core::Result<()> {
//! let provider = Arc::new(ConverterProvider::libreoffice(EngineConfig::default()));
//! let config = ProcessorConfig::default().conversion_timeout(Duration::from_secs(60));
//!
//! // Both processors share one engine
//! let slides = Processor::new(DocumentFamily::Presentation, Arc::clone(&provider), config.clone())?;
//! let docs = Processor::new(DocumentFamily::Document, provider, config)?;
//! # let _ = (slides, docs);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod family;
pub mod input;
pub mod libreoffice;
pub mod processor;
pub mod progress;
pub mod provider;

// Re-export main types for convenience
pub use config::{EngineConfig, ProcessorConfig, Settings};
pub use engine::PdfEngine;
pub use error::{EngineError, ErrorKind, ProcessError, Result};
pub use family::{is_supported_extension, DocumentFamily, SUPPORTED_EXTENSIONS};
pub use input::{FileContent, InputFile, ProcessInput, ProcessOptions};
pub use libreoffice::LibreOfficeEngine;
pub use processor::{output_filename, ConvertedPdf, ProcessOutput, Processor};
pub use progress::{ProgressCallback, ProgressState};
pub use provider::{shared_provider, ConverterProvider, ProviderStatus};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
