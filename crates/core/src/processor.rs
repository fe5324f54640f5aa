//! Validate one office file, drive the engine, and package the PDF.
//!
//! A [`Processor`] serves one [`DocumentFamily`]. Each `process` call walks
//! `Validating -> AwaitingEngine -> Converting` and ends in a success or in a
//! [`ProcessError`]; nothing escapes as a panic or an `Err`.
//!
//! Progress bands: 5% while the engine loads (engine progress scaled into
//! 5..=80), 85% when conversion starts, then a synthetic +1 every tick up to
//! the configured ceiling, and 100% on success. Cancellation is sampled right
//! after the engine is obtained and again after a successful conversion.

use crate::config::ProcessorConfig;
use crate::error::{ErrorKind, ProcessError, Result};
use crate::family::DocumentFamily;
use crate::input::{InputFile, ProcessInput};
use crate::progress::{ProgressCallback, ProgressState, ProgressTracker, TickerGuard};
use crate::provider::{shared_provider, ConverterProvider};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A converted PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedPdf {
    pub data: Vec<u8>,
    /// Source name with its extension replaced by `.pdf`.
    pub filename: String,
    /// Always contains `format = "pdf"`.
    pub metadata: BTreeMap<String, String>,
}

/// Result of one `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    Success(ConvertedPdf),
    Failure(ProcessError),
}

impl ProcessOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutput::Success(_))
    }

    /// Failure kind, if this is a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ProcessOutput::Success(_) => None,
            ProcessOutput::Failure(e) => Some(e.kind),
        }
    }

    pub fn into_result(self) -> std::result::Result<ConvertedPdf, ProcessError> {
        match self {
            ProcessOutput::Success(pdf) => Ok(pdf),
            ProcessOutput::Failure(e) => Err(e),
        }
    }
}

/// Converts files of one family to PDF.
pub struct Processor {
    family: DocumentFamily,
    provider: Arc<ConverterProvider>,
    config: ProcessorConfig,
    cancelled: AtomicBool,
    tracker: Mutex<Arc<ProgressTracker>>,
    /// Serializes `process` calls on this instance.
    in_flight: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("family", &self.family)
            .field("config", &self.config)
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .field("progress", &self.progress())
            .finish()
    }
}

impl Processor {
    /// Create a processor with an explicit provider and configuration.
    pub fn new(
        family: DocumentFamily,
        provider: Arc<ConverterProvider>,
        config: ProcessorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            family,
            provider,
            config,
            cancelled: AtomicBool::new(false),
            tracker: Mutex::new(ProgressTracker::new(None)),
            in_flight: tokio::sync::Mutex::new(()),
        })
    }

    fn with_defaults(family: DocumentFamily) -> Self {
        Self {
            family,
            provider: shared_provider(),
            config: ProcessorConfig::default(),
            cancelled: AtomicBool::new(false),
            tracker: Mutex::new(ProgressTracker::new(None)),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// PowerPoint/ODP processor on the process-wide LibreOffice provider.
    pub fn presentation() -> Self {
        Self::with_defaults(DocumentFamily::Presentation)
    }

    /// Word/ODT/RTF processor on the process-wide LibreOffice provider.
    pub fn document() -> Self {
        Self::with_defaults(DocumentFamily::Document)
    }

    pub fn family(&self) -> DocumentFamily {
        self.family
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Latest progress of the current (or last) call.
    pub fn progress(&self) -> ProgressState {
        self.current_tracker().snapshot()
    }

    /// Request cancellation. Observed at the next checkpoint; an engine call
    /// already running is not interrupted.
    pub fn cancel(&self) {
        info!("Cancellation requested for {} processor", self.family);
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stop any running ticker, clear the cancellation flag and zero progress.
    /// The current callback receives nothing further.
    pub fn reset(&self) {
        let fresh = ProgressTracker::new(None);
        let previous = std::mem::replace(&mut *self.lock_tracker(), fresh);
        previous.close();
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn lock_tracker(&self) -> MutexGuard<'_, Arc<ProgressTracker>> {
        self.tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.lock_tracker())
    }

    /// Convert the single file in `input` to PDF.
    pub async fn process(
        &self,
        input: ProcessInput,
        on_progress: Option<ProgressCallback>,
    ) -> ProcessOutput {
        let _exclusive = self.in_flight.lock().await;

        let request_id = Uuid::new_v4();
        let span = info_span!("process", family = %self.family, %request_id);

        let tracker = ProgressTracker::new(on_progress);
        let previous = std::mem::replace(&mut *self.lock_tracker(), Arc::clone(&tracker));
        previous.close();
        self.cancelled.store(false, Ordering::SeqCst);

        let start = Instant::now();
        match self.run(&input, &tracker).instrument(span.clone()).await {
            Ok(pdf) => {
                span.in_scope(|| {
                    info!(
                        "Converted {} to {} ({} bytes) in {:?}",
                        input.files[0].name,
                        pdf.filename,
                        pdf.data.len(),
                        start.elapsed()
                    )
                });
                ProcessOutput::Success(pdf)
            }
            Err(e) => {
                span.in_scope(|| match e.kind {
                    ErrorKind::ProcessingCancelled => info!("{}", e.message),
                    _ => warn!(
                        "Processing failed [{}]: {}{}",
                        e.kind,
                        e.message,
                        e.detail
                            .as_deref()
                            .map(|d| format!(" ({})", d))
                            .unwrap_or_default()
                    ),
                });
                ProcessOutput::Failure(e)
            }
        }
    }

    async fn run(
        &self,
        input: &ProcessInput,
        tracker: &Arc<ProgressTracker>,
    ) -> std::result::Result<ConvertedPdf, ProcessError> {
        let file = self.validate(input)?;
        debug!("Validated {:?} ({} bytes)", file.name, file.size);

        tracker.report(5, "Loading conversion engine...");
        let relay_to = Arc::clone(tracker);
        let relay: ProgressCallback = Arc::new(move |percent: u8, message: &str| {
            relay_to.report(scale_engine_progress(percent), message);
        });
        let engine = self.provider.get(Some(relay)).await.map_err(|e| {
            ProcessError::failed("Failed to load the conversion engine").with_detail(e.to_string())
        })?;

        self.checkpoint()?;

        let converting = format!("Converting {} to PDF...", self.family.noun());
        tracker.report(85, &converting);

        let outcome = {
            let _ticker = TickerGuard::start(
                Arc::clone(tracker),
                self.config.tick_interval,
                self.config.tick_ceiling,
            );
            tokio::time::timeout(self.config.conversion_timeout, engine.convert_to_pdf(file)).await
        };

        let data = match outcome {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                return Err(ProcessError::failed(format!(
                    "Failed to convert {} to PDF",
                    self.family.noun()
                ))
                .with_detail(e.to_string()))
            }
            Err(_elapsed) => {
                let secs = self.config.conversion_timeout.as_secs_f64();
                return Err(ProcessError::failed(format!(
                    "Conversion timed out after {} seconds. The {} may be too complex to convert.",
                    secs,
                    self.family.noun()
                ))
                .with_detail(format!(
                    "{} engine did not finish within {:?}",
                    engine.name(),
                    self.config.conversion_timeout
                )));
            }
        };

        self.checkpoint()?;

        tracker.report(100, "Conversion complete");
        let mut metadata = BTreeMap::new();
        metadata.insert("format".to_string(), "pdf".to_string());
        Ok(ConvertedPdf {
            data,
            filename: output_filename(&file.name, self.family),
            metadata,
        })
    }

    fn checkpoint(&self) -> std::result::Result<(), ProcessError> {
        if self.is_cancelled() {
            return Err(ProcessError::cancelled());
        }
        Ok(())
    }

    /// Exactly one file, whitelisted extension, within the size limit.
    fn validate<'a>(&self, input: &'a ProcessInput) -> std::result::Result<&'a InputFile, ProcessError> {
        let file = match input.files.as_slice() {
            [file] => file,
            files => {
                return Err(ProcessError::invalid_options(format!(
                    "Exactly one file must be provided (got {})",
                    files.len()
                )))
            }
        };

        let accepted = file
            .extension()
            .map(|ext| self.family.accepts(ext))
            .unwrap_or(false);
        if !accepted {
            return Err(ProcessError::file_type_invalid(format!(
                "Unsupported file type for '{}'. Supported {} formats: {}",
                file.name,
                self.family.noun(),
                self.family.extensions().join(", ")
            )));
        }

        if file.size > self.config.max_file_size {
            return Err(ProcessError::invalid_options(format!(
                "File is too large ({} MB). Maximum size is {} MB",
                format_mb(file.size),
                format_mb(self.config.max_file_size)
            )));
        }

        Ok(file)
    }
}

/// Map engine startup progress (0..=100) into the 5..=80 band.
/// Values under 5 are lifted by the tracker's monotonic clamp.
fn scale_engine_progress(percent: u8) -> u8 {
    ((u32::from(percent) * 4 / 5).min(80)) as u8
}

/// Megabytes with two decimals, as shown in size errors.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

/// `Report.DOCX` -> `Report.pdf`, `slides.v2.pptx` -> `slides.v2.pdf`.
///
/// Only an extension the family accepts is stripped; anything else is kept
/// and `.pdf` appended.
pub fn output_filename(name: &str, family: DocumentFamily) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && family.accepts(ext) => stem,
        _ => name,
    };
    format!("{}.pdf", stem)
}
