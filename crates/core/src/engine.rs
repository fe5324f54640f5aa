//! The seam between the processors and whatever actually renders PDFs.

use crate::error::Result;
use crate::input::InputFile;
use crate::progress::ProgressCallback;
use async_trait::async_trait;

/// An opaque document-to-PDF engine.
///
/// Implementations must tolerate `initialize` being called on an already
/// initialized instance. `convert_to_pdf` futures may be dropped before they
/// complete (timeouts); engines that can abort their work on drop should do so.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Prepare the engine, reporting `(percent, message)` pairs in 0..=100.
    async fn initialize(&self, progress: ProgressCallback) -> Result<()>;

    /// Synchronous readiness probe.
    fn is_ready(&self) -> bool;

    /// Convert one file, returning the PDF bytes.
    async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>>;
}
