//! Headless LibreOffice as a [`PdfEngine`].
//!
//! Each conversion runs `soffice --convert-to pdf` in a throwaway job
//! directory with a private user profile. Conversions on one engine run one
//! at a time: a second soffice on a live profile hands its arguments to the
//! first process and exits without writing anything. The child process is
//! spawned with
//! `kill_on_drop`, so dropping a conversion future (for example when the
//! processor's timeout fires) kills LibreOffice instead of leaving it running.

use crate::config::EngineConfig;
use crate::engine::PdfEngine;
use crate::error::{EngineError, Result};
use crate::input::{FileContent, InputFile};
use crate::progress::ProgressCallback;
use async_process::Command;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Everything `initialize` prepares.
#[derive(Debug)]
struct Runtime {
    soffice_path: PathBuf,
    /// Unique user profile directory, so we never fight a desktop instance.
    profile_dir: TempDir,
    /// Parent of the per-job directories.
    work_dir: TempDir,
}

/// Converts documents by shelling out to LibreOffice.
#[derive(Debug)]
pub struct LibreOfficeEngine {
    config: EngineConfig,
    runtime: Mutex<Option<Arc<Runtime>>>,
    /// One soffice per profile.
    slot: Semaphore,
    converted: AtomicUsize,
}

impl LibreOfficeEngine {
    /// Create an engine. No filesystem or process work happens until
    /// [`initialize`](PdfEngine::initialize).
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            runtime: Mutex::new(None),
            slot: Semaphore::new(1),
            converted: AtomicUsize::new(0),
        }
    }

    /// Path of the soffice binary, once initialized.
    pub fn soffice_path(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|rt| rt.soffice_path.clone())
    }

    /// Number of documents converted successfully.
    pub fn total_converted(&self) -> usize {
        self.converted.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Runtime>>> {
        self.runtime.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Find the soffice binary.
    fn find_soffice(config: &EngineConfig) -> Result<PathBuf> {
        // Check if explicit path is provided
        if let Some(ref path) = config.soffice_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(EngineError::LibreOfficeNotFound);
        }

        let candidates = [
            // macOS
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            // Linux
            "/usr/bin/soffice",
            "/usr/lib/libreoffice/program/soffice",
            "/opt/libreoffice/program/soffice",
            // Snap (Ubuntu)
            "/snap/bin/libreoffice.soffice",
        ];

        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("soffice")
            .or_else(|_| which::which("libreoffice"))
            .map_err(|_| EngineError::LibreOfficeNotFound)
    }

    fn make_dir(&self, prefix: &str) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let result = match &self.config.temp_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        result.map_err(|e| {
            EngineError::io(
                "Failed to create directory in",
                self.config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
                e,
            )
        })
    }

    /// Put the input on disk if it is not there already.
    async fn stage_input(file: &InputFile, job_dir: &Path) -> Result<PathBuf> {
        match &file.content {
            FileContent::Path(path) => Ok(path.clone()),
            FileContent::Memory(bytes) => {
                let staged = job_dir.join(sanitize_file_name(&file.name));
                tokio::fs::write(&staged, bytes)
                    .await
                    .map_err(|e| EngineError::io("Failed to stage input", &staged, e))?;
                Ok(staged)
            }
        }
    }

    /// LibreOffice names its output after the input stem, but falls back to
    /// any PDF in the output directory.
    fn locate_pdf(out_dir: &Path, input_path: &Path) -> Option<PathBuf> {
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let expected = out_dir.join(format!("{}.pdf", stem));
        if expected.exists() {
            return Some(expected);
        }

        std::fs::read_dir(out_dir).ok().and_then(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|p| {
                    p.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                        .unwrap_or(false)
                })
        })
    }
}

#[async_trait]
impl PdfEngine for LibreOfficeEngine {
    fn name(&self) -> &str {
        "libreoffice"
    }

    async fn initialize(&self, progress: ProgressCallback) -> Result<()> {
        if self.is_ready() {
            progress(100, "LibreOffice ready");
            return Ok(());
        }

        progress(10, "Locating LibreOffice");
        let soffice_path = Self::find_soffice(&self.config)?;
        info!("Found LibreOffice at: {:?}", soffice_path);

        progress(50, "Preparing LibreOffice profile");
        let profile_dir = self.make_dir("lo-profile-")?;
        let work_dir = self.make_dir("office-to-pdf-")?;
        debug!(
            "LibreOffice profile at {:?}, scratch at {:?}",
            profile_dir.path(),
            work_dir.path()
        );

        {
            let mut runtime = self.lock();
            if runtime.is_none() {
                *runtime = Some(Arc::new(Runtime {
                    soffice_path,
                    profile_dir,
                    work_dir,
                }));
            }
        }

        progress(100, "LibreOffice ready");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lock().is_some()
    }

    async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>> {
        let runtime = self
            .lock()
            .clone()
            .ok_or_else(|| EngineError::NotReady(self.name().to_string()))?;
        let start = Instant::now();

        // Removed on drop, including when the caller times out
        let job_dir = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(runtime.work_dir.path())
            .map_err(|e| EngineError::io("Failed to create job directory in", runtime.work_dir.path(), e))?;
        let input_path = Self::stage_input(file, job_dir.path()).await?;
        let out_dir = job_dir.path().join("out");
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| EngineError::io("Failed to create output directory", &out_dir, e))?;

        let _slot = self
            .slot
            .acquire()
            .await
            .map_err(|_| EngineError::Engine("LibreOffice engine shut down".to_string()))?;
        debug!("Acquired LibreOffice slot after {:?}", start.elapsed());

        let mut cmd = Command::new(&runtime.soffice_path);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            runtime.profile_dir.path().display()
        ));
        cmd.args(["--convert-to", "pdf", "--outdir"]);
        cmd.arg(&out_dir);
        cmd.arg(&input_path);
        cmd.kill_on_drop(true);

        debug!("Running LibreOffice for {:?}", file.name);
        let output = cmd.output().await.map_err(EngineError::ProcessStartFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("LibreOffice conversion failed for {:?}: {}", file.name, stderr);
            return Err(EngineError::ConversionFailed {
                name: file.name.clone(),
                message: stderr.trim().to_string(),
            });
        }

        let pdf_path = Self::locate_pdf(&out_dir, &input_path).ok_or_else(|| {
            EngineError::OutputMissing {
                name: file.name.clone(),
            }
        })?;
        let pdf = tokio::fs::read(&pdf_path)
            .await
            .map_err(|e| EngineError::io("Failed to read PDF", &pdf_path, e))?;

        self.converted.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Converted {:?} to {} PDF bytes in {:?}",
            file.name,
            pdf.len(),
            start.elapsed()
        );
        Ok(pdf)
    }
}

/// Keep only the final path component so a crafted name cannot escape the
/// job directory.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        "input".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::callback;

    #[test]
    fn test_engine_starts_not_ready() {
        let engine = LibreOfficeEngine::new(EngineConfig::default());
        assert!(!engine.is_ready());
        assert!(engine.soffice_path().is_none());
        assert_eq!(engine.total_converted(), 0);
        assert_eq!(engine.name(), "libreoffice");
    }

    #[test]
    fn test_find_soffice_with_explicit_nonexistent_path() {
        let config = EngineConfig::default().soffice_path(PathBuf::from("/nonexistent/soffice"));
        let result = LibreOfficeEngine::find_soffice(&config);
        assert!(matches!(result, Err(EngineError::LibreOfficeNotFound)));
    }

    #[test]
    fn test_find_soffice_with_explicit_valid_path() {
        // Any existing file will do
        let current_exe = std::env::current_exe().unwrap();
        let config = EngineConfig::default().soffice_path(current_exe.clone());
        assert_eq!(LibreOfficeEngine::find_soffice(&config).unwrap(), current_exe);
    }

    #[tokio::test]
    async fn test_initialize_with_missing_soffice_fails() {
        let engine = LibreOfficeEngine::new(
            EngineConfig::default().soffice_path(PathBuf::from("/nonexistent/soffice")),
        );
        let result = engine.initialize(callback(|_, _| {})).await;
        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(EngineError::LibreOfficeNotFound)));
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = LibreOfficeEngine::new(
            EngineConfig::default()
                .soffice_path(std::env::current_exe().unwrap())
                .temp_dir(scratch.path().to_path_buf()),
        );

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let cb = callback(move |p, _| sink.lock().unwrap().push(p));

        engine.initialize(Arc::clone(&cb)).await.unwrap();
        assert!(engine.is_ready());
        let first_path = engine.soffice_path();

        engine.initialize(cb).await.unwrap();
        assert_eq!(engine.soffice_path(), first_path);
        assert_eq!(*reports.lock().unwrap(), vec![10, 50, 100, 100]);
        // profile + work dir, created once
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_convert_before_initialize_is_not_ready() {
        let engine = LibreOfficeEngine::new(EngineConfig::default());
        let file = InputFile::from_bytes("a.docx", vec![1, 2, 3]);
        let result = tokio_test::block_on(engine.convert_to_pdf(&file));
        assert!(matches!(result, Err(EngineError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_stage_input_writes_memory_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = InputFile::from_bytes("deck.pptx", b"bytes".to_vec());
        let staged = LibreOfficeEngine::stage_input(&file, dir.path()).await.unwrap();
        assert_eq!(staged, dir.path().join("deck.pptx"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_stage_input_keeps_path_content() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("on-disk.docx");
        std::fs::write(&original, b"x").unwrap();
        let file = InputFile::from_path(&original).unwrap();
        let staged = LibreOfficeEngine::stage_input(&file, dir.path()).await.unwrap();
        assert_eq!(staged, original);
    }

    #[test]
    fn test_locate_pdf_prefers_stem_then_any_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = PathBuf::from("/in/slides.v2.pptx");
        assert!(LibreOfficeEngine::locate_pdf(dir.path(), &input).is_none());

        std::fs::write(dir.path().join("other.PDF"), b"%PDF").unwrap();
        assert_eq!(
            LibreOfficeEngine::locate_pdf(dir.path(), &input),
            Some(dir.path().join("other.PDF"))
        );

        std::fs::write(dir.path().join("slides.v2.pdf"), b"%PDF").unwrap();
        assert_eq!(
            LibreOfficeEngine::locate_pdf(dir.path(), &input),
            Some(dir.path().join("slides.v2.pdf"))
        );
    }

    /// Stand-in soffice that, like the real one, does nothing when another
    /// instance already holds the profile.
    #[cfg(unix)]
    const FAKE_SOFFICE: &str = r#"#!/bin/sh
prev=""
for arg in "$@"; do
  case "$arg" in
    -env:UserInstallation=file://*) profile="${arg#-env:UserInstallation=file://}" ;;
  esac
  if [ "$prev" = "--outdir" ]; then outdir="$arg"; fi
  prev="$arg"
  input="$arg"
done
mkdir "$profile/busy" 2>/dev/null || exit 0
sleep 0.3
name=$(basename "$input")
printf '%%PDF-1.4 fake
' > "$outdir/${name%.*}.pdf"
rmdir "$profile/busy"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_conversions_do_not_share_a_live_profile() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempfile::tempdir().unwrap();
        let script = scratch.path().join("soffice");
        std::fs::write(&script, FAKE_SOFFICE).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = LibreOfficeEngine::new(
            EngineConfig::default()
                .soffice_path(script)
                .temp_dir(scratch.path().to_path_buf()),
        );
        engine.initialize(callback(|_, _| {})).await.unwrap();

        let deck = InputFile::from_bytes("deck.pptx", b"slides".to_vec());
        let memo = InputFile::from_bytes("memo.docx", b"words".to_vec());
        let (a, b) = tokio::join!(engine.convert_to_pdf(&deck), engine.convert_to_pdf(&memo));

        assert!(a.unwrap().starts_with(b"%PDF"));
        assert!(b.unwrap().starts_with(b"%PDF"));
        assert_eq!(engine.total_converted(), 2);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.docx"), "report.docx");
        assert_eq!(sanitize_file_name("../../etc/passwd.doc"), "passwd.doc");
        assert_eq!(sanitize_file_name("C:\\docs\\memo.rtf"), "memo.rtf");
        assert_eq!(sanitize_file_name(".."), "input");
        assert_eq!(sanitize_file_name("dir/"), "input");
    }
}
