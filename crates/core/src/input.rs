//! Request records handed to [`Processor::process`](crate::Processor::process).

use crate::family;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the bytes of an input file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Bytes already in memory.
    Memory(Vec<u8>),
    /// A file on disk, read by the engine when it converts.
    Path(PathBuf),
}

/// A single file submitted for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Original file name, including its extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub content: FileContent,
    /// Declared media type, if the caller knows it.
    pub media_type: Option<String>,
}

impl InputFile {
    /// Create an input file from in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = guess_media_type(&name);
        Self {
            name,
            size: bytes.len() as u64,
            content: FileContent::Memory(bytes),
            media_type,
        }
    }

    /// Reference a file on disk. Only its metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input")
            .to_string();
        let media_type = guess_media_type(&name);
        Ok(Self {
            name,
            size: metadata.len(),
            content: FileContent::Path(path.to_path_buf()),
            media_type,
        })
    }

    /// Override the declared media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Text after the final `.` of the name.
    pub fn extension(&self) -> Option<&str> {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

fn guess_media_type(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    family::media_type(ext).map(str::to_string)
}

/// Reserved per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {}

/// Files plus options for one `process` call.
#[derive(Debug, Clone, Default)]
pub struct ProcessInput {
    pub files: Vec<InputFile>,
    pub options: ProcessOptions,
}

impl ProcessInput {
    pub fn new(files: Vec<InputFile>) -> Self {
        Self {
            files,
            options: ProcessOptions::default(),
        }
    }

    /// The common case: exactly one file.
    pub fn single(file: InputFile) -> Self {
        Self::new(vec![file])
    }
}
