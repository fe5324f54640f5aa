//! Source document families and their extension whitelists.

use serde::{Deserialize, Serialize};
use std::fmt;

const PRESENTATION_EXTENSIONS: &[&str] = &["pptx", "ppt", "odp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "doc", "odt", "rtf"];

/// Every extension accepted by some family.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pptx", "ppt", "odp", "docx", "doc", "odt", "rtf"];

/// Check if a file extension is accepted by any family.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|&e| e.eq_ignore_ascii_case(ext))
}

/// A group of source formats handled by one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFamily {
    /// PowerPoint and OpenDocument presentations.
    Presentation,
    /// Word, OpenDocument text and RTF.
    Document,
}

impl DocumentFamily {
    /// Accepted extensions, lowercase, without the leading dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            DocumentFamily::Presentation => PRESENTATION_EXTENSIONS,
            DocumentFamily::Document => DOCUMENT_EXTENSIONS,
        }
    }

    /// Case-insensitive whitelist check.
    pub fn accepts(self, ext: &str) -> bool {
        self.extensions().iter().any(|&e| e.eq_ignore_ascii_case(ext))
    }

    /// Find the family that accepts `ext`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        [DocumentFamily::Presentation, DocumentFamily::Document]
            .into_iter()
            .find(|family| family.accepts(ext))
    }

    /// Word used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            DocumentFamily::Presentation => "presentation",
            DocumentFamily::Document => "document",
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// IANA media type for a supported extension.
pub fn media_type(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        _ => return None,
    };
    Some(mime)
}
