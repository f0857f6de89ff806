//! Upload manager — local validation gate ahead of submission.
//!
//! Pure local checks (declared media type, byte size); no network activity.
//! A rejected candidate leaves the previous selection untouched.

use crate::error::ValidationError;
use crate::types::{MediaType, SelectedFile, MAX_FILE_BYTES};

/// An unvalidated file as picked by the user: declared MIME type, raw bytes.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct UploadManager {
    selected: Option<SelectedFile>,
    error: Option<ValidationError>,
}

impl UploadManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a candidate selfie.
    ///
    /// Rejects unsupported types and oversized files before any state
    /// mutation; on success the stored file is replaced and any prior
    /// validation error cleared.
    pub fn select(&mut self, candidate: FileCandidate) -> Result<&SelectedFile, ValidationError> {
        let media_type = match MediaType::from_mime(&candidate.media_type) {
            Some(t) => t,
            None => {
                let err = ValidationError::UnsupportedType(candidate.media_type);
                self.error = Some(err.clone());
                return Err(err);
            }
        };

        let size = candidate.bytes.len() as u64;
        if size > MAX_FILE_BYTES {
            let err = ValidationError::FileTooLarge { size };
            self.error = Some(err.clone());
            return Err(err);
        }

        tracing::debug!(
            name = %candidate.name,
            size_mb = format_args!("{:.1}", size as f64 / 1024.0 / 1024.0),
            "file selected"
        );
        self.error = None;
        Ok(self.selected.insert(SelectedFile {
            name: candidate.name,
            media_type,
            bytes: candidate.bytes,
        }))
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    /// The validation error from the most recent rejected candidate, if any.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Drop the stored file and any validation error.
    pub fn clear(&mut self) {
        self.selected = None;
        self.error = None;
    }
}
