use serde::{Deserialize, Serialize};

/// Largest selfie the client will submit (server rejects bigger with 413).
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// The two gated features the server tracks quota for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Best-fit historical figure for the uploaded face.
    Match,
    /// Random historical figure, ignoring fit.
    Randomize,
}

impl FeatureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Randomize => "randomize",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side quota snapshot.
///
/// Authenticated sessions come back as a bare `{"unlimited": true}`, so every
/// counter field defaults on deserialization. Snapshots are only ever replaced
/// whole — never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageData {
    #[serde(default)]
    pub matches_used: u32,
    #[serde(default)]
    pub matches_limit: u32,
    #[serde(default)]
    pub randomizes_used: u32,
    #[serde(default)]
    pub randomizes_limit: u32,
    #[serde(default)]
    pub can_match: bool,
    #[serde(default)]
    pub can_randomize: bool,
    /// Authenticated / privileged session — quota checks do not apply.
    #[serde(default)]
    pub unlimited: bool,
    /// At least one feature is exhausted.
    #[serde(default)]
    pub is_limited: bool,
}

impl UsageData {
    /// Whether this snapshot permits the given feature.
    ///
    /// `unlimited` overrides the per-feature flags unconditionally.
    pub fn allows(&self, feature: FeatureKind) -> bool {
        if self.unlimited {
            return true;
        }
        match feature {
            FeatureKind::Match => self.can_match,
            FeatureKind::Randomize => self.can_randomize,
        }
    }

    /// True when quota is actually binding: limited and not unlimited.
    pub fn exhausted(&self) -> bool {
        self.is_limited && !self.unlimited
    }
}

/// A completed transformation as returned by the server.
///
/// Either fully present or absent — the server never returns a partial one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub id: u64,
    pub match_name: String,
    /// Similarity of the match in [0, 1].
    pub match_score: f32,
    pub message: String,
    pub output_image_url: String,
    pub original_selfie_url: String,
    pub historical_figure_url: String,
    #[serde(default)]
    pub is_randomized: bool,
    /// Fresh quota snapshot the server piggybacks on generate responses.
    #[serde(default)]
    pub usage: Option<UsageData>,
}

/// Ordered steps of the processing narrative shown while a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStep {
    Uploading,
    Analyzing,
    Matching,
    Swapping,
    Complete,
}

/// Ephemeral progress snapshot for one submission run.
///
/// `progress` is monotonically non-decreasing within a run; updates that would
/// move it backwards are dropped by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingState {
    pub step: ProcessingStep,
    pub progress: u8,
    pub message: String,
    pub matched_figure: Option<String>,
}

impl ProcessingState {
    /// Initial state at the start of a run and after a flow reset.
    pub fn initial() -> Self {
        Self {
            step: ProcessingStep::Uploading,
            progress: 0,
            message: "Preparing your transformation...".to_string(),
            matched_figure: None,
        }
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Image formats the server accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Parse a declared MIME type. `image/jpg` is tolerated alongside
    /// `image/jpeg` (browsers emit both).
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess from a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// A validated selfie, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
