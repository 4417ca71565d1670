use serde::{Deserialize, Serialize};

/// Flow direction of an endpoint or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Playback.
    Render,
    /// Recording.
    Capture,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Capture => "capture",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listed endpoint with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub is_default: bool,
}

/// Per-session transfer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDiagnostics {
    pub frames_written: u64,
    pub frames_read: u64,
    /// Frames delivered as silence (zero-filled capture or silent render).
    pub silent_frames: u64,
    /// Capture frames released back to the engine without being copied.
    pub dropped_frames: u64,
    pub discontinuities: u64,
    pub failed_transfers: u64,
}
