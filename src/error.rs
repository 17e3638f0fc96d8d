use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an entire analysis call.
///
/// An unavailable segmentation capability is deliberately *not* represented
/// here; it produces a degraded placeholder result instead, so callers can
/// tell "the model never loaded" apart from "this call failed".
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The capability was loaded but failed while generating masks for this
    /// specific image. No partial result is produced.
    #[error("inference error: {details}")]
    Inference { details: String },

    /// The input image could not be read or decoded.
    #[error("failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl AnalysisError {
    pub fn inference(details: impl Into<String>) -> Self {
        Self::Inference {
            details: details.into(),
        }
    }

    /// Stable, machine-readable error kind for callers assembling error
    /// records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inference { .. } => "inference error",
            Self::ImageLoad { .. } => "image load error",
        }
    }

    /// Human-readable detail string accompanying [`kind`](Self::kind).
    pub fn details(&self) -> String {
        match self {
            Self::Inference { details } => details.clone(),
            Self::ImageLoad { source, .. } => source.to_string(),
        }
    }
}
