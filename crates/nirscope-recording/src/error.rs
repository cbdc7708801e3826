//! Loader error taxonomy

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`crate::Recording::load`].
///
/// Container codec failures never leak raw; they are mapped to
/// [`RecordingError::MalformedContainer`] with the offending group or
/// dataset path.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// The recording file does not exist.
    #[error("recording file not found: {0}")]
    FileNotFound(PathBuf),

    /// A required group or dataset is missing, has the wrong type, or has
    /// an inconsistent shape.
    #[error("malformed container at {path}")]
    MalformedContainer {
        /// Slash-separated path of the offending group or dataset.
        path: String,
    },

    /// A channel declared label-based wavelength resolution but carried a
    /// label outside the known hemoglobin set.
    #[error("channel {channel}: unresolved wavelength label {label:?}")]
    UnresolvedWavelengthLabel {
        /// 1-based channel id.
        channel: u32,
        /// The label as read from the container.
        label: String,
    },

    /// An underlying read failed after the file was confirmed to exist.
    #[error("i/o error reading recording")]
    Io(#[from] std::io::Error),
}
