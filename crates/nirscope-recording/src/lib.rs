//! Recording container codec and loader
//!
//! Reads hierarchical recording containers from disk and reconstructs the
//! typed domain model: probe geometry, measurement channels, time base and
//! deduplicated channel series. The container codec is a self-contained
//! big-endian binary tree of named groups and typed datasets.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod container;
pub mod error;
pub mod recording;

pub use container::{ContainerError, Dataset, Group};
pub use error::RecordingError;
pub use recording::Recording;
