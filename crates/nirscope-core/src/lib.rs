//! Nirscope Core - domain model and signal processing for fNIRS recordings
//!
//! This crate provides the foundational types shared by the recording loader
//! and the visualization layers:
//!
//! - [`types`]: probes, channels, wavelengths, and sampling metadata
//! - [`registry`]: content-addressed storage for per-channel time series
//! - [`processing`]: optical density conversion and zero-phase IIR filtering
//!
//! # Example
//!
//! ```rust
//! use nirscope_core::registry::ChannelDataRegistry;
//!
//! let mut registry = ChannelDataRegistry::new();
//! let a = registry.submit(&[1.0, 2.0, 3.0]);
//! let b = registry.submit(&[1.0, 2.0, 3.0]);
//! assert_eq!(a, b); // identical series share one entry
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod processing;
pub mod registry;
pub mod types;

// Re-export commonly used items at crate root
pub use processing::{preprocess_hemodynamic_data, IirFilter};
pub use registry::{ChannelDataRegistry, RegistryError};
pub use types::{
    Channel, ChannelDataId, ChannelId, Probe2d, Probe3d, ProbeId, ProbeRole, SamplingInfo,
    WavelengthResolution, WavelengthType,
};
