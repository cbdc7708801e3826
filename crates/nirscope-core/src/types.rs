//! Core types for fNIRS recordings
//!
//! This module provides the domain model reconstructed from a recording
//! container:
//! - Optode probes (sources and detectors, 2-D and 3-D layouts)
//! - Measurement channels (source-detector pairs with a wavelength type)
//! - Wavelength classification and resolution
//! - Sampling metadata derived from the recording's time axis

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// 1-indexed identifier of an optode probe, in container read order.
pub type ProbeId = u32;

/// 1-indexed identifier of a measurement channel.
pub type ChannelId = u32;

/// Handle into the [`crate::registry::ChannelDataRegistry`].
pub type ChannelDataId = u32;

/// A single sample of a channel time series.
pub type ChannelValue = f64;

// ============================================================================
// Wavelengths
// ============================================================================

/// Hemoglobin signal class carried by a measurement channel.
///
/// The discriminants match the wavelength-index ordering used by the
/// container's measurement records: index 0 is the shorter, HbR-associated
/// wavelength.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WavelengthType {
    /// Deoxygenated hemoglobin (HbR)
    Hbr = 0,
    /// Oxygenated hemoglobin (HbO)
    Hbo = 1,
    /// Total hemoglobin (HbT)
    Hbt = 2,
}

impl WavelengthType {
    /// Canonical textual label as written in measurement records.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hbr => "HbR",
            Self::Hbo => "HbO",
            Self::Hbt => "HbT",
        }
    }

    /// Parse a measurement-record label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "HbR" => Some(Self::Hbr),
            "HbO" => Some(Self::Hbo),
            "HbT" => Some(Self::Hbt),
            _ => None,
        }
    }

    /// Map a zero-based wavelength ordinal onto a signal class.
    #[must_use]
    pub const fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Hbr),
            1 => Some(Self::Hbo),
            2 => Some(Self::Hbt),
            _ => None,
        }
    }
}

/// Outcome of classifying one measurement record's wavelength.
///
/// Modeled as an explicit tagged decision so that an unrecognized label is
/// visible to the caller instead of silently collapsing to a default class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavelengthResolution {
    /// The record mapped onto a known signal class.
    Resolved(WavelengthType),
    /// Label-based record carried a label outside the known set.
    UnknownLabel(String),
    /// Index-based record carried a 1-based index outside `1..=3`.
    InvalidIndex(i32),
}

/// Classify one measurement record's wavelength.
///
/// A `data_type_index` equal to the label sentinel (`-1`) selects label-based
/// resolution from `data_type_label`; any other value resolves from the
/// 1-based `wavelength_index`.
#[must_use]
pub fn resolve_wavelength(
    data_type_index: i32,
    data_type_label: &str,
    wavelength_index: i32,
) -> WavelengthResolution {
    if data_type_index == -1 {
        match WavelengthType::from_label(data_type_label) {
            Some(w) => WavelengthResolution::Resolved(w),
            None => WavelengthResolution::UnknownLabel(data_type_label.to_owned()),
        }
    } else {
        match WavelengthType::from_ordinal(wavelength_index - 1) {
            Some(w) => WavelengthResolution::Resolved(w),
            None => WavelengthResolution::InvalidIndex(wavelength_index),
        }
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Physical role of an optode probe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeRole {
    /// Light emitter.
    Source,
    /// Light receiver.
    Detector,
}

/// An optode in the flattened 2-D probe layout.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Probe2d {
    /// Position in layout coordinates.
    pub position: Point2<f32>,
    /// Source or detector.
    pub role: ProbeRole,
    /// 1-indexed identifier in container read order.
    pub id: ProbeId,
}

/// An optode in the 3-D head-surface layout.
///
/// Positions are stored Y-up: the container's third axis becomes the vertical
/// axis and its second axis becomes depth.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Probe3d {
    /// Position in Y-up head coordinates.
    pub position: Point3<f32>,
    /// Source or detector.
    pub role: ProbeRole,
    /// 1-indexed identifier in container read order.
    pub id: ProbeId,
}

// ============================================================================
// Channels
// ============================================================================

/// A measurement channel: one source-detector pair at one wavelength.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// 1-indexed channel identifier, sequential across the recording.
    pub id: ChannelId,
    /// 1-indexed identifier of the emitting source probe.
    pub source_id: ProbeId,
    /// 1-indexed identifier of the receiving detector probe.
    pub detector_id: ProbeId,
    /// Hemoglobin signal class of this channel.
    pub wavelength: WavelengthType,
    /// Handle to the raw intensity series in the channel data registry.
    pub data_index: ChannelDataId,
}

// ============================================================================
// Sampling Metadata
// ============================================================================

/// Sampling rate and total duration derived once from a recording's time axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingInfo {
    /// Sampling rate in Hz, `1 / mean(dt)`.
    pub rate_hz: f64,
    /// Total duration in seconds, `time[last] - time[first]`.
    pub duration_seconds: f64,
}

impl SamplingInfo {
    /// Derive sampling metadata from a time vector.
    ///
    /// Returns `None` for vectors with fewer than two samples, where no
    /// interval exists to average.
    #[must_use]
    pub fn from_time_vector(time: &[f64]) -> Option<Self> {
        if time.len() < 2 {
            return None;
        }
        let first = *time.first()?;
        let last = *time.last()?;
        let duration = last - first;
        let intervals = (time.len() - 1) as f64;
        let avg_dt = duration / intervals;
        Some(Self {
            rate_hz: 1.0 / avg_dt,
            duration_seconds: duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelength_label_round_trip() {
        for w in [WavelengthType::Hbr, WavelengthType::Hbo, WavelengthType::Hbt] {
            assert_eq!(WavelengthType::from_label(w.label()), Some(w));
        }
        assert_eq!(WavelengthType::from_label("raw-DC"), None);
    }

    #[test]
    fn test_resolve_wavelength_by_index() {
        assert_eq!(
            resolve_wavelength(1, "", 1),
            WavelengthResolution::Resolved(WavelengthType::Hbr)
        );
        assert_eq!(
            resolve_wavelength(1, "", 2),
            WavelengthResolution::Resolved(WavelengthType::Hbo)
        );
        assert_eq!(
            resolve_wavelength(99, "", 3),
            WavelengthResolution::Resolved(WavelengthType::Hbt)
        );
        assert_eq!(
            resolve_wavelength(1, "", 4),
            WavelengthResolution::InvalidIndex(4)
        );
    }

    #[test]
    fn test_resolve_wavelength_by_label() {
        assert_eq!(
            resolve_wavelength(-1, "HbO", 0),
            WavelengthResolution::Resolved(WavelengthType::Hbo)
        );
        // Label sentinel ignores the wavelength index entirely
        assert_eq!(
            resolve_wavelength(-1, "HbR", 7),
            WavelengthResolution::Resolved(WavelengthType::Hbr)
        );
        assert_eq!(
            resolve_wavelength(-1, "conc", 1),
            WavelengthResolution::UnknownLabel("conc".to_owned())
        );
    }

    #[test]
    fn test_sampling_info_uniform_time() {
        let time: Vec<f64> = (0..100).map(|i| f64::from(i) * 0.1).collect();
        let info = SamplingInfo::from_time_vector(&time).unwrap();
        assert!((info.rate_hz - 10.0).abs() < 1e-9);
        assert!((info.duration_seconds - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_sampling_info_too_short() {
        assert!(SamplingInfo::from_time_vector(&[]).is_none());
        assert!(SamplingInfo::from_time_vector(&[0.5]).is_none());
    }
}
