//! Recording loader
//!
//! Reconstructs a [`Recording`] from a container file: metadata tags first,
//! then probe geometry (which must precede measurement metadata), then the
//! data block. Each channel's raw series is deduplicated through a
//! [`ChannelDataRegistry`] owned by the recording, and the hemodynamic
//! pipeline is run once per channel at load time for diagnostics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::{Point2, Point3};
use tracing::{debug, info, warn};

use nirscope_core::processing::preprocess_hemodynamic_data;
use nirscope_core::registry::ChannelDataRegistry;
use nirscope_core::types::{
    resolve_wavelength, Channel, ChannelId, Probe2d, Probe3d, ProbeId, ProbeRole, SamplingInfo,
    WavelengthResolution,
};

use crate::container::{Dataset, Group};
use crate::error::RecordingError;

/// Stored time samples are scaled by this factor relative to the container's
/// raw seconds. Sampling rate and duration are derived from the raw values
/// before scaling.
const TIME_SCALE: f64 = 10.0;

/// A fully loaded recording: probe geometry, channels, time base, metadata
/// and the deduplicated channel data store.
#[derive(Clone, Debug)]
pub struct Recording {
    path: PathBuf,
    metadata: BTreeMap<String, String>,
    sources_2d: Vec<Probe2d>,
    detectors_2d: Vec<Probe2d>,
    sources_3d: Vec<Probe3d>,
    detectors_3d: Vec<Probe3d>,
    wavelengths: [i32; 2],
    time: Vec<f64>,
    sampling: SamplingInfo,
    channels: Vec<Channel>,
    registry: ChannelDataRegistry,
}

// ============================================================================
// Loading
// ============================================================================

impl Recording {
    /// Load a recording from a container file.
    ///
    /// The path is checked for existence before any parsing starts, so a
    /// failed load never disturbs a previously loaded recording held by the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`RecordingError::FileNotFound`] for a missing path,
    /// [`RecordingError::MalformedContainer`] for structural problems with
    /// the offending group or dataset path, and
    /// [`RecordingError::UnresolvedWavelengthLabel`] for a channel whose
    /// label-based wavelength cannot be resolved.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RecordingError::FileNotFound(path.to_path_buf()));
        }

        let root = Group::open(path).map_err(|err| match err {
            crate::container::ContainerError::Io(io) => RecordingError::Io(io),
            other => {
                warn!(error = %other, "container decode failed");
                RecordingError::MalformedContainer { path: "/".into() }
            }
        })?;

        let nirs = require_group(&root, "nirs", "/nirs")?;
        let metadata = parse_metadata(require_group(nirs, "metaDataTags", "/nirs/metaDataTags")?);

        // Probe geometry must be parsed before the data block so channel
        // probe references can be validated.
        let probe = require_group(nirs, "probe", "/nirs/probe")?;
        let sources_2d = parse_probes_2d(probe, "sourcePos2D", ProbeRole::Source)?;
        let detectors_2d = parse_probes_2d(probe, "detectorPos2D", ProbeRole::Detector)?;
        let sources_3d = parse_probes_3d(probe, "sourcePos3D", ProbeRole::Source)?;
        let detectors_3d = parse_probes_3d(probe, "detectorPos3D", ProbeRole::Detector)?;
        let wavelengths = parse_wavelengths(probe)?;

        let data = require_group(nirs, "data1", "/nirs/data1")?;
        let raw_time = require_dataset(data, "time", "/nirs/data1/time")?
            .as_f64_vector()
            .ok_or_else(|| malformed("/nirs/data1/time"))?;
        let sampling = SamplingInfo::from_time_vector(raw_time)
            .ok_or_else(|| malformed("/nirs/data1/time"))?;
        let time: Vec<f64> = raw_time.iter().map(|t| t * TIME_SCALE).collect();

        let mut recording = Self {
            path: path.to_path_buf(),
            metadata,
            sources_2d,
            detectors_2d,
            sources_3d,
            detectors_3d,
            wavelengths,
            time,
            sampling,
            channels: Vec::new(),
            registry: ChannelDataRegistry::new(),
        };
        recording.parse_channels(data)?;

        recording.log_summary();
        Ok(recording)
    }

    fn parse_channels(&mut self, data: &Group) -> Result<(), RecordingError> {
        let (samples, channel_count, values) =
            require_dataset(data, "dataTimeSeries", "/nirs/data1/dataTimeSeries")?
                .as_f64_matrix()
                .ok_or_else(|| malformed("/nirs/data1/dataTimeSeries"))?;
        if samples != self.time.len() {
            return Err(malformed("/nirs/data1/dataTimeSeries"));
        }

        for index in 0..channel_count {
            let channel_id = u32::try_from(index + 1)
                .map_err(|_| malformed("/nirs/data1/dataTimeSeries"))?;
            let list_name = format!("measurementList{channel_id}");
            let list_path = format!("/nirs/data1/{list_name}");
            let list = require_group(data, &list_name, &list_path)?;

            // Sample-major container layout, transposed to channel-major.
            let series: Vec<f64> = (0..samples)
                .map(|s| values[s * channel_count + index])
                .collect();

            let channel = self.parse_measurement(channel_id, list, &list_path, series)?;
            self.channels.push(channel);
        }
        Ok(())
    }

    fn parse_measurement(
        &mut self,
        channel_id: ChannelId,
        list: &Group,
        list_path: &str,
        series: Vec<f64>,
    ) -> Result<Channel, RecordingError> {
        let _data_type = require_i32(list, "dataType", list_path)?;
        let data_type_index = require_i32(list, "dataTypeIndex", list_path)?;
        let data_type_label = require_dataset(list, "dataTypeLabel", list_path)?
            .as_text()
            .ok_or_else(|| malformed(&format!("{list_path}/dataTypeLabel")))?
            .to_owned();
        let source_index = require_i32(list, "sourceIndex", list_path)?;
        let detector_index = require_i32(list, "detectorIndex", list_path)?;
        let wavelength_index = require_i32(list, "wavelengthIndex", list_path)?;

        let source_id = probe_reference(source_index, self.sources_2d.len())
            .ok_or_else(|| malformed(&format!("{list_path}/sourceIndex")))?;
        let detector_id = probe_reference(detector_index, self.detectors_2d.len())
            .ok_or_else(|| malformed(&format!("{list_path}/detectorIndex")))?;

        let wavelength =
            match resolve_wavelength(data_type_index, &data_type_label, wavelength_index) {
                WavelengthResolution::Resolved(w) => w,
                WavelengthResolution::UnknownLabel(label) => {
                    warn!(channel = channel_id, %label, "unknown wavelength label");
                    return Err(RecordingError::UnresolvedWavelengthLabel {
                        channel: channel_id,
                        label,
                    });
                }
                WavelengthResolution::InvalidIndex(_) => {
                    return Err(malformed(&format!("{list_path}/wavelengthIndex")));
                }
            };

        let data_index = self.registry.submit(&series);

        // The cleaned signal is computed for diagnostics only; downstream
        // consumers re-derive it from the registry when needed.
        let processed = preprocess_hemodynamic_data(&series, self.sampling.rate_hz);
        let peak = processed.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        debug!(
            channel = channel_id,
            samples = processed.len(),
            peak,
            "hemodynamic pipeline complete"
        );

        Ok(Channel {
            id: channel_id,
            source_id,
            detector_id,
            wavelength,
            data_index,
        })
    }

    /// Emit a one-line structured summary of the recording.
    pub fn log_summary(&self) {
        info!(
            path = %self.path.display(),
            sources = self.source_count(),
            detectors = self.detector_count(),
            channels = self.channels.len(),
            unique_series = self.registry.len(),
            rate_hz = self.sampling.rate_hz,
            duration_s = self.sampling.duration_seconds,
            wavelengths = ?self.wavelengths,
            "recording loaded"
        );
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Recording {
    /// Path the recording was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Free-form metadata tags, keyed by tag name.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Planar source optodes in read order.
    #[must_use]
    pub fn sources_2d(&self) -> &[Probe2d] {
        &self.sources_2d
    }

    /// Planar detector optodes in read order.
    #[must_use]
    pub fn detectors_2d(&self) -> &[Probe2d] {
        &self.detectors_2d
    }

    /// Spatial source optodes in read order.
    #[must_use]
    pub fn sources_3d(&self) -> &[Probe3d] {
        &self.sources_3d
    }

    /// Spatial detector optodes in read order.
    #[must_use]
    pub fn detectors_3d(&self) -> &[Probe3d] {
        &self.detectors_3d
    }

    /// Look up a spatial source by its 1-based id.
    #[must_use]
    pub fn source_3d(&self, id: ProbeId) -> Option<&Probe3d> {
        self.sources_3d.iter().find(|p| p.id == id)
    }

    /// Look up a spatial detector by its 1-based id.
    #[must_use]
    pub fn detector_3d(&self, id: ProbeId) -> Option<&Probe3d> {
        self.detectors_3d.iter().find(|p| p.id == id)
    }

    /// Number of source optodes.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources_2d.len()
    }

    /// Number of detector optodes.
    #[must_use]
    pub fn detector_count(&self) -> usize {
        self.detectors_2d.len()
    }

    /// The two probe wavelengths in nanometers, ascending.
    #[must_use]
    pub fn wavelengths(&self) -> [i32; 2] {
        self.wavelengths
    }

    /// Measurement channels in container order.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Stored (scaled) time vector.
    #[must_use]
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Sampling rate and duration derived from the raw time vector.
    #[must_use]
    pub fn sampling(&self) -> SamplingInfo {
        self.sampling
    }

    /// The deduplicated channel data store.
    #[must_use]
    pub fn registry(&self) -> &ChannelDataRegistry {
        &self.registry
    }

    /// Raw intensity series backing a channel.
    #[must_use]
    pub fn channel_series(&self, channel: &Channel) -> Option<&[f64]> {
        self.registry.get(channel.data_index).ok()
    }
}

// ============================================================================
// Parse helpers
// ============================================================================

fn malformed(path: &str) -> RecordingError {
    RecordingError::MalformedContainer { path: path.into() }
}

fn require_group<'a>(
    parent: &'a Group,
    name: &str,
    path: &str,
) -> Result<&'a Group, RecordingError> {
    parent.group(name).ok_or_else(|| malformed(path))
}

fn require_dataset<'a>(
    parent: &'a Group,
    name: &str,
    path: &str,
) -> Result<&'a Dataset, RecordingError> {
    parent.dataset(name).ok_or_else(|| malformed(path))
}

fn require_i32(parent: &Group, name: &str, parent_path: &str) -> Result<i32, RecordingError> {
    let path = format!("{parent_path}/{name}");
    require_dataset(parent, name, &path)?
        .as_i32_vector()
        .and_then(|v| if let [value] = *v { Some(value) } else { None })
        .ok_or_else(|| malformed(&path))
}

/// Validate a 1-based probe reference against the probe count.
fn probe_reference(index: i32, count: usize) -> Option<ProbeId> {
    let id = ProbeId::try_from(index).ok()?;
    (1..=count).contains(&(id as usize)).then_some(id)
}

fn parse_metadata(group: &Group) -> BTreeMap<String, String> {
    group
        .datasets()
        .filter_map(|(name, dataset)| {
            dataset.as_text().map(|text| (name.to_owned(), text.to_owned()))
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn parse_probes_2d(
    probe: &Group,
    name: &str,
    role: ProbeRole,
) -> Result<Vec<Probe2d>, RecordingError> {
    let path = format!("/nirs/probe/{name}");
    let (rows, cols, values) = require_dataset(probe, name, &path)?
        .as_f64_matrix()
        .ok_or_else(|| malformed(&path))?;
    if cols != 2 {
        return Err(malformed(&path));
    }

    Ok((0..rows)
        .map(|row| Probe2d {
            position: Point2::new(values[row * 2] as f32, values[row * 2 + 1] as f32),
            role,
            id: row as ProbeId + 1,
        })
        .collect())
}

#[allow(clippy::cast_possible_truncation)]
fn parse_probes_3d(
    probe: &Group,
    name: &str,
    role: ProbeRole,
) -> Result<Vec<Probe3d>, RecordingError> {
    let path = format!("/nirs/probe/{name}");
    let (rows, cols, values) = require_dataset(probe, name, &path)?
        .as_f64_matrix()
        .ok_or_else(|| malformed(&path))?;
    if cols != 3 {
        return Err(malformed(&path));
    }

    // Container rows are (x, y, z) with z up; stored positions are y-up,
    // so the last two components swap.
    Ok((0..rows)
        .map(|row| Probe3d {
            position: Point3::new(
                values[row * 3] as f32,
                values[row * 3 + 2] as f32,
                values[row * 3 + 1] as f32,
            ),
            role,
            id: row as ProbeId + 1,
        })
        .collect())
}

fn parse_wavelengths(probe: &Group) -> Result<[i32; 2], RecordingError> {
    let path = "/nirs/probe/wavelengths";
    let values = require_dataset(probe, "wavelengths", path)?
        .as_i32_vector()
        .ok_or_else(|| malformed(path))?;
    let [first, second] = *values else {
        return Err(malformed(path));
    };
    // Index 0 is always the shorter wavelength.
    Ok(if first <= second {
        [first, second]
    } else {
        [second, first]
    })
}
