//! Threshold colormap and its GPU buffer.
//!
//! Layout: `M × 16` bytes, one `[r, g, b, threshold]` of `f32` per stop, in
//! input order. The shader picks a record's colour by scanning the stops in
//! buffer order and keeping the last stop whose threshold is `<= value`;
//! values below the first threshold take the first stop, and the last stop
//! covers everything above it. That scan is only meaningful for
//! non-decreasing thresholds, which [`ColormapBuffer::encode`] enforces.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Size in bytes of one encoded stop.
pub const COLOR_STOP_STRIDE: usize = 16;

/// One colour band, bounded above by `threshold`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub color: [f32; 3],
    pub threshold: f32,
}

impl ColorStop {
    pub const fn new(color: [f32; 3], threshold: f32) -> Self {
        Self { color, threshold }
    }
}

/// The fallback ramp: black at 0, white at 2.
pub fn default_colormap() -> Vec<ColorStop> {
    vec![
        ColorStop::new([0.0, 0.0, 0.0], 0.0),
        ColorStop::new([1.0, 1.0, 1.0], 2.0),
    ]
}

/// Errors raised while encoding a colormap.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A colormap needs at least one stop.
    EmptyColormap,
    /// Stop `index` has a threshold below its predecessor.
    UnorderedThresholds { index: usize },
    /// Stop `index` has a NaN or infinite threshold.
    NonFiniteThreshold { index: usize },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::EmptyColormap => write!(f, "colormap has no stops"),
            EncodeError::UnorderedThresholds { index } => write!(
                f,
                "colormap stop {} has a lower threshold than stop {}",
                index,
                index.saturating_sub(1)
            ),
            EncodeError::NonFiniteThreshold { index } => {
                write!(f, "colormap stop {} has a non-finite threshold", index)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// One encoded stop as laid out in the buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorStopData {
    pub color: [f32; 3],
    pub threshold: f32,
}

impl From<&ColorStop> for ColorStopData {
    fn from(stop: &ColorStop) -> Self {
        Self {
            color: stop.color,
            threshold: stop.threshold,
        }
    }
}

/// Flat, GPU-ready colormap buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct ColormapBuffer {
    bytes: Vec<u8>,
}

impl ColormapBuffer {
    /// Validate and encode `stops`, preserving their order.
    pub fn encode(stops: &[ColorStop]) -> Result<Self, EncodeError> {
        validate_stops(stops)?;
        let mut bytes = Vec::with_capacity(stops.len() * COLOR_STOP_STRIDE);
        for stop in stops {
            bytes.extend_from_slice(bytemuck::bytes_of(&ColorStopData::from(stop)));
        }
        Ok(Self { bytes })
    }

    /// Number of stops, passed to the shader as the colormap length.
    pub fn len(&self) -> usize {
        self.bytes.len() / COLOR_STOP_STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode every stop in buffer order.
    pub fn stops(&self) -> Vec<ColorStop> {
        self.bytes
            .chunks_exact(COLOR_STOP_STRIDE)
            .map(|chunk| {
                let data: ColorStopData = bytemuck::pod_read_unaligned(chunk);
                ColorStop::new(data.color, data.threshold)
            })
            .collect()
    }

    /// CPU rendition of the shader's colour lookup for `value`.
    pub fn sample(&self, value: f32) -> [f32; 3] {
        sample_stops(&self.stops(), value)
    }
}

fn validate_stops(stops: &[ColorStop]) -> Result<(), EncodeError> {
    if stops.is_empty() {
        return Err(EncodeError::EmptyColormap);
    }
    for (index, stop) in stops.iter().enumerate() {
        if !stop.threshold.is_finite() {
            return Err(EncodeError::NonFiniteThreshold { index });
        }
        if index > 0 && stop.threshold < stops[index - 1].threshold {
            return Err(EncodeError::UnorderedThresholds { index });
        }
    }
    Ok(())
}

/// Last stop with `threshold <= value`, or the first stop when `value` is
/// below every threshold. NaN selects the first stop.
pub fn sample_stops(stops: &[ColorStop], value: f32) -> [f32; 3] {
    let Some(first) = stops.first() else {
        return [0.0; 3];
    };
    stops
        .iter()
        .take_while(|s| s.threshold <= value)
        .last()
        .unwrap_or(first)
        .color
}
