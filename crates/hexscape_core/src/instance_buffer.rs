//! Per-instance position buffer.
//!
//! Layout: `N × 12` bytes, one `[f32; 3]` per record in input order:
//! `((x - midx) * 2, (y - midy) * 2, value)`. Values pass through verbatim,
//! NaN included; clamping is the shader's business.

use bytemuck::{Pod, Zeroable};
use std::io::{self, Write};

use crate::geo::{Record, SceneTransform};

/// Size in bytes of one encoded record.
pub const INSTANCE_STRIDE: usize = 12;

/// One encoded record as laid out in the buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub position: [f32; 2],
    pub value: f32,
}

impl InstanceData {
    #[inline]
    pub fn from_record(record: &Record, transform: &SceneTransform) -> Self {
        Self {
            position: transform.ground(record.x, record.y),
            value: record.value as f32,
        }
    }
}

/// Flat, GPU-ready record buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceBuffer {
    bytes: Vec<u8>,
}

impl InstanceBuffer {
    /// Encode `records` relative to `midpoint`.
    ///
    /// An empty slice yields an empty buffer (zero-instance draw).
    pub fn encode(records: &[Record], midpoint: (f64, f64)) -> Self {
        let mut bytes = Vec::with_capacity(records.len() * INSTANCE_STRIDE);
        // Writing into a Vec cannot fail.
        let _ = write_instances(&mut bytes, records, midpoint);
        Self { bytes }
    }

    /// Wrap already-encoded bytes. Fails if the length is not a whole
    /// number of records.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() % INSTANCE_STRIDE == 0).then_some(Self { bytes })
    }

    pub fn instance_count(&self) -> usize {
        self.bytes.len() / INSTANCE_STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode entry `index`.
    pub fn get(&self, index: usize) -> Option<InstanceData> {
        let start = index.checked_mul(INSTANCE_STRIDE)?;
        let chunk = self.bytes.get(start..start + INSTANCE_STRIDE)?;
        Some(bytemuck::pod_read_unaligned(chunk))
    }

    /// Decode every entry in order.
    pub fn iter(&self) -> impl Iterator<Item = InstanceData> + '_ {
        self.bytes
            .chunks_exact(INSTANCE_STRIDE)
            .map(bytemuck::pod_read_unaligned::<InstanceData>)
    }
}

/// Stream-encode `records` into `writer`, one 12-byte entry per record.
///
/// Single pass, no intermediate allocation. Returns the number of records
/// written.
pub fn write_instances<W: Write>(
    writer: &mut W,
    records: &[Record],
    midpoint: (f64, f64),
) -> io::Result<usize> {
    let transform = SceneTransform::new(midpoint);
    for record in records {
        let entry = InstanceData::from_record(record, &transform);
        writer.write_all(bytemuck::bytes_of(&entry))?;
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bounds;

    #[test]
    fn test_single_record_scenario() {
        let midpoint = Bounds::new(-1.0, -1.0, 1.0, 1.0).midpoint();
        let buffer = InstanceBuffer::encode(&[Record::new(0.0, 0.0, 10.0)], midpoint);

        let mut expected = Vec::new();
        for v in [0.0f32, 0.0, 10.0] {
            expected.extend_from_slice(&v.to_ne_bytes());
        }
        assert_eq!(buffer.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_length_is_twelve_per_record() {
        let records: Vec<Record> = (0..1000)
            .map(|i| Record::new(i as f64 * 0.01, -(i as f64), i as f64 * 3.0))
            .collect();
        let buffer = InstanceBuffer::encode(&records, (0.5, 0.5));
        assert_eq!(buffer.as_bytes().len(), 12 * records.len());
        assert_eq!(buffer.instance_count(), records.len());
    }

    #[test]
    fn test_decode_reproduces_records_in_order() {
        let records = [
            Record::new(2.5, 47.0, 1200.0),
            Record::new(-1.25, 43.5, 0.0),
            Record::new(9.0, 51.0, 100000.0),
        ];
        let midpoint = (2.0, 46.0);
        let buffer = InstanceBuffer::encode(&records, midpoint);

        for (i, r) in records.iter().enumerate() {
            let entry = buffer.get(i).unwrap();
            let ex = ((r.x - midpoint.0) * 2.0) as f32;
            let ey = ((r.y - midpoint.1) * 2.0) as f32;
            assert!((entry.position[0] - ex).abs() < 1e-6);
            assert!((entry.position[1] - ey).abs() < 1e-6);
            assert_eq!(entry.value, r.value as f32);
        }
        assert!(buffer.get(3).is_none());
        assert_eq!(buffer.iter().count(), 3);
    }

    #[test]
    fn test_nan_passes_through() {
        let buffer = InstanceBuffer::encode(&[Record::new(0.0, 0.0, f64::NAN)], (0.0, 0.0));
        assert!(buffer.get(0).unwrap().value.is_nan());
    }

    #[test]
    fn test_empty_records_give_zero_instances() {
        let buffer = InstanceBuffer::encode(&[], (0.0, 0.0));
        assert!(buffer.is_empty());
        assert_eq!(buffer.instance_count(), 0);
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let records = [Record::new(1.0, 2.0, 3.0), Record::new(4.0, 5.0, 6.0)];
        assert_eq!(
            InstanceBuffer::encode(&records, (1.0, 1.0)),
            InstanceBuffer::encode(&records, (1.0, 1.0))
        );
    }

    #[test]
    fn test_streaming_writer_matches_buffer() {
        let records = [Record::new(1.0, 2.0, 3.0), Record::new(-4.0, 5.0, 6.0)];
        let mut out = Vec::new();
        let written = write_instances(&mut out, &records, (0.0, 1.0)).unwrap();
        assert_eq!(written, 2);
        assert_eq!(out, InstanceBuffer::encode(&records, (0.0, 1.0)).as_bytes());
    }

    #[test]
    fn test_from_bytes_checks_stride() {
        assert!(InstanceBuffer::from_bytes(vec![0; 24]).is_some());
        assert!(InstanceBuffer::from_bytes(vec![0; 13]).is_none());
    }
}
