//! Sample-region codecs.
//!
//! The packed layout of a frame's sample region is defined by the sensor
//! firmware, not by this crate. A codec turns one region into per-channel
//! sample tuples; [`InterleavedI16`] is the layout spoken by the current
//! hardware generation.

use log::debug;

/// Decodes the packed sample region of a frame into per-channel tuples.
///
/// Implementations must return exactly `channels` vectors of equal
/// length: the number of complete tuples found in the region.
pub trait SampleCodec: Send + Sync {
    fn decode(&self, region: &[u8], channels: usize) -> Vec<Vec<f64>>;
}

/// One little-endian `i16` per channel per tuple, channel-major within a
/// tuple: `c0 c1 .. cN-1 c0 c1 ..`.
///
/// A trailing partial tuple is ignored; complete tuples before it are
/// still decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterleavedI16;

impl SampleCodec for InterleavedI16 {
    fn decode(&self, region: &[u8], channels: usize) -> Vec<Vec<f64>> {
        if channels == 0 {
            return Vec::new();
        }
        let stride = 2 * channels;
        let tuples = region.len() / stride;
        let trailing = region.len() % stride;
        if trailing != 0 {
            debug!("ignoring {trailing} trailing bytes of a partial sample tuple");
        }
        let mut decoded = vec![Vec::with_capacity(tuples); channels];
        for tuple in 0..tuples {
            for (channel, samples) in decoded.iter_mut().enumerate() {
                let at = tuple * stride + channel * 2;
                samples.push(i16::from_le_bytes([region[at], region[at + 1]]) as f64);
            }
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two tuples of three channels each.
    const REGION: [u8; 12] = [
        0x10, 0x00, 0xff, 0xff, 0x00, 0xff, // tuple 0
        0x11, 0x00, 0x0f, 0xff, 0x00, 0x0f, // tuple 1
    ];

    #[test]
    fn decodes_interleaved_tuples() {
        let decoded = InterleavedI16.decode(&REGION, 3);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0], vec![16.0, 17.0]);
        assert_eq!(decoded[1], vec![-1.0, -241.0]);
        assert_eq!(decoded[2], vec![-256.0, 3840.0]);
    }

    #[test]
    fn ignores_trailing_partial_tuple() {
        let mut region = REGION.to_vec();
        region.extend_from_slice(&[0x01, 0x02, 0x03]);
        let decoded = InterleavedI16.decode(&region, 3);
        assert_eq!(decoded[0], vec![16.0, 17.0]);
        assert_eq!(decoded[2].len(), 2);
    }

    #[test]
    fn empty_region_decodes_to_empty_channels() {
        let decoded = InterleavedI16.decode(&[], 4);
        assert_eq!(decoded.len(), 4);
        assert!(decoded.iter().all(Vec::is_empty));
    }
}
