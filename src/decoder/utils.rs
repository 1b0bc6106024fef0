//! Helpers shared by the decoder backends.
//!
//! - converting frame counts to durations
//! - normalizing raw integer samples to [`Sample`]
//! - buffering one decoded block and draining it into caller buffers, which
//!   is how every block-oriented backend implements reading and skipping

use std::time::Duration;

#[cfg(alt_decoders)]
use dasp_sample::{Sample as _, I24};

use crate::common::{Sample, SampleRate};

/// Converts a frame count at the given rate to a duration with nanosecond precision.
pub(crate) fn frames_to_duration(frames: u64, sample_rate: SampleRate) -> Duration {
    let sample_rate = sample_rate.get() as u64;
    let secs = frames / sample_rate;
    let nanos = ((frames % sample_rate) * 1_000_000_000) / sample_rate;
    Duration::new(secs, nanos as u32)
}

/// Normalizes a signed integer sample of `bits` significant bits to [`Sample`].
#[cfg(alt_decoders)]
#[inline]
pub(crate) fn int_to_sample(raw: i32, bits: u32) -> Sample {
    match bits {
        8 => (raw as i8).to_sample(),
        16 => (raw as i16).to_sample(),
        24 => I24::new(raw)
            .unwrap_or(<I24 as dasp_sample::Sample>::EQUILIBRIUM)
            .to_sample(),
        32 => raw.to_sample(),
        // 12 and 20 bit samples have no dasp type; widen them to 32 bits.
        bits @ 1..=31 => (raw << (32 - bits)).to_sample(),
        _ => <Sample as dasp_sample::Sample>::EQUILIBRIUM,
    }
}

/// One decoded block of interleaved samples and the read offset into it.
#[cfg(block_decoders)]
#[derive(Debug, Default)]
pub(crate) struct BlockCursor {
    samples: Vec<Sample>,
    offset: usize,
}

#[cfg(block_decoders)]
impl BlockCursor {
    #[cfg(feature = "claxon")]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        BlockCursor {
            samples: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    /// Empties the cursor and returns the storage for the next block to be
    /// decoded into.
    #[inline]
    pub(crate) fn refill(&mut self) -> &mut Vec<Sample> {
        self.samples.clear();
        self.offset = 0;
        &mut self.samples
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.samples.clear();
        self.offset = 0;
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.samples.len() - self.offset
    }

    #[inline]
    pub(crate) fn is_drained(&self) -> bool {
        self.offset >= self.samples.len()
    }

    /// Copies as many buffered samples as fit into `out`. Returns the number copied.
    #[inline]
    pub(crate) fn take_into(&mut self, out: &mut [Sample]) -> usize {
        let count = self.remaining().min(out.len());
        out[..count].copy_from_slice(&self.samples[self.offset..self.offset + count]);
        self.offset += count;
        count
    }

    /// Drops up to `samples` buffered samples. Returns the number dropped.
    #[inline]
    pub(crate) fn skip(&mut self, samples: u64) -> u64 {
        let count = (self.remaining() as u64).min(samples);
        self.offset += count as usize;
        count
    }
}

/// Fills `out` from `cursor`, calling `decode_next` whenever the cursor runs
/// dry. `decode_next` writes the next block into the vector it is given and
/// returns `false` at the end of the stream or on an unrecoverable fault.
///
/// Returns the number of samples written.
#[cfg(block_decoders)]
pub(crate) fn fill_from_blocks<F>(cursor: &mut BlockCursor, out: &mut [Sample], mut decode_next: F) -> usize
where
    F: FnMut(&mut Vec<Sample>) -> bool,
{
    let mut written = 0;
    while written < out.len() {
        if cursor.is_drained() {
            if !decode_next(cursor.refill()) {
                break;
            }
            continue;
        }
        written += cursor.take_into(&mut out[written..]);
    }
    written
}

/// Discards `samples` samples by draining `cursor` and decoding further
/// blocks as needed. Returns the number actually discarded, which is less than
/// requested only if the stream ended first.
#[cfg(block_decoders)]
pub(crate) fn skip_blocks<F>(cursor: &mut BlockCursor, samples: u64, mut decode_next: F) -> u64
where
    F: FnMut(&mut Vec<Sample>) -> bool,
{
    let mut skipped = 0;
    while skipped < samples {
        if cursor.is_drained() {
            if !decode_next(cursor.refill()) {
                break;
            }
            continue;
        }
        skipped += cursor.skip(samples - skipped);
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_to_duration() {
        let rate_44_1k = SampleRate::new(44100).unwrap();
        assert_eq!(
            frames_to_duration(rate_44_1k.get() as u64, rate_44_1k),
            Duration::from_secs(1)
        );
        assert_eq!(
            frames_to_duration(rate_44_1k.get() as u64 / 2, rate_44_1k),
            Duration::from_millis(500)
        );
        assert_eq!(frames_to_duration(0, rate_44_1k), Duration::ZERO);

        // 1 frame at 44.1kHz is about 22.675 microseconds
        assert_eq!(frames_to_duration(1, rate_44_1k).as_nanos(), 22675);
    }

    #[cfg(alt_decoders)]
    mod int_conversion {
        use super::super::int_to_sample;
        use approx::assert_abs_diff_eq;
        use quickcheck::quickcheck;

        #[test]
        fn full_scale_values() {
            assert_abs_diff_eq!(int_to_sample(i16::MIN as i32, 16), -1.0);
            assert_abs_diff_eq!(int_to_sample(0, 24), 0.0);
            assert_abs_diff_eq!(int_to_sample(-(1 << 23), 24), -1.0);
            assert_abs_diff_eq!(int_to_sample(i8::MAX as i32, 8), 1.0, epsilon = 0.01);
        }

        #[test]
        fn twenty_bit_matches_twenty_four_bit() {
            let raw20 = 0x4_0000;
            let raw24 = raw20 << 4;
            assert_abs_diff_eq!(int_to_sample(raw20, 20), int_to_sample(raw24, 24));
        }

        quickcheck! {
            fn sixteen_bit_samples_stay_in_range(raw: i16) -> bool {
                let sample = int_to_sample(raw as i32, 16);
                (-1.0..=1.0).contains(&sample)
            }

            fn sign_is_preserved(raw: i16) -> bool {
                let sample = int_to_sample(raw as i32, 16);
                sample.signum() == (raw as f32).signum() || raw == 0
            }
        }
    }

    #[cfg(block_decoders)]
    mod blocks {
        use super::super::*;

        fn counting_blocks(block_len: usize, blocks: usize) -> impl FnMut(&mut Vec<Sample>) -> bool {
            let mut next = 0;
            move |out: &mut Vec<Sample>| {
                if next == blocks {
                    return false;
                }
                let start = next * block_len;
                out.extend((start..start + block_len).map(|i| i as Sample));
                next += 1;
                true
            }
        }

        #[test]
        fn fill_spans_block_boundaries() {
            let mut cursor = BlockCursor::default();
            let mut decode = counting_blocks(4, 3);
            let mut out = [0.0; 6];

            assert_eq!(fill_from_blocks(&mut cursor, &mut out, &mut decode), 6);
            assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

            let mut out = [0.0; 10];
            assert_eq!(fill_from_blocks(&mut cursor, &mut out, &mut decode), 6);
            assert_eq!(&out[..6], &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        }

        #[test]
        fn skip_then_fill() {
            let mut cursor = BlockCursor::default();
            let mut decode = counting_blocks(4, 3);

            assert_eq!(skip_blocks(&mut cursor, 5, &mut decode), 5);
            let mut out = [0.0; 2];
            fill_from_blocks(&mut cursor, &mut out, &mut decode);
            assert_eq!(out, [5.0, 6.0]);

            assert_eq!(skip_blocks(&mut cursor, 100, &mut decode), 5);
            assert!(cursor.is_drained());
        }
    }
}
