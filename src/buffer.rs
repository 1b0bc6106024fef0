//! Caller-owned storage for decoded samples.
//!
//! A `SampleBuffer` is allocated once by the caller and handed to
//! [`AudioSource::read_sample_frames`](crate::AudioSource::read_sample_frames)
//! as a slice, so no allocation happens inside the read path.
//!
//! # Example
//!
//! ```
//! use soundsource::SampleBuffer;
//!
//! let channels = 2.try_into().unwrap();
//! let buffer = SampleBuffer::with_frames(channels, 1024);
//! assert_eq!(buffer.len(), 2048);
//! ```

use std::ops::{Deref, DerefMut};

use crate::common::{ChannelCount, Sample};

/// A fixed-capacity run of interleaved samples, zero-initialised.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    data: Box<[Sample]>,
}

impl SampleBuffer {
    /// Allocates a buffer holding `len` samples.
    pub fn new(len: usize) -> SampleBuffer {
        SampleBuffer {
            data: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Allocates a buffer holding `frames` interleaved frames of `channels` samples each.
    pub fn with_frames(channels: ChannelCount, frames: usize) -> SampleBuffer {
        Self::new(frames * channels.get() as usize)
    }

    /// Number of samples the buffer holds.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrites every sample with `value`.
    pub fn fill(&mut self, value: Sample) {
        self.data.fill(value);
    }
}

impl Deref for SampleBuffer {
    type Target = [Sample];

    #[inline]
    fn deref(&self) -> &[Sample] {
        &self.data
    }
}

impl DerefMut for SampleBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }
}

impl From<Vec<Sample>> for SampleBuffer {
    fn from(data: Vec<Sample>) -> Self {
        SampleBuffer {
            data: data.into_boxed_slice(),
        }
    }
}
