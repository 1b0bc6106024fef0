//! The per-file decoding handle.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{assert_error_traits, ChannelCount, FrameIndex, Sample, SampleRate};

/// How precisely a source can position its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekGranularity {
    /// Any frame index can be reached exactly.
    Exact,
    /// Seeking lands on the start of a decoded block at or before the target.
    Block,
}

/// A decoded audio stream with random access by frame index.
///
/// Channel count and sampling rate are fixed for the lifetime of the source.
/// The cursor only moves through [`seek_sample_frame`](AudioSource::seek_sample_frame)
/// and [`read_sample_frames`](AudioSource::read_sample_frames) and never passes
/// [`frame_count`](AudioSource::frame_count).
///
/// A continuous read from the start up to frame `N` produces the same samples
/// as seeking a fresh source to any `P <= N` and reading forward to `N`.
/// Lossy codecs with overlapping frames (Opus) only guarantee this up to
/// [`seek_tolerance`](AudioSource::seek_tolerance).
pub trait AudioSource: Send {
    /// Number of interleaved channels per frame.
    fn channel_count(&self) -> ChannelCount;

    /// Frames per second.
    fn sampling_rate(&self) -> SampleRate;

    /// Total number of frames in the stream. Always positive for an opened source.
    fn frame_count(&self) -> u64;

    /// Index of the next frame that a read will return.
    fn frame_index(&self) -> FrameIndex;

    /// Whether seeks land exactly on the requested frame.
    fn seek_granularity(&self) -> SeekGranularity {
        SeekGranularity::Exact
    }

    /// Largest absolute sample difference between a seek-then-read pass and a
    /// continuous decode of the same region.
    fn seek_tolerance(&self) -> Sample {
        0.0
    }

    /// Moves the cursor to `frame_index`, clamped to [`frame_count`](AudioSource::frame_count).
    ///
    /// Returns the frame index actually reached. With [`SeekGranularity::Exact`]
    /// this is `min(frame_index, frame_count)`.
    ///
    /// # Errors
    ///
    /// On failure the cursor position is unspecified, though still within
    /// `0..=frame_count`.
    fn seek_sample_frame(&mut self, frame_index: FrameIndex) -> Result<FrameIndex, SeekError>;

    /// Decodes up to `frame_count` frames into `buffer` as interleaved samples.
    ///
    /// The read is capped by the capacity of `buffer` and by the frames left in
    /// the stream. Returns the number of frames written to the front of `buffer`.
    /// A decoding fault truncates the read; the source is exhausted afterwards.
    fn read_sample_frames(&mut self, frame_count: usize, buffer: &mut [Sample]) -> usize;

    #[inline]
    fn is_valid_frame_index(&self, frame_index: FrameIndex) -> bool {
        frame_index < self.frame_count()
    }

    /// Index of the last frame in the stream.
    #[inline]
    fn max_frame_index(&self) -> FrameIndex {
        self.frame_count().saturating_sub(1)
    }

    /// `true` once the cursor has reached the end of the stream.
    #[inline]
    fn is_exhausted(&self) -> bool {
        self.frame_index() >= self.frame_count()
    }

    #[inline]
    fn frames2samples(&self, frames: usize) -> usize {
        frames * self.channel_count().get() as usize
    }

    #[inline]
    fn samples2frames(&self, samples: usize) -> usize {
        samples / self.channel_count().get() as usize
    }

    /// Playing time of the whole stream.
    fn duration(&self) -> Duration {
        crate::decoder::utils::frames_to_duration(self.frame_count(), self.sampling_rate())
    }
}

/// Number of frames a read may produce given the request, the buffer capacity
/// and the frames remaining after `frame_index`.
#[inline]
pub(crate) fn readable_frames(
    requested: usize,
    buffer_len: usize,
    channels: ChannelCount,
    frame_index: FrameIndex,
    frame_count: u64,
) -> usize {
    let remaining = frame_count.saturating_sub(frame_index);
    let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
    requested
        .min(buffer_len / channels.get() as usize)
        .min(remaining)
}

/// Occurs when a seek could not be completed.
#[derive(Debug, thiserror::Error, Clone)]
pub enum SeekError {
    /// Rewinding or repositioning the underlying file failed.
    #[error("Error seeking in the underlying file")]
    IoError(#[from] Arc<io::Error>),
    /// The target lies behind the cursor and the stream cannot be rewound.
    #[error("Backward seek requires a seekable stream")]
    ForwardOnly,
    /// The hound WAV reader failed to reposition.
    #[cfg(feature = "hound")]
    #[error("Error seeking in wav file")]
    HoundDecoder(#[source] Arc<io::Error>),
    /// The claxon FLAC reader could not be recreated after a rewind.
    #[cfg(feature = "claxon")]
    #[error("Error re-opening flac stream")]
    ClaxonDecoder(#[source] Arc<claxon::Error>),
    /// The lewton Vorbis reader could not be recreated after a rewind.
    #[cfg(feature = "lewton")]
    #[error("Error re-opening ogg vorbis stream")]
    LewtonDecoder(#[source] Arc<lewton::VorbisError>),
    /// The symphonia demuxer or decoder failed during the seek.
    #[cfg(feature = "symphonia")]
    #[error("Error seeking with symphonia")]
    SymphoniaDecoder(#[source] Arc<symphonia::core::errors::Error>),
}
assert_error_traits!(SeekError);

impl From<io::Error> for SeekError {
    fn from(err: io::Error) -> Self {
        SeekError::IoError(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silence {
        channels: ChannelCount,
        frames: u64,
        position: FrameIndex,
    }

    impl AudioSource for Silence {
        fn channel_count(&self) -> ChannelCount {
            self.channels
        }

        fn sampling_rate(&self) -> SampleRate {
            SampleRate::new(1000).unwrap()
        }

        fn frame_count(&self) -> u64 {
            self.frames
        }

        fn frame_index(&self) -> FrameIndex {
            self.position
        }

        fn seek_sample_frame(&mut self, frame_index: FrameIndex) -> Result<FrameIndex, SeekError> {
            self.position = frame_index.min(self.frames);
            Ok(self.position)
        }

        fn read_sample_frames(&mut self, frame_count: usize, buffer: &mut [Sample]) -> usize {
            let frames = readable_frames(
                frame_count,
                buffer.len(),
                self.channels,
                self.position,
                self.frames,
            );
            let samples = self.frames2samples(frames);
            buffer[..samples].fill(0.0);
            self.position += frames as u64;
            frames
        }
    }

    fn silence(channels: u16, frames: u64) -> Silence {
        Silence {
            channels: ChannelCount::new(channels).unwrap(),
            frames,
            position: 0,
        }
    }

    #[test]
    fn frame_index_validity() {
        let source = silence(2, 100);
        assert!(source.is_valid_frame_index(0));
        assert!(source.is_valid_frame_index(99));
        assert!(!source.is_valid_frame_index(100));
        assert_eq!(source.max_frame_index(), 99);
    }

    #[test]
    fn frame_sample_conversions() {
        let source = silence(6, 10);
        assert_eq!(source.frames2samples(4), 24);
        assert_eq!(source.samples2frames(24), 4);
        assert_eq!(source.samples2frames(25), 4);
    }

    #[test]
    fn duration_follows_frame_count() {
        let source = silence(1, 1500);
        assert_eq!(source.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn reads_are_capped_by_buffer_and_stream_end() {
        let mut source = silence(2, 10);
        let mut buffer = [1.0; 8];

        // buffer holds only 4 stereo frames
        assert_eq!(source.read_sample_frames(6, &mut buffer), 4);
        assert_eq!(source.frame_index(), 4);

        let mut buffer = [1.0; 40];
        assert_eq!(source.read_sample_frames(20, &mut buffer), 6);
        assert!(source.is_exhausted());
        assert_eq!(source.read_sample_frames(20, &mut buffer), 0);
    }

    #[test]
    fn readable_frames_handles_cursor_past_end() {
        let channels = ChannelCount::new(1).unwrap();
        assert_eq!(readable_frames(10, 10, channels, 20, 10), 0);
    }
}
