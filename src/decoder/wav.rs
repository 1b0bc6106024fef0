//! WAV decoding with `hound`.
//!
//! PCM data is uncompressed, so seeking jumps straight to the requested frame.

use std::io::{Read, Seek};
use std::sync::Arc;

use hound::{SampleFormat, WavReader, WavSpec};

use super::{utils, DecoderError, Settings};
use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
use crate::source::{readable_frames, AudioSource, SeekError};

/// Decoder for the WAV format.
pub struct WavDecoder<R>
where
    R: Read + Seek,
{
    reader: WavReader<R>,
    spec: WavSpec,
    channels: ChannelCount,
    sample_rate: SampleRate,
    frame_count: u64,
    frame_index: FrameIndex,
}

impl<R> WavDecoder<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as WAV.
    pub fn new(data: R, _settings: &Settings) -> Result<WavDecoder<R>, DecoderError> {
        let reader = WavReader::new(data).map_err(DecoderError::from)?;
        let spec = reader.spec();

        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) | (SampleFormat::Int, 8 | 16 | 24 | 32) => {}
            _ => return Err(DecoderError::InvalidSpec("unsupported wav sample format")),
        }

        let channels =
            ChannelCount::new(spec.channels).ok_or(DecoderError::InvalidSpec("zero channels"))?;
        let sample_rate = SampleRate::new(spec.sample_rate)
            .ok_or(DecoderError::InvalidSpec("zero sample rate"))?;

        Ok(WavDecoder {
            frame_count: reader.duration() as u64,
            reader,
            spec,
            channels,
            sample_rate,
            frame_index: 0,
        })
    }
}

impl<R> AudioSource for WavDecoder<R>
where
    R: Read + Seek + Send,
{
    #[inline]
    fn channel_count(&self) -> ChannelCount {
        self.channels
    }

    #[inline]
    fn sampling_rate(&self) -> SampleRate {
        self.sample_rate
    }

    #[inline]
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    fn seek_sample_frame(&mut self, frame_index: FrameIndex) -> Result<FrameIndex, SeekError> {
        // the frame count comes from a u32 header field, so this never truncates
        let target = frame_index.min(self.frame_count);
        self.reader
            .seek(target as u32)
            .map_err(|err| SeekError::HoundDecoder(Arc::new(err)))?;
        self.frame_index = target;
        Ok(target)
    }

    fn read_sample_frames(&mut self, frame_count: usize, buffer: &mut [Sample]) -> usize {
        let frames = readable_frames(
            frame_count,
            buffer.len(),
            self.channels,
            self.frame_index,
            self.frame_count,
        );
        let out = &mut buffer[..self.frames2samples(frames)];

        let written = match self.spec.sample_format {
            SampleFormat::Float => fill(self.reader.samples::<f32>(), out, |s| s),
            SampleFormat::Int => {
                let bits = self.spec.bits_per_sample as u32;
                fill(self.reader.samples::<i32>(), out, |s| {
                    utils::int_to_sample(s, bits)
                })
            }
        };

        let produced = self.samples2frames(written);
        self.frame_index += produced as u64;
        if produced < frames {
            // a short read means the data chunk is damaged; nothing after it is usable
            self.frame_count = self.frame_index;
        }
        produced
    }
}

fn fill<S, I, F>(samples: I, out: &mut [Sample], convert: F) -> usize
where
    I: Iterator<Item = hound::Result<S>>,
    F: Fn(S) -> Sample,
{
    let mut written = 0;
    for (slot, sample) in out.iter_mut().zip(samples) {
        match sample {
            Ok(sample) => {
                *slot = convert(sample);
                written += 1;
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("wav data ended early: {_err}");
                break;
            }
        }
    }
    written
}

impl From<hound::Error> for DecoderError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(err) => DecoderError::IoError(err.to_string()),
            hound::Error::FormatError(_) => DecoderError::UnrecognizedFormat,
            hound::Error::Unsupported => DecoderError::UnrecognizedFormat,
            hound::Error::TooWide | hound::Error::InvalidSampleFormat => {
                DecoderError::InvalidSpec("unsupported wav sample format")
            }
            hound::Error::UnfinishedSample => DecoderError::DecodeError("unfinished sample"),
        }
    }
}
