//! MP3 decoding with `minimp3`.
//!
//! MP3 frames depend on the bit reservoir of their predecessors, so an exact
//! seek has to decode from the start of the stream. A seek backwards rewinds
//! the file and decodes forward; a seek forwards keeps decoding from the
//! current frame.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use minimp3_fixed::{Decoder, Error as Mp3Error, Frame};

use super::utils::{self, BlockCursor};
use super::{DecoderError, Settings};
use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
use crate::source::{readable_frames, AudioSource, SeekError};

/// Maximum number of consecutive undecodable chunks skipped before giving up
/// on a stream that does not look like MP3.
const MAX_SKIPPED_CHUNKS: usize = 32;

pub struct Mp3Decoder<R>
where
    R: Read + Seek,
{
    /// Temporarily `None` while the stream is being rewound.
    decoder: Option<Decoder<R>>,
    block: BlockCursor,
    start: u64,
    channels: ChannelCount,
    sample_rate: SampleRate,
    frame_count: u64,
    frame_index: FrameIndex,
    is_seekable: bool,
}

impl<R> Mp3Decoder<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as MP3.
    ///
    /// The first frame fixes the channel count and sample rate. The whole
    /// stream is then decoded once to count its frames.
    pub fn new(mut data: R, settings: &Settings) -> Result<Mp3Decoder<R>, DecoderError> {
        let start = data.stream_position()?;
        let mut decoder = Decoder::new(data);

        let first = next_frame(&mut decoder)?.ok_or(DecoderError::UnrecognizedFormat)?;
        let channels = u16::try_from(first.channels)
            .ok()
            .and_then(ChannelCount::new)
            .ok_or(DecoderError::InvalidSpec("invalid channel count"))?;
        let sample_rate = u32::try_from(first.sample_rate)
            .ok()
            .and_then(SampleRate::new)
            .ok_or(DecoderError::InvalidSpec("invalid sample rate"))?;

        let mut frame_count = (first.data.len() / first.channels) as u64;
        while let Some(frame) = next_frame(&mut decoder)? {
            if !matches_spec(&frame, channels, sample_rate) {
                break;
            }
            frame_count += (frame.data.len() / frame.channels) as u64;
        }

        let mut data = decoder.into_inner();
        data.seek(SeekFrom::Start(start))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(frame_count, "counted mp3 frames");

        Ok(Mp3Decoder {
            decoder: Some(Decoder::new(data)),
            block: BlockCursor::default(),
            start,
            channels,
            sample_rate,
            frame_count,
            frame_index: 0,
            is_seekable: settings.is_seekable,
        })
    }

    fn rewind(&mut self) -> Result<(), SeekError> {
        let Some(decoder) = self.decoder.take() else {
            return Err(SeekError::IoError(Arc::new(std::io::Error::other(
                "mp3 decoder lost by an earlier failed rewind",
            ))));
        };
        let mut data = decoder.into_inner();
        data.seek(SeekFrom::Start(self.start))?;
        self.decoder = Some(Decoder::new(data));
        self.block.clear();
        self.frame_index = 0;
        Ok(())
    }
}

/// Returns the next decodable frame, skipping over junk between frames.
/// `Ok(None)` means end of stream.
fn next_frame<R: Read>(decoder: &mut Decoder<R>) -> Result<Option<Frame>, DecoderError> {
    let mut skipped = 0;
    loop {
        match decoder.next_frame() {
            Ok(frame) if frame.channels > 0 && !frame.data.is_empty() => return Ok(Some(frame)),
            Ok(_) | Err(Mp3Error::SkippedData) => {
                skipped += 1;
                if skipped > MAX_SKIPPED_CHUNKS {
                    return Err(DecoderError::UnrecognizedFormat);
                }
            }
            Err(Mp3Error::Eof) => return Ok(None),
            Err(Mp3Error::InsufficientData) => return Ok(None),
            Err(Mp3Error::Io(err)) => return Err(err.into()),
        }
    }
}

fn matches_spec(frame: &Frame, channels: ChannelCount, sample_rate: SampleRate) -> bool {
    frame.channels == channels.get() as usize && frame.sample_rate as u32 == sample_rate.get()
}

fn decode_frame<R: Read>(
    decoder: &mut Option<Decoder<R>>,
    channels: ChannelCount,
    sample_rate: SampleRate,
    out: &mut Vec<Sample>,
) -> bool {
    let Some(decoder) = decoder.as_mut() else {
        return false;
    };
    match next_frame(decoder) {
        Ok(Some(frame)) if matches_spec(&frame, channels, sample_rate) => {
            out.extend(
                frame
                    .data
                    .into_iter()
                    .map(|s| utils::int_to_sample(s as i32, 16)),
            );
            true
        }
        Ok(Some(_frame)) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                channels = _frame.channels,
                sample_rate = _frame.sample_rate,
                "mp3 stream parameters changed, stopping"
            );
            false
        }
        Ok(None) => false,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("mp3 decoding stopped: {_err}");
            false
        }
    }
}

impl<R> AudioSource for Mp3Decoder<R>
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
        let target = frame_index.min(self.frame_count);
        if target < self.frame_index {
            if !self.is_seekable {
                return Err(SeekError::ForwardOnly);
            }
            self.rewind()?;
        }

        let (channels, sample_rate) = (self.channels, self.sample_rate);
        let skipped = utils::skip_blocks(
            &mut self.block,
            (target - self.frame_index) * channels.get() as u64,
            |out| decode_frame(&mut self.decoder, channels, sample_rate, out),
        );
        self.frame_index += skipped / channels.get() as u64;
        if self.frame_index < target {
            self.frame_count = self.frame_index;
        }
        Ok(self.frame_index)
    }

    fn read_sample_frames(&mut self, frame_count: usize, buffer: &mut [Sample]) -> usize {
        let frames = readable_frames(
            frame_count,
            buffer.len(),
            self.channels,
            self.frame_index,
            self.frame_count,
        );
        let out = &mut buffer[..frames * self.channels.get() as usize];

        let (channels, sample_rate) = (self.channels, self.sample_rate);
        let written = utils::fill_from_blocks(&mut self.block, out, |out| {
            decode_frame(&mut self.decoder, channels, sample_rate, out)
        });

        let produced = written / channels.get() as usize;
        self.frame_index += produced as u64;
        if produced < frames {
            self.frame_count = self.frame_index;
        }
        produced
    }
}
