//! FLAC decoding with `claxon`.
//!
//! claxon has no seek table support, so a seek decodes forward from the
//! current position, or rewinds to the start of the stream first when the
//! target lies behind the cursor. Both paths decode the same blocks, which
//! keeps seeking sample-exact.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use claxon::{FlacReader, FlacReaderOptions};

use super::utils::{self, BlockCursor};
use super::{DecoderError, Settings};
use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
use crate::source::{readable_frames, AudioSource, SeekError};

/// Reader options for `claxon`. Tags are read separately, so vorbis comments
/// are skipped.
const READER_OPTIONS: FlacReaderOptions = FlacReaderOptions {
    metadata_only: false,
    read_vorbis_comment: false,
};

/// Decoder for the FLAC format using the `claxon` library.
pub struct FlacDecoder<R>
where
    R: Read + Seek,
{
    /// Temporarily `None` while the stream is being rewound.
    reader: Option<FlacReader<R>>,
    /// Offset of the stream within `R`, returned to on rewind.
    start: u64,
    /// Raw storage reused between blocks.
    raw_block: Vec<i32>,
    block: BlockCursor,
    bits_per_sample: u32,
    channels: ChannelCount,
    sample_rate: SampleRate,
    frame_count: u64,
    frame_index: FrameIndex,
    is_seekable: bool,
}

impl<R> FlacDecoder<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as FLAC.
    ///
    /// When the stream info lacks a sample count, the stream is decoded once to
    /// count its frames.
    pub fn new(mut data: R, settings: &Settings) -> Result<FlacDecoder<R>, DecoderError> {
        let start = data.stream_position()?;
        let reader = FlacReader::new_ext(data, READER_OPTIONS).map_err(DecoderError::from)?;

        let info = reader.streaminfo();
        let channels = u16::try_from(info.channels)
            .ok()
            .and_then(ChannelCount::new)
            .ok_or(DecoderError::InvalidSpec("invalid channel count"))?;
        let sample_rate = SampleRate::new(info.sample_rate)
            .ok_or(DecoderError::InvalidSpec("zero sample rate"))?;
        let bits_per_sample = info.bits_per_sample;
        let max_block_len = info.max_block_size as usize * info.channels as usize;

        let (reader, frame_count) = match info.samples {
            // `samples` in FLAC means "inter-channel samples" aka frames
            Some(frames) if frames > 0 => (reader, frames),
            _ => {
                let (mut data, frames) = count_frames(reader)?;
                data.seek(SeekFrom::Start(start))?;
                let reader =
                    FlacReader::new_ext(data, READER_OPTIONS).map_err(DecoderError::from)?;
                (reader, frames)
            }
        };

        Ok(FlacDecoder {
            reader: Some(reader),
            start,
            raw_block: Vec::with_capacity(max_block_len),
            block: BlockCursor::with_capacity(max_block_len),
            bits_per_sample,
            channels,
            sample_rate,
            frame_count,
            frame_index: 0,
            is_seekable: settings.is_seekable,
        })
    }

    fn rewind(&mut self) -> Result<(), SeekError> {
        let Some(reader) = self.reader.take() else {
            return Err(SeekError::IoError(Arc::new(std::io::Error::other(
                "flac reader lost by an earlier failed rewind",
            ))));
        };
        let mut data = reader.into_inner();
        data.seek(SeekFrom::Start(self.start))?;
        let reader = FlacReader::new_ext(data, READER_OPTIONS)
            .map_err(|err| SeekError::ClaxonDecoder(Arc::new(err)))?;
        self.reader = Some(reader);
        self.block.clear();
        self.frame_index = 0;
        Ok(())
    }
}

/// Decodes the next block into `out` as interleaved samples.
fn decode_block<R: Read + Seek>(
    reader: &mut Option<FlacReader<R>>,
    raw_block: &mut Vec<i32>,
    bits_per_sample: u32,
    out: &mut Vec<Sample>,
) -> bool {
    let Some(reader) = reader.as_mut() else {
        return false;
    };
    let buffer = std::mem::take(raw_block);
    match reader.blocks().read_next_or_eof(buffer) {
        Ok(Some(block)) => {
            let frames = block.duration();
            for frame in 0..frames {
                for channel in 0..block.channels() {
                    out.push(utils::int_to_sample(
                        block.sample(channel, frame),
                        bits_per_sample,
                    ));
                }
            }
            *raw_block = block.into_buffer();
            true
        }
        Ok(None) => false,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("flac decoding stopped: {_err}");
            false
        }
    }
}

/// Decodes every block once and returns the data with the number of frames seen.
fn count_frames<R: Read + Seek>(mut reader: FlacReader<R>) -> Result<(R, u64), DecoderError> {
    let mut frames = 0u64;
    let mut buffer = Vec::new();
    loop {
        match reader.blocks().read_next_or_eof(buffer) {
            Ok(Some(block)) => {
                frames += block.duration() as u64;
                buffer = block.into_buffer();
            }
            Ok(None) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok((reader.into_inner(), frames))
}

impl<R> AudioSource for FlacDecoder<R>
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

        let channels = self.channels.get() as u64;
        let bits_per_sample = self.bits_per_sample;
        let skipped = utils::skip_blocks(
            &mut self.block,
            (target - self.frame_index) * channels,
            |out| decode_block(&mut self.reader, &mut self.raw_block, bits_per_sample, out),
        );
        self.frame_index += skipped / channels;
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

        let bits_per_sample = self.bits_per_sample;
        let written = utils::fill_from_blocks(&mut self.block, out, |out| {
            decode_block(&mut self.reader, &mut self.raw_block, bits_per_sample, out)
        });

        let produced = written / self.channels.get() as usize;
        self.frame_index += produced as u64;
        if produced < frames {
            self.frame_count = self.frame_index;
        }
        produced
    }
}

impl From<claxon::Error> for DecoderError {
    fn from(err: claxon::Error) -> Self {
        match err {
            claxon::Error::IoError(err) => DecoderError::IoError(err.to_string()),
            claxon::Error::FormatError(_) => DecoderError::UnrecognizedFormat,
            claxon::Error::Unsupported(reason) => DecoderError::InvalidSpec(reason),
        }
    }
}
