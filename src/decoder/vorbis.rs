//! Ogg Vorbis decoding with `lewton`.
//!
//! Seeking decodes forward from the current packet, rewinding to the start of
//! the stream when the target is behind the cursor. lewton's granule seek
//! lands on page boundaries only, so it is not used.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use lewton::inside_ogg::OggStreamReader;
use lewton::VorbisError;

use super::utils::{self, BlockCursor};
use super::{DecoderError, Settings};
use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
use crate::source::{readable_frames, AudioSource, SeekError};

/// Decoder for an Ogg Vorbis stream.
pub struct VorbisDecoder<R>
where
    R: Read + Seek,
{
    /// Temporarily `None` while the stream is being rewound.
    stream_reader: Option<OggStreamReader<R>>,
    block: BlockCursor,
    start: u64,
    channels: ChannelCount,
    sample_rate: SampleRate,
    frame_count: u64,
    frame_index: FrameIndex,
    is_seekable: bool,
}

impl<R> VorbisDecoder<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as Ogg Vorbis.
    ///
    /// Vorbis headers carry no length, so the stream is decoded once to count
    /// its frames and then rewound.
    pub fn new(mut data: R, settings: &Settings) -> Result<VorbisDecoder<R>, DecoderError> {
        let start = data.stream_position()?;
        let mut stream_reader = OggStreamReader::new(data).map_err(DecoderError::from)?;

        let channels = ChannelCount::new(stream_reader.ident_hdr.audio_channels as u16)
            .ok_or(DecoderError::InvalidSpec("zero channels"))?;
        let sample_rate = SampleRate::new(stream_reader.ident_hdr.audio_sample_rate)
            .ok_or(DecoderError::InvalidSpec("zero sample rate"))?;

        let mut frame_count = 0u64;
        while let Some(packet) = stream_reader
            .read_dec_packet_itl()
            .map_err(DecoderError::from)?
        {
            frame_count += (packet.len() / channels.get() as usize) as u64;
        }

        let mut data = stream_reader.into_inner().into_inner();
        data.seek(SeekFrom::Start(start))?;
        let stream_reader = OggStreamReader::new(data).map_err(DecoderError::from)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(frame_count, "counted vorbis frames");

        Ok(VorbisDecoder {
            stream_reader: Some(stream_reader),
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
        let Some(stream_reader) = self.stream_reader.take() else {
            return Err(SeekError::IoError(Arc::new(std::io::Error::other(
                "vorbis reader lost by an earlier failed rewind",
            ))));
        };
        let mut data = stream_reader.into_inner().into_inner();
        data.seek(SeekFrom::Start(self.start))?;
        let stream_reader = OggStreamReader::new(data)
            .map_err(|err| SeekError::LewtonDecoder(Arc::new(err)))?;
        self.stream_reader = Some(stream_reader);
        self.block.clear();
        self.frame_index = 0;
        Ok(())
    }
}

fn decode_packet<R: Read + Seek>(
    stream_reader: &mut Option<OggStreamReader<R>>,
    out: &mut Vec<Sample>,
) -> bool {
    let Some(stream_reader) = stream_reader.as_mut() else {
        return false;
    };
    match stream_reader.read_dec_packet_itl() {
        Ok(Some(packet)) => {
            out.extend(
                packet
                    .into_iter()
                    .map(|s| utils::int_to_sample(s as i32, 16)),
            );
            true
        }
        Ok(None) => false,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("vorbis decoding stopped: {_err}");
            false
        }
    }
}

impl<R> AudioSource for VorbisDecoder<R>
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
        let skipped = utils::skip_blocks(
            &mut self.block,
            (target - self.frame_index) * channels,
            |out| decode_packet(&mut self.stream_reader, out),
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

        let written = utils::fill_from_blocks(&mut self.block, out, |out| {
            decode_packet(&mut self.stream_reader, out)
        });

        let produced = written / self.channels.get() as usize;
        self.frame_index += produced as u64;
        if produced < frames {
            self.frame_count = self.frame_index;
        }
        produced
    }
}

impl From<VorbisError> for DecoderError {
    fn from(err: VorbisError) -> Self {
        match err {
            VorbisError::BadAudio(_) => DecoderError::DecodeError("malformed vorbis audio packet"),
            _ => DecoderError::UnrecognizedFormat,
        }
    }
}
