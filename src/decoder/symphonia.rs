//! Multi-format decoding with `symphonia`.
//!
//! Covers AIFF, FLAC, MP4 (AAC, ALAC), MP3, Ogg (Vorbis, Opus through libopus)
//! and WAV, depending on the enabled features.
//!
//! Frame positions are derived from packet timestamps. An exact seek asks the
//! demuxer for a position some pre-roll frames before the target, resets the
//! decoder and decodes forward, so that decoder state (MDCT overlap, MP3 bit
//! reservoir) matches what a continuous decode would have at the target.

use std::io::{Read, Seek};
use std::sync::{Arc, LazyLock};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{
        CodecRegistry, CodecType, Decoder, DecoderOptions, CODEC_TYPE_AAC, CODEC_TYPE_MP1,
        CODEC_TYPE_MP2, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_OPUS, CODEC_TYPE_VORBIS,
    },
    errors::Error,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};

use super::read_seek_source::ReadSeekSource;
use super::utils::{self, BlockCursor};
use super::{DecoderError, Settings};
use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
use crate::source::{readable_frames, AudioSource, SeekError, SeekGranularity};

/// Number of consecutive packets that may fail to decode before the stream is
/// considered broken.
const MAX_DECODE_RETRIES: usize = 3;

/// Forward seeks up to this many frames decode and discard instead of asking
/// the demuxer to reposition.
const MIN_DEMUXER_SEEK_DISTANCE: u64 = 16384;

/// Frames of an MP3 frame.
const MP3_FRAME_LEN: u64 = 1152;

/// The MP3 bit reservoir can reach back several frames. Decoding this many
/// frames before the target settles the decoder.
const MP3_SEEK_PREROLL_FRAMES: u64 = 29;

const AAC_FRAME_LEN: u64 = 1024;
const AAC_SEEK_PREROLL_FRAMES: u64 = 3;

const VORBIS_SEEK_PREROLL: u64 = 2 * 2048;

const OPUS_SEEK_PREROLL_MILLIS: u64 = 80;

/// Largest sample deviation after seeking in an Opus stream.
const OPUS_SEEK_TOLERANCE: Sample = 0.2;

static CODEC_REGISTRY: LazyLock<CodecRegistry> = LazyLock::new(|| {
    let mut registry = CodecRegistry::new();
    symphonia::default::register_enabled_codecs(&mut registry);
    #[cfg(feature = "symphonia-libopus")]
    registry.register_all::<symphonia_adapter_libopus::OpusDecoder>();
    registry
});

/// Number of frames to decode ahead of a seek target for the given codec.
fn seek_preroll(codec: CodecType, sample_rate: SampleRate) -> u64 {
    match codec {
        CODEC_TYPE_MP1 | CODEC_TYPE_MP2 | CODEC_TYPE_MP3 => {
            MP3_SEEK_PREROLL_FRAMES * MP3_FRAME_LEN
        }
        CODEC_TYPE_AAC => AAC_SEEK_PREROLL_FRAMES * AAC_FRAME_LEN,
        CODEC_TYPE_VORBIS => VORBIS_SEEK_PREROLL,
        CODEC_TYPE_OPUS => sample_rate.get() as u64 * OPUS_SEEK_PREROLL_MILLIS / 1000,
        _ => 0,
    }
}

/// Maps packet timestamps to frame indices and back.
///
/// Frame 0 is the first frame of the first packet that decoded to audio.
#[derive(Debug, Clone, Copy)]
struct Timeline {
    time_base: Option<TimeBase>,
    sample_rate: u32,
    origin_ts: u64,
}

impl Timeline {
    fn frame_of(&self, ts: u64) -> FrameIndex {
        let ts = ts.saturating_sub(self.origin_ts);
        match self.time_base {
            Some(tb) => {
                (ts as u128 * tb.numer as u128 * self.sample_rate as u128 / tb.denom as u128)
                    as u64
            }
            None => ts,
        }
    }

    /// Rounds down, so a demuxer seek never lands past `frame`.
    fn ts_of(&self, frame: FrameIndex) -> u64 {
        let ts = match self.time_base {
            Some(tb) => {
                (frame as u128 * tb.denom as u128
                    / (tb.numer as u128 * self.sample_rate as u128)) as u64
            }
            None => frame,
        };
        self.origin_ts + ts
    }
}

/// The demuxer and decoder of the selected track.
struct PacketStream {
    demuxer: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: ChannelCount,
    sample_buffer: Option<SampleBuffer<Sample>>,
}

impl PacketStream {
    /// Decodes the next packet that produces audio into `out`, returning its
    /// timestamp. `None` means end of stream, or a fault that ends it.
    fn next_block(&mut self, out: &mut Vec<Sample>) -> Option<u64> {
        let mut failures = 0;
        loop {
            let packet = match self.demuxer.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return None;
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("demuxer stopped: {_err}");
                    return None;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(err) => {
                    failures += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(ts = packet.ts(), failures, "skipping undecodable packet: {err}");
                    if failures > MAX_DECODE_RETRIES
                        || !should_continue_on_decode_error(&err, &mut self.decoder)
                    {
                        return None;
                    }
                    continue;
                }
            };
            if decoded.spec().channels.count() != self.channels.get() as usize {
                #[cfg(feature = "tracing")]
                tracing::warn!("channel layout changed mid-stream, stopping");
                return None;
            }
            if decoded.frames() == 0 {
                continue;
            }

            let required = decoded.capacity() * self.channels.get() as usize;
            if self
                .sample_buffer
                .as_ref()
                .map_or(true, |buffer| buffer.capacity() < required)
            {
                self.sample_buffer = Some(SampleBuffer::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            let buffer = self.sample_buffer.as_mut()?;
            buffer.copy_interleaved_ref(decoded);
            out.extend_from_slice(buffer.samples());
            return Some(packet.ts());
        }
    }

    fn seek(&mut self, ts: u64) -> Result<(), SeekError> {
        self.demuxer
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts,
                    track_id: self.track_id,
                },
            )
            .map_err(|err| SeekError::SymphoniaDecoder(Arc::new(err)))?;
        self.decoder.reset();
        Ok(())
    }
}

/// Multi-format decoder using the symphonia library.
pub struct SymphoniaDecoder {
    stream: PacketStream,
    block: BlockCursor,
    timeline: Timeline,
    sample_rate: SampleRate,
    frame_count: u64,
    frame_index: FrameIndex,
    preroll: u64,
    tolerance: Sample,
    coarse_seek: bool,
}

impl SymphoniaDecoder {
    /// Probes `data` and prepares the first track with a known codec.
    pub fn new<R>(data: R, settings: &Settings) -> Result<Self, DecoderError>
    where
        R: Read + Seek + Send + Sync + 'static,
    {
        let source = ReadSeekSource::new(data, settings);
        let mss = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());
        SymphoniaDecoder::init(mss, settings).map_err(DecoderError::from)
    }

    fn init(mss: MediaSourceStream, settings: &Settings) -> Result<Self, Error> {
        let mut hint = Hint::new();
        if let Some(ext) = settings.hint.as_ref() {
            hint.with_extension(ext);
        }
        if let Some(typ) = settings.mime_type.as_ref() {
            hint.mime_type(typ);
        }
        let format_opts = FormatOptions {
            enable_gapless: settings.gapless,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;
        let mut demuxer = probed.format;

        let track = demuxer
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(Error::Unsupported("No track with supported codec"))?;
        let track_id = track.id;
        let codec = track.codec_params.codec;
        let time_base = track.codec_params.time_base;
        let n_frames = track.codec_params.n_frames;
        let mut decoder = CODEC_REGISTRY.make(&track.codec_params, &DecoderOptions::default())?;

        // symphonia reports the length in time-base units
        let end_ts = match n_frames {
            Some(n_frames) => n_frames,
            None => {
                let end_ts = scan_end_ts(demuxer.as_mut(), track_id)?;
                demuxer.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 0, track_id })?;
                end_ts
            }
        };

        // Decode the first packet to establish the stream spec
        let mut block = BlockCursor::default();
        let mut failures = 0;
        let (spec, origin_ts) = loop {
            let packet = demuxer.next_packet()?;
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let mut sample_buffer =
                        SampleBuffer::<Sample>::new(decoded.capacity() as u64, spec);
                    sample_buffer.copy_interleaved_ref(decoded);
                    block.refill().extend_from_slice(sample_buffer.samples());
                    break (spec, packet.ts());
                }
                Err(err) => {
                    failures += 1;
                    if failures > MAX_DECODE_RETRIES
                        || !should_continue_on_decode_error(&err, &mut decoder)
                    {
                        return Err(err);
                    }
                }
            }
        };

        let sample_rate =
            SampleRate::new(spec.rate).ok_or(Error::Unsupported("zero sample rate"))?;
        let channels = u16::try_from(spec.channels.count())
            .ok()
            .and_then(ChannelCount::new)
            .ok_or(Error::Unsupported("invalid channel count"))?;

        let timeline = Timeline {
            time_base,
            sample_rate: sample_rate.get(),
            origin_ts,
        };
        let frame_count = timeline.frame_of(end_ts);
        let preroll = seek_preroll(codec, sample_rate);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            ?codec,
            channels = channels.get(),
            sample_rate = sample_rate.get(),
            frame_count,
            preroll,
            "opened symphonia track"
        );

        Ok(SymphoniaDecoder {
            stream: PacketStream {
                demuxer,
                decoder,
                track_id,
                channels,
                sample_buffer: None,
            },
            block,
            timeline,
            sample_rate,
            frame_count,
            frame_index: 0,
            preroll,
            tolerance: if codec == CODEC_TYPE_OPUS {
                OPUS_SEEK_TOLERANCE
            } else {
                0.0
            },
            coarse_seek: settings.coarse_seek,
        })
    }

    /// Discards decoded frames until the cursor reaches `target`.
    fn skip_to(&mut self, target: FrameIndex) {
        let channels = self.stream.channels.get() as u64;
        let samples = target.saturating_sub(self.frame_index) * channels;
        let skipped = utils::skip_blocks(&mut self.block, samples, |out| {
            self.stream.next_block(out).is_some()
        });
        self.frame_index += skipped / channels;
        if self.frame_index < target {
            self.frame_count = self.frame_index;
        }
    }

    /// Repositions the demuxer at or before `frame` and decodes the first block
    /// there. Returns the frame index of that block, or `None` if the stream
    /// ended.
    fn demuxer_seek(&mut self, frame: FrameIndex) -> Result<Option<FrameIndex>, SeekError> {
        self.stream.seek(self.timeline.ts_of(frame))?;
        self.block.clear();
        Ok(self
            .stream
            .next_block(self.block.refill())
            .map(|ts| self.timeline.frame_of(ts)))
    }
}

/// Walks every packet of `track_id` and returns the timestamp just past the
/// last one.
fn scan_end_ts(demuxer: &mut dyn FormatReader, track_id: u32) -> Result<u64, Error> {
    let mut end_ts = 0;
    loop {
        match demuxer.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    end_ts = end_ts.max(packet.ts() + packet.dur());
                }
            }
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(end_ts);
            }
            Err(err) => return Err(err),
        }
    }
}

fn should_continue_on_decode_error(error: &Error, decoder: &mut Box<dyn Decoder>) -> bool {
    match error {
        Error::DecodeError(_) | Error::IoError(_) => true,
        Error::ResetRequired => {
            decoder.reset();
            true
        }
        _ => false,
    }
}

impl AudioSource for SymphoniaDecoder {
    #[inline]
    fn channel_count(&self) -> ChannelCount {
        self.stream.channels
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

    fn seek_granularity(&self) -> SeekGranularity {
        if self.coarse_seek {
            SeekGranularity::Block
        } else {
            SeekGranularity::Exact
        }
    }

    fn seek_tolerance(&self) -> Sample {
        self.tolerance
    }

    fn seek_sample_frame(&mut self, frame_index: FrameIndex) -> Result<FrameIndex, SeekError> {
        let target = frame_index.min(self.frame_count);
        if target == self.frame_index {
            return Ok(target);
        }

        if target > self.frame_index
            && target - self.frame_index <= self.preroll.max(MIN_DEMUXER_SEEK_DISTANCE)
        {
            self.skip_to(target);
            return Ok(self.frame_index);
        }

        if self.coarse_seek {
            let Some(block_start) = self.demuxer_seek(target)? else {
                self.frame_index = self.frame_count;
                return Ok(self.frame_index);
            };
            self.frame_index = block_start.min(self.frame_count);
            return Ok(self.frame_index);
        }

        let seek_frame = target.saturating_sub(self.preroll);
        #[cfg(feature = "tracing")]
        tracing::debug!(target, seek_frame, "demuxer seek with pre-roll");

        let mut block_start = self.demuxer_seek(seek_frame)?;
        if block_start.is_some_and(|start| start > target) {
            #[cfg(feature = "tracing")]
            tracing::debug!(target, ?block_start, "demuxer overshot, decoding from the start");
            block_start = self.demuxer_seek(0)?;
        }
        let Some(block_start) = block_start else {
            self.frame_index = self.frame_count;
            return Ok(self.frame_index);
        };

        self.frame_index = block_start;
        self.skip_to(target);
        Ok(self.frame_index)
    }

    fn read_sample_frames(&mut self, frame_count: usize, buffer: &mut [Sample]) -> usize {
        let channels = self.stream.channels;
        let frames = readable_frames(
            frame_count,
            buffer.len(),
            channels,
            self.frame_index,
            self.frame_count,
        );
        let out = &mut buffer[..frames * channels.get() as usize];

        let written = utils::fill_from_blocks(&mut self.block, out, |out| {
            self.stream.next_block(out).is_some()
        });

        let produced = written / channels.get() as usize;
        self.frame_index += produced as u64;
        if produced < frames {
            self.frame_count = self.frame_index;
        }
        produced
    }
}

impl From<Error> for DecoderError {
    fn from(err: Error) -> Self {
        match err {
            Error::IoError(e) => DecoderError::IoError(e.to_string()),
            Error::DecodeError(e) => DecoderError::DecodeError(e),
            Error::SeekError(_) => DecoderError::DecodeError("seek failed while opening"),
            Error::Unsupported(_) => DecoderError::UnrecognizedFormat,
            Error::LimitError(e) => DecoderError::LimitError(e),
            Error::ResetRequired => DecoderError::ResetRequired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_without_time_base_counts_frames() {
        let timeline = Timeline {
            time_base: None,
            sample_rate: 44100,
            origin_ts: 0,
        };
        assert_eq!(timeline.frame_of(1234), 1234);
        assert_eq!(timeline.ts_of(1234), 1234);
    }

    #[test]
    fn timeline_converts_between_rates() {
        // timestamps in milliseconds on a 48 kHz stream
        let timeline = Timeline {
            time_base: Some(TimeBase::new(1, 1000)),
            sample_rate: 48000,
            origin_ts: 0,
        };
        assert_eq!(timeline.frame_of(1000), 48000);
        assert_eq!(timeline.ts_of(48000), 1000);
        // rounds down to the timestamp at or before the frame
        assert_eq!(timeline.ts_of(47999), 999);
    }

    #[test]
    fn timeline_origin_is_frame_zero() {
        let timeline = Timeline {
            time_base: Some(TimeBase::new(1, 44100)),
            sample_rate: 44100,
            origin_ts: 576,
        };
        assert_eq!(timeline.frame_of(576), 0);
        assert_eq!(timeline.frame_of(0), 0);
        assert_eq!(timeline.frame_of(1152), 576);
        assert_eq!(timeline.ts_of(0), 576);
    }

    #[test]
    fn preroll_per_codec() {
        let rate = SampleRate::new(48000).unwrap();
        assert_eq!(seek_preroll(CODEC_TYPE_MP3, rate), 29 * 1152);
        assert_eq!(seek_preroll(CODEC_TYPE_AAC, rate), 3 * 1024);
        assert_eq!(seek_preroll(CODEC_TYPE_VORBIS, rate), 4096);
        assert_eq!(seek_preroll(CODEC_TYPE_OPUS, rate), 3840);
        assert_eq!(seek_preroll(CODEC_TYPE_NULL, rate), 0);
    }
}
