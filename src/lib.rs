//! Decoding of local audio files behind one interface.
//!
//! A track is referenced by its path. The [`FormatRegistry`] decides from the
//! file-name suffix which decoding backends may handle it, and the
//! [`SoundSourceProxy`] tries them in priority order until one opens the
//! file. Every backend hands out the same [`AudioSource`]: a seekable stream
//! of interleaved `f32` sample frames.
//!
//! ```no_run
//! use soundsource::{SampleBuffer, SoundSourceProxy};
//!
//! let proxy = SoundSourceProxy::new("music/track.mp3");
//! let metadata = proxy.parse_track_metadata().unwrap();
//! println!("{} - {}", metadata.artist, metadata.title);
//!
//! let mut source = proxy.open_audio_source().unwrap();
//! let mut buffer = SampleBuffer::with_frames(source.channel_count(), 1024);
//! while !source.is_exhausted() {
//!     let frames = source.read_sample_frames(1024, &mut buffer);
//!     let samples = &buffer[..source.frames2samples(frames)];
//!     // ...
//!     # let _ = samples;
//! }
//! ```
//!
//! # Backends
//!
//! Backends are selected through cargo features:
//!
//! - `hound` for WAV, `claxon` for FLAC, `lewton` for Ogg Vorbis and
//!   `minimp3` for MP3. These are tried first for their format.
//! - `symphonia-*` features (pulled in by the `aiff`, `flac`, `mp3`, `mp4`,
//!   `vorbis` and `wav` format features) cover everything else and act as
//!   the fallback.
//! - `opus` adds Ogg Opus through libopus.
//!
//! # Logging
//!
//! With the default `tracing` feature, backend selection, decoder faults and
//! malformed tags are reported through the [`tracing`](https://docs.rs/tracing)
//! crate. Nothing is printed unless a subscriber is installed.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod common;
mod metadata;
mod proxy;
mod source;
mod track;

pub mod decoder;
pub mod registry;

pub use crate::buffer::SampleBuffer;
pub use crate::common::{ChannelCount, FrameIndex, Sample, SampleRate};
pub use crate::decoder::{DecoderError, Settings};
pub use crate::metadata::{CoverArt, MetadataError, TrackMetadata};
pub use crate::proxy::{OpenError, SoundSourceProxy};
pub use crate::registry::{is_file_name_supported, Backend, FormatRegistry};
pub use crate::source::{AudioSource, SeekError, SeekGranularity};
pub use crate::track::TrackRef;
