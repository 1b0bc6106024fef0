//! Decoding backends.
//!
//! Each backend wraps one third-party decoding crate behind [`AudioSource`](crate::AudioSource):
//!
//! | Backend     | Crate             | Formats                                       |
//! |-------------|-------------------|-----------------------------------------------|
//! | `hound`     | `hound`           | WAV                                           |
//! | `claxon`    | `claxon`          | FLAC                                          |
//! | `lewton`    | `lewton`          | Ogg Vorbis                                    |
//! | `minimp3`   | `minimp3_fixed`   | MP3                                           |
//! | `symphonia` | `symphonia`       | AIFF, FLAC, M4A (AAC, ALAC), MP3, Ogg, WAV    |
//!
//! Backends are compiled in through the cargo features of the same name.
//! Which backend opens which file is decided by the [registry](crate::registry).

use std::io;

use crate::common::assert_error_traits;

mod builder;
pub(crate) mod utils;

#[cfg(feature = "claxon")]
pub(crate) mod flac;
#[cfg(feature = "minimp3")]
pub(crate) mod mp3;
#[cfg(feature = "symphonia")]
mod read_seek_source;
#[cfg(feature = "symphonia")]
pub(crate) mod symphonia;
#[cfg(feature = "lewton")]
pub(crate) mod vorbis;
#[cfg(feature = "hound")]
pub(crate) mod wav;

pub use builder::Settings;

/// Error that can happen when a backend opens a stream.
#[derive(Debug, thiserror::Error, Clone)]
pub enum DecoderError {
    /// The stream is not in a format this backend can decode.
    #[error("Unrecognized format")]
    UnrecognizedFormat,

    /// An IO error occurred while reading, writing, or seeking the stream.
    #[error("IO error: {0}")]
    IoError(String),

    /// The stream contained malformed data and could not be decoded or demuxed.
    #[error("Decode error: {0}")]
    DecodeError(&'static str),

    /// A default or user-defined limit was reached while decoding or demuxing
    /// the stream. Limits are used to prevent denial-of-service attacks from
    /// malicious streams.
    #[error("Limit error: {0}")]
    LimitError(&'static str),

    /// The demuxer or decoder needs to be reset before continuing.
    #[error("Reset required")]
    ResetRequired,

    /// No streams were found by the decoder.
    #[error("No streams")]
    NoStreams,

    /// The stream parameters are unusable, like zero channels, a zero sample
    /// rate or no frames at all.
    #[error("Invalid stream parameters: {0}")]
    InvalidSpec(&'static str),
}
assert_error_traits!(DecoderError);

impl From<io::Error> for DecoderError {
    fn from(err: io::Error) -> Self {
        DecoderError::IoError(err.to_string())
    }
}
