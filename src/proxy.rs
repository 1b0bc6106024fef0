//! Entry point for opening tracks.
//!
//! A [`SoundSourceProxy`] resolves a track through the [`FormatRegistry`],
//! tries the claiming backends in priority order and hands out the first
//! [`AudioSource`] that opens. It also reads the track's tags and cover art.
//!
//! ```no_run
//! use soundsource::{SampleBuffer, SoundSourceProxy, TrackRef};
//!
//! let proxy = SoundSourceProxy::new(TrackRef::new("music/track.flac"));
//! if let Some(mut source) = proxy.open_audio_source() {
//!     let mut buffer = SampleBuffer::with_frames(source.channel_count(), 4096);
//!     source.seek_sample_frame(44100).unwrap();
//!     let frames = source.read_sample_frames(4096, &mut buffer);
//!     println!("read {frames} frames");
//! }
//! ```

use std::fs::File;
use std::io::{self, Seek};
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::assert_error_traits;
use crate::decoder::{DecoderError, Settings};
use crate::metadata::{self, CoverArt, MetadataError, TrackMetadata};
use crate::registry::{Backend, FormatRegistry};
use crate::source::AudioSource;
use crate::track::TrackRef;

/// Error that can happen when opening a track for decoding.
#[derive(Debug, thiserror::Error, Clone)]
pub enum OpenError {
    /// No backend claims the file-name suffix. The file was not touched.
    #[error("Unsupported file type: {file_name}")]
    UnsupportedFormat { file_name: String },
    /// The file could not be opened.
    #[error("Could not open {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    /// Every backend claiming the suffix declined the file.
    #[error("No backend could decode {file_name} (tried {})", attempts.len())]
    NoMatchingBackend {
        file_name: String,
        /// Each backend tried, with the reason it declined.
        attempts: Vec<(Backend, DecoderError)>,
    },
}
assert_error_traits!(OpenError);

/// Opens a track for decoding and reads its metadata.
#[derive(Debug, Clone)]
pub struct SoundSourceProxy<'a> {
    track: TrackRef,
    settings: Settings,
    registry: &'a FormatRegistry,
}

impl SoundSourceProxy<'static> {
    /// Proxy using the global registry and default settings.
    pub fn new(track: impl Into<TrackRef>) -> Self {
        Self::with_settings(track, Settings::default())
    }

    pub fn with_settings(track: impl Into<TrackRef>, settings: Settings) -> Self {
        SoundSourceProxy {
            track: track.into(),
            settings,
            registry: FormatRegistry::global(),
        }
    }
}

impl<'a> SoundSourceProxy<'a> {
    /// Proxy consulting only the backends of `registry`.
    pub fn with_registry(
        track: impl Into<TrackRef>,
        settings: Settings,
        registry: &'a FormatRegistry,
    ) -> Self {
        SoundSourceProxy {
            track: track.into(),
            settings,
            registry,
        }
    }

    pub fn track(&self) -> &TrackRef {
        &self.track
    }

    /// Whether any backend claims the track's file name.
    pub fn is_supported(&self) -> bool {
        self.registry.is_file_name_supported(self.track.file_name())
    }

    /// Opens the track with the first backend that accepts it.
    ///
    /// # Errors
    ///
    /// - [`OpenError::UnsupportedFormat`] when no backend claims the suffix
    /// - [`OpenError::Io`] when the file cannot be opened
    /// - [`OpenError::NoMatchingBackend`] when every candidate declined
    pub fn try_open_audio_source(&self) -> Result<Box<dyn AudioSource>, OpenError> {
        let file_name = self.track.file_name();
        let candidates = self.registry.resolve_backends(&file_name);
        if candidates.is_empty() {
            return Err(OpenError::UnsupportedFormat { file_name });
        }

        let path = self.track.path();
        let io_error = |err: io::Error| OpenError::Io {
            path: path.to_owned(),
            source: Arc::new(err),
        };
        let file = File::open(path).map_err(io_error)?;
        let settings = self.effective_settings(&file);

        let mut attempts = Vec::with_capacity(candidates.len());
        for backend in candidates {
            let mut data = file.try_clone().map_err(io_error)?;
            data.rewind().map_err(io_error)?;

            match backend.open(data, &settings) {
                Ok(source) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        %backend,
                        %file_name,
                        channels = source.channel_count().get(),
                        sample_rate = source.sampling_rate().get(),
                        frame_count = source.frame_count(),
                        "opened audio source"
                    );
                    return Ok(source);
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%backend, %file_name, "backend declined: {err}");
                    attempts.push((backend, err));
                }
            }
        }

        Err(OpenError::NoMatchingBackend {
            file_name,
            attempts,
        })
    }

    /// Opens the track, or returns `None` when it cannot be decoded.
    ///
    /// The reason is logged. Use [`try_open_audio_source`](Self::try_open_audio_source)
    /// to inspect it.
    pub fn open_audio_source(&self) -> Option<Box<dyn AudioSource>> {
        match self.try_open_audio_source() {
            Ok(source) => Some(source),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %self.track.path().display(), "cannot open audio source: {_err}");
                None
            }
        }
    }

    /// Reads the track's tags and stream properties.
    pub fn parse_track_metadata(&self) -> Result<TrackMetadata, MetadataError> {
        self.check_supported()?;
        metadata::read_track_metadata(self.track.path())
    }

    /// Reads the track's embedded front cover, falling back to any picture.
    pub fn parse_cover_art(&self) -> Result<Option<CoverArt>, MetadataError> {
        self.check_supported()?;
        metadata::read_cover_art(self.track.path())
    }

    fn check_supported(&self) -> Result<(), MetadataError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(MetadataError::UnsupportedFormat {
                file_name: self.track.file_name(),
            })
        }
    }

    /// Settings with the hint and byte length filled in from the track.
    fn effective_settings(&self, file: &File) -> Settings {
        let mut settings = self.settings.clone();
        if settings.hint.is_none() {
            let suffix = self.track.suffix();
            let extension = suffix.trim_start_matches('.');
            if !extension.is_empty() {
                settings.hint = Some(extension.to_owned());
            }
        }
        if settings.byte_len.is_none() {
            settings.byte_len = file.metadata().ok().map(|metadata| metadata.len());
        }
        settings
    }
}
