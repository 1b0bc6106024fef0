//! Decoder configuration.
//!
//! [`Settings`] are passed to every backend when a file is opened. Support for
//! the individual settings depends on the backend; most only matter to the
//! symphonia backend, which probes containers and can seek through them.
//!
//! # Example
//!
//! ```no_run
//! use soundsource::{Settings, SoundSourceProxy, TrackRef};
//!
//! let settings = Settings::default().with_hint("m4a").with_gapless(false);
//! let proxy = SoundSourceProxy::with_settings(TrackRef::new("music/track.m4a"), settings);
//! let source = proxy.open_audio_source();
//! ```

/// Audio decoder configuration settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The length of the stream in bytes.
    ///
    /// Used by the demuxers for seeking and for duration estimates in formats
    /// without timing information. The proxy fills it from file metadata.
    pub(crate) byte_len: Option<u64>,

    /// Whether seeks may stop at the start of the containing block instead
    /// of refining to the exact frame.
    pub(crate) coarse_seek: bool,

    /// Whether to trim encoder delay and padding frames.
    ///
    /// Trimming shifts decoded frames away from container timestamps, so
    /// exact seeking expects this to stay disabled.
    pub(crate) gapless: bool,

    /// An extension hint for the decoder about the format of the stream.
    pub(crate) hint: Option<String>,

    /// A MIME type hint for the decoder about the format of the stream.
    pub(crate) mime_type: Option<String>,

    /// Whether the stream supports random access.
    pub(crate) is_seekable: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            byte_len: None,
            coarse_seek: false,
            gapless: false,
            hint: None,
            mime_type: None,
            is_seekable: true,
        }
    }
}

impl Settings {
    /// Sets the byte length of the stream.
    pub fn with_byte_len(mut self, byte_len: u64) -> Self {
        self.byte_len = Some(byte_len);
        self
    }

    /// Enables or disables coarse seeking. This is disabled by default.
    ///
    /// Coarse seeking is faster but a seek may land before the requested frame.
    /// Sources opened this way report [`SeekGranularity::Block`](crate::SeekGranularity::Block).
    pub fn with_coarse_seek(mut self, coarse_seek: bool) -> Self {
        self.coarse_seek = coarse_seek;
        self
    }

    /// Enables or disables gapless trimming. This is disabled by default.
    pub fn with_gapless(mut self, gapless: bool) -> Self {
        self.gapless = gapless;
        self
    }

    /// Sets a format hint for the decoder.
    ///
    /// Common values are "mp3", "wav", "flac", "ogg", etc. The proxy uses the
    /// file suffix when no hint is set.
    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    /// Sets a MIME type hint for the decoder.
    ///
    /// Common values are "audio/mpeg", "audio/vnd.wav", "audio/flac", "audio/ogg", etc.
    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    /// Configure whether the data supports random access seeking. Without this,
    /// backends that need to rewind for a backward seek report an error.
    pub fn with_seekable(mut self, is_seekable: bool) -> Self {
        self.is_seekable = is_seekable;
        self
    }

    /// The extension hint, if any.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }

    pub fn is_gapless(&self) -> bool {
        self.gapless
    }

    pub fn is_coarse_seek(&self) -> bool {
        self.coarse_seek
    }
}
