//! Which backend decodes which file.
//!
//! Every compiled-in [`Backend`] claims a list of file-name suffixes. The
//! [`FormatRegistry`] keeps the backends in priority order: the dedicated
//! single-format decoders come first and symphonia, which handles most
//! containers, acts as the general fallback.
//!
//! Matching is a pure string check on the file name. Nothing is opened or read.
//!
//! ```
//! use soundsource::registry::FormatRegistry;
//!
//! let registry = FormatRegistry::global();
//! assert!(!registry.is_file_name_supported("notes.txt"));
//! assert!(registry.resolve_backends("notes.txt").is_empty());
//! ```

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::sync::LazyLock;

use crate::decoder::{DecoderError, Settings};
use crate::source::AudioSource;

/// A decoding backend compiled into this build.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// WAV through `hound`.
    #[cfg(feature = "hound")]
    Hound,
    /// FLAC through `claxon`.
    #[cfg(feature = "claxon")]
    Claxon,
    /// Ogg Vorbis through `lewton`.
    #[cfg(feature = "lewton")]
    Lewton,
    /// MP3 through `minimp3`.
    #[cfg(feature = "minimp3")]
    Minimp3,
    /// Every format enabled in `symphonia`.
    #[cfg(feature = "symphonia")]
    Symphonia,
}

#[cfg(feature = "symphonia")]
const SYMPHONIA_SUFFIXES: &[&str] = &[
    #[cfg(feature = "symphonia-aiff")]
    ".aif",
    #[cfg(feature = "symphonia-aiff")]
    ".aiff",
    #[cfg(feature = "symphonia-flac")]
    ".flac",
    #[cfg(feature = "symphonia-isomp4")]
    ".m4a",
    #[cfg(feature = "symphonia-isomp4")]
    ".mp4",
    #[cfg(feature = "symphonia-mp3")]
    ".mp3",
    #[cfg(feature = "symphonia-ogg")]
    ".ogg",
    #[cfg(feature = "symphonia-libopus")]
    ".opus",
    #[cfg(feature = "symphonia-wav")]
    ".wav",
];

impl Backend {
    /// All compiled-in backends, highest priority first.
    pub const ALL: &'static [Backend] = &[
        #[cfg(feature = "hound")]
        Backend::Hound,
        #[cfg(feature = "claxon")]
        Backend::Claxon,
        #[cfg(feature = "lewton")]
        Backend::Lewton,
        #[cfg(feature = "minimp3")]
        Backend::Minimp3,
        #[cfg(feature = "symphonia")]
        Backend::Symphonia,
    ];

    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "hound")]
            Backend::Hound => "hound",
            #[cfg(feature = "claxon")]
            Backend::Claxon => "claxon",
            #[cfg(feature = "lewton")]
            Backend::Lewton => "lewton",
            #[cfg(feature = "minimp3")]
            Backend::Minimp3 => "minimp3",
            #[cfg(feature = "symphonia")]
            Backend::Symphonia => "symphonia",
        }
    }

    /// Lower-case file-name suffixes, dot included, that this backend claims.
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "hound")]
            Backend::Hound => &[".wav"],
            #[cfg(feature = "claxon")]
            Backend::Claxon => &[".flac"],
            #[cfg(feature = "lewton")]
            Backend::Lewton => &[".ogg"],
            #[cfg(feature = "minimp3")]
            Backend::Minimp3 => &[".mp3"],
            #[cfg(feature = "symphonia")]
            Backend::Symphonia => SYMPHONIA_SUFFIXES,
        }
    }

    /// Whether `file_name` ends with one of this backend's suffixes, ignoring ASCII case.
    pub fn claims(self, file_name: &str) -> bool {
        let file_name = file_name.to_ascii_lowercase();
        self.suffixes()
            .iter()
            .any(|suffix| file_name.ends_with(suffix))
    }

    /// Opens `file` with this backend.
    ///
    /// Streams without channels, without a sample rate or without any frames
    /// are rejected.
    pub fn open(
        self,
        file: File,
        settings: &Settings,
    ) -> Result<Box<dyn AudioSource>, DecoderError> {
        let data = BufReader::new(file);
        let source: Box<dyn AudioSource> = match self {
            #[cfg(feature = "hound")]
            Backend::Hound => Box::new(crate::decoder::wav::WavDecoder::new(data, settings)?),
            #[cfg(feature = "claxon")]
            Backend::Claxon => Box::new(crate::decoder::flac::FlacDecoder::new(data, settings)?),
            #[cfg(feature = "lewton")]
            Backend::Lewton => {
                Box::new(crate::decoder::vorbis::VorbisDecoder::new(data, settings)?)
            }
            #[cfg(feature = "minimp3")]
            Backend::Minimp3 => Box::new(crate::decoder::mp3::Mp3Decoder::new(data, settings)?),
            #[cfg(feature = "symphonia")]
            Backend::Symphonia => Box::new(crate::decoder::symphonia::SymphoniaDecoder::new(
                data, settings,
            )?),
        };
        if source.frame_count() == 0 {
            return Err(DecoderError::InvalidSpec("stream has no frames"));
        }
        Ok(source)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered set of backends consulted when opening a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRegistry {
    backends: Vec<Backend>,
}

static GLOBAL_REGISTRY: LazyLock<FormatRegistry> = LazyLock::new(FormatRegistry::default);

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry::with_backends(Backend::ALL.iter().copied())
    }
}

impl FormatRegistry {
    /// A registry consulting exactly `backends`, in the given order.
    pub fn with_backends(backends: impl IntoIterator<Item = Backend>) -> Self {
        let mut unique = Vec::new();
        for backend in backends {
            if !unique.contains(&backend) {
                unique.push(backend);
            }
        }
        FormatRegistry { backends: unique }
    }

    /// The process-wide registry with every compiled-in backend.
    pub fn global() -> &'static FormatRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Whether any backend claims `file_name`. Accepts a bare suffix like `.mp3`
    /// as well as a file name or path.
    pub fn is_file_name_supported(&self, file_name: impl AsRef<str>) -> bool {
        let file_name = file_name.as_ref();
        self.backends.iter().any(|backend| backend.claims(file_name))
    }

    /// Backends claiming `file_name`, highest priority first. Empty when the
    /// suffix is unknown.
    pub fn resolve_backends(&self, file_name: impl AsRef<str>) -> Vec<Backend> {
        let file_name = file_name.as_ref();
        self.backends
            .iter()
            .copied()
            .filter(|backend| backend.claims(file_name))
            .collect()
    }

    /// Every registered suffix, sorted and without duplicates.
    pub fn supported_suffixes(&self) -> Vec<&'static str> {
        let mut suffixes: Vec<_> = self
            .backends
            .iter()
            .flat_map(|backend| backend.suffixes().iter().copied())
            .collect();
        suffixes.sort_unstable();
        suffixes.dedup();
        suffixes
    }

    /// Glob patterns such as `*.flac` for file dialogs.
    pub fn supported_file_name_patterns(&self) -> Vec<String> {
        self.supported_suffixes()
            .into_iter()
            .map(|suffix| format!("*{suffix}"))
            .collect()
    }

    /// Each supported suffix with the backends that claim it, in priority order.
    pub fn capabilities(&self) -> Vec<(&'static str, Vec<Backend>)> {
        self.supported_suffixes()
            .into_iter()
            .map(|suffix| (suffix, self.resolve_backends(suffix)))
            .collect()
    }
}

/// Whether the global registry supports `file_name`.
pub fn is_file_name_supported(file_name: impl AsRef<str>) -> bool {
    FormatRegistry::global().is_file_name_supported(file_name)
}
