//! Tag and stream property extraction.
//!
//! `lofty` parses the container and every tag block in it. The values are
//! then resolved into a single [`TrackMetadata`] record:
//!
//! - the primary tag of the format is consulted first (ID3v2 for MP3, WAV and
//!   AIFF, Vorbis comments for FLAC and Ogg, ilst for MP4), then the remaining
//!   tags in file order
//! - within a tag, each field has an ordered list of item keys and the first
//!   non-empty value wins
//!
//! So the original album title (`TOAL`) only fills the album when no album
//! title (`TALB`) exists anywhere, and the album artist (`TPE2`) never
//! replaces the track artist.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lofty::config::ParseOptions;
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};

use crate::common::assert_error_traits;

/// Normalized tags and stream properties of one file.
///
/// Text fields are empty when the file does not provide them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub album_artist: String,
    pub genre: String,
    pub comment: String,
    pub composer: String,
    pub grouping: String,
    /// Release or recording date as written in the tag, e.g. `2004` or `2004-05-17`.
    pub year: String,
    /// Musical key, e.g. `Am`.
    pub key: String,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub bpm: Option<f64>,
    /// Track gain in dB.
    pub replay_gain_db: Option<f64>,
    pub channels: Option<u8>,
    pub sample_rate: Option<u32>,
    pub bitrate_kbps: Option<u32>,
    pub duration: Option<Duration>,
}

/// An embedded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// MIME type of `data`, when the tag declares a known one.
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Error that can happen when reading tags.
#[derive(Debug, thiserror::Error, Clone)]
pub enum MetadataError {
    /// No backend claims the file-name suffix.
    #[error("Unsupported file type: {file_name}")]
    UnsupportedFormat { file_name: String },
    /// The file could not be opened or read.
    #[error("Could not read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    /// The container structure could not be parsed.
    #[error("Could not parse {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}
assert_error_traits!(MetadataError);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Artist,
    Title,
    Album,
    AlbumArtist,
    Genre,
    Comment,
    Composer,
    Grouping,
    Year,
    Key,
}

/// Item keys consulted for each text field, in order.
static TEXT_FIELD_PRECEDENCE: &[(TextField, &[ItemKey])] = &[
    (
        TextField::Artist,
        &[ItemKey::TrackArtist, ItemKey::OriginalArtist],
    ),
    (TextField::Title, &[ItemKey::TrackTitle]),
    (
        TextField::Album,
        &[ItemKey::AlbumTitle, ItemKey::OriginalAlbumTitle],
    ),
    (TextField::AlbumArtist, &[ItemKey::AlbumArtist]),
    (TextField::Genre, &[ItemKey::Genre]),
    (TextField::Comment, &[ItemKey::Comment]),
    (TextField::Composer, &[ItemKey::Composer]),
    (TextField::Grouping, &[ItemKey::ContentGroup]),
    (
        TextField::Year,
        &[
            ItemKey::RecordingDate,
            ItemKey::ReleaseDate,
            ItemKey::OriginalReleaseDate,
        ],
    ),
    (TextField::Key, &[ItemKey::InitialKey]),
];

impl TrackMetadata {
    fn text_mut(&mut self, field: TextField) -> &mut String {
        match field {
            TextField::Artist => &mut self.artist,
            TextField::Title => &mut self.title,
            TextField::Album => &mut self.album,
            TextField::AlbumArtist => &mut self.album_artist,
            TextField::Genre => &mut self.genre,
            TextField::Comment => &mut self.comment,
            TextField::Composer => &mut self.composer,
            TextField::Grouping => &mut self.grouping,
            TextField::Year => &mut self.year,
            TextField::Key => &mut self.key,
        }
    }

    /// Resolves fields from `tags`, which are in precedence order.
    fn from_tags(tags: &[&Tag]) -> TrackMetadata {
        let mut metadata = TrackMetadata::default();
        for (field, keys) in TEXT_FIELD_PRECEDENCE {
            if let Some(value) = resolve_text(tags, keys) {
                *metadata.text_mut(*field) = value;
            }
        }

        metadata.track_number = tags.iter().find_map(|tag| tag.track());
        metadata.track_total = tags.iter().find_map(|tag| tag.track_total());
        metadata.bpm = resolve_number(tags, &[ItemKey::Bpm, ItemKey::IntegerBpm], parse_bpm);
        metadata.replay_gain_db =
            resolve_number(tags, &[ItemKey::ReplayGainTrackGain], parse_replay_gain);
        metadata
    }
}

fn resolve_text(tags: &[&Tag], keys: &[ItemKey]) -> Option<String> {
    tags.iter().find_map(|tag| {
        keys.iter().find_map(|key| {
            tag.get_string(key)
                .map(normalize_text)
                .filter(|value| !value.is_empty())
        })
    })
}

/// First value under `keys` that parses. Values that fail to parse are logged
/// and skipped.
fn resolve_number(
    tags: &[&Tag],
    keys: &[ItemKey],
    parse: fn(&str) -> Option<f64>,
) -> Option<f64> {
    tags.iter().find_map(|tag| {
        keys.iter().find_map(|key| {
            let raw = normalize_text(tag.get_string(key)?);
            if raw.is_empty() {
                return None;
            }
            let parsed = parse(&raw);
            #[cfg(feature = "tracing")]
            if parsed.is_none() {
                tracing::warn!(?key, value = %raw, "ignoring malformed numeric tag");
            }
            parsed
        })
    })
}

fn parse_bpm(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
}

fn parse_replay_gain(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let number = raw
        .strip_suffix("dB")
        .or_else(|| raw.strip_suffix("db"))
        .or_else(|| raw.strip_suffix("DB"))
        .unwrap_or(raw)
        .trim();
    number.parse::<f64>().ok().filter(|gain| gain.is_finite())
}

/// Trims surrounding whitespace and drops control characters such as the
/// NUL terminators some tag writers leave behind.
fn normalize_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_owned()
}

fn read_tagged_file(path: &Path) -> Result<TaggedFile, MetadataError> {
    // Open separately so that a missing or unreadable file is an I/O error
    // rather than a parse error.
    File::open(path).map_err(|err| MetadataError::Io {
        path: path.to_owned(),
        source: Arc::new(err),
    })?;

    let probe = Probe::open(path)
        .map_err(|err| classify(path, err))?
        .options(ParseOptions::new())
        .guess_file_type()
        .map_err(|err| MetadataError::Io {
            path: path.to_owned(),
            source: Arc::new(err),
        })?;
    probe.read().map_err(|err| classify(path, err))
}

fn classify(path: &Path, err: LoftyError) -> MetadataError {
    match err.kind() {
        ErrorKind::Io(io_err) => MetadataError::Io {
            path: path.to_owned(),
            source: Arc::new(io::Error::new(io_err.kind(), io_err.to_string())),
        },
        _ => MetadataError::Unreadable {
            path: path.to_owned(),
            reason: err.to_string(),
        },
    }
}

/// Tags of `file`, primary tag first, then the rest in file order.
fn tags_in_precedence_order(file: &TaggedFile) -> Vec<&Tag> {
    let primary_type = file.primary_tag_type();
    file.primary_tag()
        .into_iter()
        .chain(
            file.tags()
                .iter()
                .filter(|tag| tag.tag_type() != primary_type),
        )
        .collect()
}

/// Reads tags and stream properties of the file at `path`.
///
/// A file without any tags yields empty text fields, not an error.
pub(crate) fn read_track_metadata(path: &Path) -> Result<TrackMetadata, MetadataError> {
    let file = read_tagged_file(path)?;
    let tags = tags_in_precedence_order(&file);

    #[cfg(feature = "tracing")]
    if tags.is_empty() {
        tracing::info!(path = %path.display(), "no tags found");
    }

    let mut metadata = TrackMetadata::from_tags(&tags);

    let properties = file.properties();
    metadata.channels = properties.channels();
    metadata.sample_rate = properties.sample_rate();
    metadata.bitrate_kbps = properties.audio_bitrate();
    metadata.duration = Some(properties.duration()).filter(|d| !d.is_zero());
    Ok(metadata)
}

/// Returns the front cover of the file at `path`, or any other embedded
/// picture when there is no front cover.
pub(crate) fn read_cover_art(path: &Path) -> Result<Option<CoverArt>, MetadataError> {
    let file = read_tagged_file(path)?;
    let tags = tags_in_precedence_order(&file);
    let pictures = || tags.iter().flat_map(|tag| tag.pictures());

    let picture = pictures()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures().next());

    Ok(picture
        .filter(|picture| !picture.data().is_empty())
        .map(|picture| CoverArt {
            mime_type: picture.mime_type().and_then(mime_type_str).map(str::to_owned),
            data: picture.data().to_vec(),
        }))
}

fn mime_type_str(mime_type: &MimeType) -> Option<&'static str> {
    match mime_type {
        MimeType::Png => Some("image/png"),
        MimeType::Jpeg => Some("image/jpeg"),
        MimeType::Tiff => Some("image/tiff"),
        MimeType::Bmp => Some("image/bmp"),
        MimeType::Gif => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;

    fn id3_tag(items: &[(ItemKey, &str)]) -> Tag {
        let mut tag = Tag::new(TagType::Id3v2);
        for (key, value) in items {
            assert!(
                tag.insert_text(key.clone(), (*value).to_owned()),
                "{key:?} not representable in ID3v2"
            );
        }
        tag
    }

    #[test]
    fn artist_prefers_track_artist() {
        let tag = id3_tag(&[
            (ItemKey::OriginalArtist, "Original"),
            (ItemKey::TrackArtist, "Performer"),
        ]);
        assert_eq!(TrackMetadata::from_tags(&[&tag]).artist, "Performer");
    }

    #[test]
    fn artist_falls_back_to_original_artist() {
        let tag = id3_tag(&[(ItemKey::OriginalArtist, "Original")]);
        assert_eq!(TrackMetadata::from_tags(&[&tag]).artist, "Original");
    }

    #[test]
    fn album_falls_back_to_original_album() {
        let tag = id3_tag(&[(ItemKey::OriginalAlbumTitle, "First Pressing")]);
        let metadata = TrackMetadata::from_tags(&[&tag]);
        assert_eq!(metadata.album, "First Pressing");
        assert_eq!(metadata.album_artist, "");
    }

    #[test]
    fn album_artist_never_feeds_artist() {
        let tag = id3_tag(&[(ItemKey::AlbumArtist, "Band")]);
        let metadata = TrackMetadata::from_tags(&[&tag]);
        assert_eq!(metadata.album_artist, "Band");
        assert_eq!(metadata.artist, "");
    }

    #[test]
    fn remaining_text_fields() {
        let tag = id3_tag(&[
            (ItemKey::TrackTitle, "Title"),
            (ItemKey::Genre, "Techno"),
            (ItemKey::Composer, "Composer"),
            (ItemKey::ContentGroup, "Group"),
            (ItemKey::RecordingDate, "2004"),
            (ItemKey::InitialKey, "Am"),
        ]);
        let metadata = TrackMetadata::from_tags(&[&tag]);
        assert_eq!(metadata.title, "Title");
        assert_eq!(metadata.genre, "Techno");
        assert_eq!(metadata.composer, "Composer");
        assert_eq!(metadata.grouping, "Group");
        assert_eq!(metadata.year, "2004");
        assert_eq!(metadata.key, "Am");
    }

    #[test]
    fn earlier_tags_win() {
        let primary = id3_tag(&[(ItemKey::TrackTitle, "Primary")]);
        let secondary = id3_tag(&[
            (ItemKey::TrackTitle, "Secondary"),
            (ItemKey::Genre, "From Secondary"),
        ]);
        let metadata = TrackMetadata::from_tags(&[&primary, &secondary]);
        assert_eq!(metadata.title, "Primary");
        assert_eq!(metadata.genre, "From Secondary");
    }

    #[test]
    fn blank_values_count_as_absent() {
        let tag = id3_tag(&[
            (ItemKey::TrackArtist, "  \u{0} "),
            (ItemKey::OriginalArtist, " Fallback\u{0}"),
        ]);
        assert_eq!(TrackMetadata::from_tags(&[&tag]).artist, "Fallback");
    }

    #[test]
    fn no_tags_give_empty_record() {
        assert_eq!(TrackMetadata::from_tags(&[]), TrackMetadata::default());
    }

    #[test]
    fn numeric_parsing() {
        assert_eq!(parse_bpm("128"), Some(128.0));
        assert_eq!(parse_bpm("127.5"), Some(127.5));
        assert_eq!(parse_bpm("fast"), None);
        assert_eq!(parse_bpm("-3"), None);
        assert_eq!(parse_replay_gain("-6.48 dB"), Some(-6.48));
        assert_eq!(parse_replay_gain("+1.2"), Some(1.2));
        assert_eq!(parse_replay_gain("loud"), None);
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_text("  Test Artist\u{0}"), "Test Artist");
        assert_eq!(normalize_text("\t\n"), "");
        assert_eq!(normalize_text("A  B"), "A  B");
    }
}
