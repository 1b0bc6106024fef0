#![allow(dead_code)]
/// in separate folder so its not ran as integration test
///
/// WAV and tagged MP3 fixtures are generated on the fly into a temporary
/// directory. Compressed fixtures live in `assets/`.
use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use soundsource::{AudioSource, Sample, SampleBuffer};
use tempfile::TempDir;

/// Frames read per chunk when comparing continuous and seeking reads.
pub const CHUNK_FRAMES: usize = 10_000;

pub fn tempdir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Path of a committed fixture in `assets/`.
pub fn asset(file_name: &str) -> PathBuf {
    Path::new("assets").join(file_name)
}

/// Deterministic, non-periodic-looking test signal in `[-0.8, 0.8]`.
pub fn signal(frame: u64, channel: u16) -> f64 {
    let phase = (frame * 7 + channel as u64 * 131 + (frame / 97) * 3) % 1000;
    (phase as f64 / 500.0 - 1.0) * 0.8
}

#[derive(Debug, Clone, Copy)]
pub struct WavFixture {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
    pub frames: u64,
}

impl WavFixture {
    pub fn int(bits_per_sample: u16, channels: u16, frames: u64) -> Self {
        WavFixture {
            channels,
            sample_rate: 44100,
            bits_per_sample,
            sample_format: SampleFormat::Int,
            frames,
        }
    }

    pub fn float(channels: u16, frames: u64) -> Self {
        WavFixture {
            channels,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
            frames,
        }
    }

    pub fn write(&self, path: &Path) {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: self.sample_format,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let scale = ((1i64 << (self.bits_per_sample - 1)) - 1) as f64;
        for frame in 0..self.frames {
            for channel in 0..self.channels {
                let value = signal(frame, channel);
                match self.sample_format {
                    SampleFormat::Float => writer.write_sample(value as f32).unwrap(),
                    SampleFormat::Int => writer.write_sample((value * scale) as i32).unwrap(),
                }
            }
        }
        writer.finalize().unwrap();
    }

    /// Writes the fixture into `dir` under `file_name` and returns its path.
    pub fn write_into(&self, dir: &TempDir, file_name: &str) -> PathBuf {
        let path = dir.path().join(file_name);
        self.write(&path);
        path
    }
}

/// Builds an ID3v2.3 tag holding the given text frames.
pub fn id3v23_tag(frames: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, text) in frames {
        assert_eq!(id.len(), 4);
        let size = text.len() as u32 + 1;
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&size.to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        // ISO-8859-1
        body.push(0);
        body.extend_from_slice(text.as_bytes());
    }

    let size = body.len() as u32;
    let mut tag = b"ID3\x03\x00\x00".to_vec();
    // syncsafe: 7 bits per byte
    for shift in [21, 14, 7, 0] {
        tag.push(((size >> shift) & 0x7f) as u8);
    }
    tag.extend_from_slice(&body);
    tag
}

/// A few silent MPEG-1 Layer III frames (128 kbit/s, 44.1 kHz, no padding).
pub fn mpeg_frames(count: usize) -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(count * FRAME_LEN);
    for _ in 0..count {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xff, 0xfb, 0x90, 0x00]);
        data.extend_from_slice(&frame);
    }
    data
}

/// Writes an MP3 file consisting of an ID3v2.3 tag and silent frames.
pub fn write_tagged_mp3(dir: &TempDir, file_name: &str, frames: &[(&str, &str)]) -> PathBuf {
    let path = dir.path().join(file_name);
    let mut data = id3v23_tag(frames);
    data.extend_from_slice(&mpeg_frames(8));
    fs::write(&path, data).unwrap();
    path
}

/// Writes bytes that no decoder recognizes.
pub fn write_garbage(dir: &TempDir, file_name: &str) -> PathBuf {
    let path = dir.path().join(file_name);
    fs::write(&path, b"this is not an audio file. ".repeat(200)).unwrap();
    path
}

/// Reads everything from the cursor to the end of `source`, chunk by chunk.
pub fn read_to_end(source: &mut dyn AudioSource) -> Vec<Sample> {
    let mut buffer = SampleBuffer::with_frames(source.channel_count(), CHUNK_FRAMES);
    let mut samples = Vec::new();
    loop {
        let frames = source.read_sample_frames(CHUNK_FRAMES, &mut buffer);
        if frames == 0 {
            break;
        }
        samples.extend_from_slice(&buffer[..source.frames2samples(frames)]);
    }
    samples
}

/// Largest absolute difference between two equally long sample runs.
pub fn max_abs_diff(a: &[Sample], b: &[Sample]) -> Sample {
    assert_eq!(a.len(), b.len(), "sample runs differ in length");
    a.iter()
        .zip(b)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, Sample::max)
}
