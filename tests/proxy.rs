use std::io;

use approx::assert_abs_diff_eq;
use soundsource::{OpenError, SoundSourceProxy, TrackRef};

mod test_support;
use test_support::{read_to_end, signal, tempdir, write_garbage, WavFixture};

#[test]
fn opens_wav() {
    let dir = tempdir();
    let path = WavFixture::int(16, 2, 4_410).write_into(&dir, "tone.wav");
    let proxy = SoundSourceProxy::new(&*path);
    assert!(proxy.is_supported());

    let mut source = proxy.open_audio_source().unwrap();
    assert_eq!(source.channel_count().get(), 2);
    assert_eq!(source.sampling_rate().get(), 44100);
    assert_eq!(source.frame_count(), 4_410);

    let samples = read_to_end(source.as_mut());
    assert_eq!(samples.len(), 2 * 4_410);
    // 16 bit quantization
    for (i, sample) in samples.iter().enumerate().take(200) {
        let expected = signal(i as u64 / 2, (i % 2) as u16);
        assert_abs_diff_eq!(*sample as f64, expected, epsilon = 1e-3);
    }
}

#[test]
fn independent_handles_agree() {
    let dir = tempdir();
    let path = WavFixture::float(1, 9_000).write_into(&dir, "mono.wav");
    let proxy = SoundSourceProxy::new(TrackRef::new(&path));

    let mut first = proxy.open_audio_source().unwrap();
    let mut second = proxy.open_audio_source().unwrap();
    assert_eq!(first.channel_count(), second.channel_count());
    assert_eq!(first.frame_count(), second.frame_count());

    second.seek_sample_frame(4_500).unwrap();
    assert_eq!(first.frame_index(), 0);
    assert_eq!(read_to_end(first.as_mut()).len(), 9_000);
    assert_eq!(read_to_end(second.as_mut()).len(), 4_500);
}

#[test]
fn unknown_suffix_is_rejected_without_touching_the_file() {
    let dir = tempdir();
    // does not exist, so any open attempt would fail with an I/O error
    let path = dir.path().join("notes.txt");
    let proxy = SoundSourceProxy::new(&*path);
    assert!(!proxy.is_supported());

    match proxy.try_open_audio_source() {
        Err(OpenError::UnsupportedFormat { file_name }) => assert_eq!(file_name, "notes.txt"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(proxy.open_audio_source().is_none());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir();
    let path = dir.path().join("missing.wav");
    let proxy = SoundSourceProxy::new(&*path);
    assert!(proxy.is_supported());

    match proxy.try_open_audio_source() {
        Err(OpenError::Io { source, .. }) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(proxy.open_audio_source().is_none());
}

#[test]
fn undecodable_file_yields_no_source() {
    let dir = tempdir();
    let path = write_garbage(&dir, "broken.wav");
    let proxy = SoundSourceProxy::new(&*path);

    assert!(proxy.open_audio_source().is_none());
    match proxy.try_open_audio_source() {
        Err(OpenError::NoMatchingBackend { attempts, .. }) => {
            let registry = soundsource::FormatRegistry::global();
            let tried: Vec<_> = attempts.iter().map(|(backend, _)| *backend).collect();
            assert_eq!(tried, registry.resolve_backends("broken.wav"));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[cfg(feature = "symphonia-isomp4")]
#[test]
fn garbage_m4a_is_declined() {
    let dir = tempdir();
    let path = write_garbage(&dir, "cover-test.m4a");
    assert!(SoundSourceProxy::new(&*path).open_audio_source().is_none());
}

#[test]
fn empty_wav_is_declined() {
    let dir = tempdir();
    let path = WavFixture::int(16, 2, 0).write_into(&dir, "empty.wav");
    assert!(SoundSourceProxy::new(&*path).open_audio_source().is_none());
}

#[cfg(all(feature = "symphonia-flac", feature = "symphonia-wav"))]
#[test]
fn misnamed_file_is_opened_by_content() {
    // symphonia probes the content, so WAV data behind a .flac name still opens
    let dir = tempdir();
    let path = WavFixture::int(16, 1, 3_000).write_into(&dir, "misnamed.flac");
    let source = SoundSourceProxy::new(&*path).open_audio_source().unwrap();
    assert_eq!(source.frame_count(), 3_000);
}
