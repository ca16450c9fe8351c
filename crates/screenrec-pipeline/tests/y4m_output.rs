//! Integration tests for the YUV4MPEG2 file backend.

use std::fs;

use screenrec_capture::SyntheticSource;
use screenrec_pipeline::testing::init_test_tracing;
use screenrec_pipeline::{codes, BufferingMode, FrameRate, Recorder, RecorderConfig, SinkTarget, Y4mBackend};
use screenrec_transform::OutputFormat;

fn config(format: OutputFormat) -> RecorderConfig {
    RecorderConfig::builder()
        .frame_rate(FrameRate::Capped(15))
        .buffering(BufferingMode::Single)
        .output_format(format)
        .build()
}

#[test]
fn writes_playable_file() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.y4m");
    let backend = Y4mBackend::create(&path).unwrap();
    let mut recorder = Recorder::setup(
        config(OutputFormat::Yuv420Planar),
        SyntheticSource::new(48, 32),
        SinkTarget::encoder(backend),
        None,
    )
    .unwrap();

    for _ in 0..5 {
        assert!(recorder.step());
    }
    let outcome = recorder.finish();
    assert!(outcome.is_clean());

    let bytes = fs::read(&path).unwrap();
    let header_end = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
    let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
    assert!(header.starts_with("YUV4MPEG2 W48 H32 F15:1 "), "header: {}", header);

    // governor ticks land in consecutive frame slots, nothing is repeated
    let frame_len = b"FRAME\n".len() + 48 * 32 + 2 * 24 * 16;
    assert_eq!(bytes.len() - header_end, 5 * frame_len);
    assert!(bytes[header_end..].starts_with(b"FRAME\n"));
}

#[test]
fn uncapped_capture_keeps_wall_clock_pace() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uncapped.y4m");
    let config = RecorderConfig::builder()
        .frame_rate(FrameRate::Uncapped)
        .buffering(BufferingMode::Single)
        .build();
    let started = std::time::Instant::now();
    let mut recorder = Recorder::setup(
        config,
        SyntheticSource::new(16, 16),
        SinkTarget::encoder(Y4mBackend::create(&path).unwrap()),
        None,
    )
    .unwrap();

    for _ in 0..50 {
        assert!(recorder.step());
    }
    let wall = started.elapsed();
    let outcome = recorder.finish();
    assert!(outcome.is_clean());

    let bytes = fs::read(&path).unwrap();
    let header_end = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
    let frame_len = b"FRAME\n".len() + 16 * 16 + 2 * 8 * 8;
    let frames = (bytes.len() - header_end) / frame_len;

    // one 15 fps slot per written frame, never more slots than wall time covers
    let slots = (wall.as_secs_f64() * 15.0).round() as usize + 1;
    assert!(frames >= 1);
    assert!(frames <= slots, "{} frames for {:?} of capture", frames, wall);
}

#[test]
fn portrait_source_is_rotated_to_landscape() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portrait.y4m");
    let config = RecorderConfig::builder()
        .frame_rate(FrameRate::Uncapped)
        .buffering(BufferingMode::Single)
        .allow_vertical_frames(false)
        .build();
    let mut recorder = Recorder::setup(
        config,
        SyntheticSource::new(32, 48),
        SinkTarget::encoder(Y4mBackend::create(&path).unwrap()),
        None,
    )
    .unwrap();
    assert!(recorder.geometry().rotate_view());

    recorder.step();
    recorder.finish();

    let bytes = fs::read(&path).unwrap();
    let header = String::from_utf8_lossy(&bytes[..64]);
    assert!(header.starts_with("YUV4MPEG2 W48 H32 "), "header: {}", header);
    assert!(header.contains("XROTATION=90"));
}

#[test]
fn packed_output_rejected() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let backend = Y4mBackend::create(dir.path().join("rgba.y4m")).unwrap();
    let err = Recorder::setup(
        config(OutputFormat::Rgba),
        SyntheticSource::new(16, 16),
        SinkTarget::encoder(backend),
        None,
    )
    .err()
    .unwrap();

    assert_eq!(err.code(), codes::VIDEO_STREAM);
}

#[test]
fn unwritable_path_is_output_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = Y4mBackend::create(dir.path().join("missing").join("out.y4m")).err().unwrap();
    assert_eq!(err.code(), codes::OUTPUT_OPEN);
}
