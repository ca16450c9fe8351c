//! Synthetic Recording Example
//!
//! Records a moving gradient into a YUV4MPEG2 file, stopping from a second
//! thread after a few seconds.
//!
//! # Running
//!
//! ```bash
//! cargo run --example record_synthetic -- out.y4m 5
//! ffplay out.y4m
//! ```

use std::time::Duration;

use screenrec_capture::SyntheticSource;
use screenrec_pipeline::{FrameRate, Recorder, RecorderConfig, SessionOutcome, SinkTarget, Y4mBackend};
use screenrec_transform::OutputFormat;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "synthetic.y4m".to_string());
    let seconds = args.next().and_then(|s| s.parse().ok()).unwrap_or(3);

    println!("screenrec-pipeline v{}", screenrec_pipeline::VERSION);
    println!("Recording {}s to {}", seconds, path);

    let config = RecorderConfig::builder()
        .frame_rate(FrameRate::Capped(30))
        .output_format(OutputFormat::Yuv420Planar)
        .padding(0, 40)
        .max_duration(Duration::from_secs(seconds + 5))
        .build();

    let outcome = match Y4mBackend::create(&path).and_then(|backend| {
        Recorder::setup(config, SyntheticSource::new(640, 360), SinkTarget::encoder(backend), None)
    }) {
        Ok(recorder) => {
            let stop = recorder.stop_handle();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(seconds));
                stop.stop();
            });
            recorder.run()
        }
        Err(e) => {
            eprintln!("Setup failed: {}", e);
            SessionOutcome::failed(&e)
        }
    };

    println!();
    println!("Exit code:       {}", outcome.exit_code);
    println!("Frames rendered: {}", outcome.stats.frames_rendered);
    println!("Frames encoded:  {}", outcome.stats.frames_encoded);
    println!("Frames dropped:  {}", outcome.stats.frames_dropped);
    if let Some(fps) = outcome.fps() {
        println!("Average fps:     {:.1}", fps);
    }

    std::process::exit(outcome.exit_code);
}
