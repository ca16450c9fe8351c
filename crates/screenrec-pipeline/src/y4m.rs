//! YUV4MPEG2 file backend
//!
//! Writes uncompressed planar 4:2:0 frames into a `.y4m` file that any
//! mainstream player or encoder reads. There is no audio track.
//!
//! Y4M has no timestamps, only a constant frame rate. The video stream uses
//! a `1 / fps` time base, so a pts is a frame slot; when the capture loop
//! falls behind, the previous frame is repeated to fill skipped slots and
//! playback keeps wall-clock pace.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use screenrec_transform::{OutputFormat, VideoFrameBuffer};
use tracing::{debug, info, warn};

use crate::backend::{
    AudioStream, AudioStreamParams, EncodePayload, EncoderBackend, Packet, StreamHandle, StreamKind, TimeBase,
    VideoStreamParams,
};
use crate::error::{BackendError, RecorderError, Result};

const FRAME_MARKER: &[u8] = b"FRAME\n";

/// Upper bound of repeated frames per gap
const MAX_REPEAT: i64 = 1000;

/// Encoder backend writing YUV4MPEG2
pub struct Y4mBackend<W: Write + Send = BufWriter<File>> {
    writer: Option<W>,
    params: Option<VideoStreamParams>,
    last_pts: Option<i64>,
    last_frame: Vec<u8>,
    frames_written: u64,
}

impl Y4mBackend {
    /// Create (or truncate) the output file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            RecorderError::OutputOpen(BackendError::OutputOpen(format!("{}: {}", path.display(), e)))
        })?;
        info!("Writing Y4M to {}", path.display());
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write + Send> Y4mBackend<W> {
    /// Write into any byte sink
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: Some(writer),
            params: None,
            last_pts: None,
            last_frame: Vec::new(),
            frames_written: 0,
        }
    }

    fn writer(&mut self) -> std::result::Result<&mut W, BackendError> {
        self.writer
            .as_mut()
            .ok_or_else(|| BackendError::Write("output already closed".to_string()))
    }

    fn write_frame(&mut self, data: &[u8]) -> std::result::Result<(), BackendError> {
        let writer = self.writer()?;
        writer.write_all(FRAME_MARKER)?;
        writer.write_all(data)?;
        self.frames_written += 1;
        Ok(())
    }
}

/// Header line for `params`
fn header(params: &VideoStreamParams) -> String {
    let (num, den) = params.frame_rate;
    format!(
        "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C420jpeg XROTATION={}\n",
        params.width,
        params.height,
        num.max(1),
        den.max(1),
        params.rotation_degrees
    )
}

/// Copy the visible planes of `frame` without row padding
fn pack_planes(frame: &VideoFrameBuffer, out: &mut Vec<u8>) -> std::result::Result<(), BackendError> {
    let chroma = frame
        .chroma_layout()
        .ok_or_else(|| BackendError::encode(format!("{} frame is not YUV", frame.format().name())))?;

    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride() as usize;
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    let data = frame.data();

    out.clear();
    out.reserve(width * height + 2 * chroma_width * chroma_height);

    for row in data.chunks(stride).take(height) {
        out.extend_from_slice(&row[..width]);
    }
    for offset in [chroma.u_offset, chroma.v_offset] {
        for y in 0..chroma_height {
            let start = offset + y * chroma.row_pitch;
            let row = data
                .get(start..start + chroma_width)
                .ok_or_else(|| BackendError::encode("chroma plane out of bounds"))?;
            out.extend_from_slice(row);
        }
    }
    Ok(())
}

impl<W: Write + Send> EncoderBackend for Y4mBackend<W> {
    fn open_video_stream(&mut self, params: &VideoStreamParams) -> std::result::Result<StreamHandle, BackendError> {
        if params.format != OutputFormat::Yuv420Planar {
            return Err(BackendError::stream_setup(format!(
                "y4m stores planar 4:2:0 only, got {}",
                params.format.name()
            )));
        }
        self.params = Some(*params);
        Ok(StreamHandle {
            index: 0,
            kind: StreamKind::Video,
            time_base: TimeBase::new(params.frame_rate.1.max(1), params.frame_rate.0.max(1)),
        })
    }

    fn open_audio_stream(&mut self, params: &AudioStreamParams) -> std::result::Result<Option<AudioStream>, BackendError> {
        debug!("Y4M has no audio track, ignoring {} Hz stream", params.sample_rate);
        Ok(None)
    }

    fn start(&mut self) -> std::result::Result<(), BackendError> {
        let params = self
            .params
            .ok_or_else(|| BackendError::Header("no video stream".to_string()))?;
        let line = header(&params);
        self.writer()?
            .write_all(line.as_bytes())
            .map_err(|e| BackendError::Header(e.to_string()))?;
        debug!("Y4M header: {}", line.trim_end());
        Ok(())
    }

    fn encode(
        &mut self,
        stream: &StreamHandle,
        payload: EncodePayload<'_>,
        pts: i64,
    ) -> std::result::Result<Option<Packet>, BackendError> {
        match payload {
            EncodePayload::Video(frame) => {
                let mut data = Vec::new();
                pack_planes(frame, &mut data)?;
                Ok(Some(Packet {
                    stream: stream.index,
                    pts,
                    data,
                }))
            }
            EncodePayload::Audio(_) => Err(BackendError::encode("y4m has no audio track")),
        }
    }

    fn write_packet(&mut self, packet: Packet) -> std::result::Result<(), BackendError> {
        if let Some(last) = self.last_pts {
            if packet.pts == last {
                debug!("Frame slot {} already written, dropping frame", last);
                return Ok(());
            }
            if packet.pts < last {
                warn!("Dropping out-of-order frame (pts {} after {})", packet.pts, last);
                return Ok(());
            }
            let missing = (packet.pts - last - 1).min(MAX_REPEAT);
            if missing > 0 {
                debug!("Repeating previous frame {} times", missing);
                let previous = std::mem::take(&mut self.last_frame);
                for _ in 0..missing {
                    self.write_frame(&previous)?;
                }
            }
        }

        self.write_frame(&packet.data)?;
        self.last_pts = Some(packet.pts);
        self.last_frame = packet.data;
        Ok(())
    }

    fn finalize(&mut self) -> std::result::Result<(), BackendError> {
        self.writer()?
            .flush()
            .map_err(|e| BackendError::finalize(e.to_string()))?;
        info!("Y4M output complete: {} frames", self.frames_written);
        Ok(())
    }

    fn close(&mut self) {
        self.writer = None;
    }
}

#[cfg(test)]
mod tests {
    use screenrec_transform::VideoFrameBuffer;

    use super::*;

    fn params(format: OutputFormat) -> VideoStreamParams {
        VideoStreamParams {
            width: 5,
            height: 3,
            format,
            bitrate: 0,
            frame_rate: (10, 1),
            rotation_degrees: 90,
        }
    }

    fn frame(pts: i64) -> VideoFrameBuffer {
        let mut frame = VideoFrameBuffer::with_stride(OutputFormat::Yuv420Planar, 5, 3, 6).expect("buffer");
        frame.clear();
        frame.set_pts(pts);
        frame
    }

    #[test]
    fn test_rejects_non_planar() {
        let mut backend = Y4mBackend::from_writer(Vec::new());
        assert!(backend.open_video_stream(&params(OutputFormat::Bgra)).is_err());
        assert!(backend.open_video_stream(&params(OutputFormat::Yuv420SemiPlanar)).is_err());
    }

    #[test]
    fn test_header_and_frame_size() {
        let mut backend = Y4mBackend::from_writer(Vec::new());
        let stream = backend.open_video_stream(&params(OutputFormat::Yuv420Planar)).expect("stream");
        assert_eq!(stream.time_base, TimeBase::new(1, 10));
        backend.start().expect("header");

        let packet = backend
            .encode(&stream, EncodePayload::Video(&frame(0)), 0)
            .expect("encode")
            .expect("packet");
        // 5x3 luma, two 3x2 chroma planes
        assert_eq!(packet.data.len(), 15 + 2 * 6);
        assert!(packet.data[..15].iter().all(|&y| y == 16));
        assert!(packet.data[15..].iter().all(|&c| c == 128));

        backend.write_packet(packet).expect("write");
        let out = backend.writer.take().expect("writer");
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("YUV4MPEG2 W5 H3 F10:1 Ip A1:1 C420jpeg XROTATION=90\nFRAME\n"));
    }

    #[test]
    fn test_gaps_repeat_previous_frame() {
        let mut backend = Y4mBackend::from_writer(Vec::new());
        let stream = backend.open_video_stream(&params(OutputFormat::Yuv420Planar)).expect("stream");
        backend.start().expect("header");

        for pts in [0, 1, 4] {
            let packet = backend
                .encode(&stream, EncodePayload::Video(&frame(pts)), pts)
                .expect("encode")
                .expect("packet");
            backend.write_packet(packet).expect("write");
        }
        assert_eq!(backend.frames_written, 5);
    }

    #[test]
    fn test_shared_slot_written_once() {
        let mut backend = Y4mBackend::from_writer(Vec::new());
        let stream = backend.open_video_stream(&params(OutputFormat::Yuv420Planar)).expect("stream");
        backend.start().expect("header");

        for pts in [0, 0, 0, 1, 1, 2] {
            let packet = backend
                .encode(&stream, EncodePayload::Video(&frame(pts)), pts)
                .expect("encode")
                .expect("packet");
            backend.write_packet(packet).expect("write");
        }
        assert_eq!(backend.frames_written, 3);
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut backend = Y4mBackend::from_writer(Vec::new());
        backend.close();
        assert!(backend.finalize().is_err());
    }
}
