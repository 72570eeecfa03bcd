//! Crash clip assembly
//!
//! The RGB writer keeps the most recent frames in a bounded buffer; the
//! finalizer turns that buffer into an animated GIF once every writer has
//! drained.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use tracing::{info, warn};

use crate::error::{RecorderError, Result};

/// One retained RGB frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifFrame {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8
    pub rgb: Vec<u8>,
}

/// Ring of the last `capacity` RGB frames, shared between writer and finalizer
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    capacity: usize,
    frames: Arc<Mutex<VecDeque<GifFrame>>>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a frame, evicting the oldest once full
    pub fn push(&self, frame: GifFrame) {
        if self.capacity == 0 {
            return;
        }
        let mut frames = self.frames.lock().unwrap();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retained frames, oldest first
    pub fn snapshot(&self) -> Vec<GifFrame> {
        self.frames.lock().unwrap().iter().cloned().collect()
    }
}

fn to_rgba_image(frame: &GifFrame) -> Result<RgbaImage> {
    let rgba: Vec<u8> = frame
        .rgb
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();
    let len = rgba.len() / 4 * 3;
    RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or(RecorderError::MalformedImage {
        width: frame.width,
        height: frame.height,
        len,
    })
}

/// Write `frames` as a looping GIF, `delay_ms` per frame
///
/// Returns the number of frames written. An empty slice writes nothing.
pub fn write_gif(path: &Path, frames: &[GifFrame], delay_ms: u32) -> Result<usize> {
    if frames.is_empty() {
        warn!(path = %path.display(), "no frames buffered, skipping gif");
        return Ok(0);
    }

    let file = File::create(path).map_err(|e| RecorderError::io(path, e))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;

    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    for frame in frames {
        let image = to_rgba_image(frame)?;
        encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
    }

    info!(
        path = %path.display(),
        frames = frames.len(),
        first = frames[0].frame,
        last = frames[frames.len() - 1].frame,
        "gif written"
    );
    Ok(frames.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;
    use std::io::BufReader;
    use tempfile::tempdir;

    fn solid(frame: u64, red: u8) -> GifFrame {
        GifFrame {
            frame,
            width: 4,
            height: 3,
            rgb: [red, 255 - red, 0].repeat(12),
        }
    }

    fn decode(path: &Path) -> Vec<image::Frame> {
        let decoder = GifDecoder::new(BufReader::new(File::open(path).unwrap())).unwrap();
        decoder.into_frames().collect_frames().unwrap()
    }

    #[test]
    fn test_buffer_keeps_last_frames() {
        let buffer = FrameBuffer::new(3);
        for i in 0..5 {
            buffer.push(solid(i, 0));
        }
        let frames: Vec<u64> = buffer.snapshot().iter().map(|f| f.frame).collect();
        assert_eq!(frames, vec![2, 3, 4]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_buffer_shared_between_clones() {
        let buffer = FrameBuffer::new(30);
        let writer_side = buffer.clone();
        writer_side.push(solid(1, 0));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_gif_contains_frames_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        let frames: Vec<GifFrame> = (0..12).map(|i| solid(100 + i, (i * 20) as u8)).collect();

        let written = write_gif(&path, &frames, 100).unwrap();
        assert_eq!(written, 12);

        let decoded = decode(&path);
        assert_eq!(decoded.len(), 12);
        for (i, frame) in decoded.iter().enumerate() {
            let pixel = frame.buffer().get_pixel(0, 0);
            assert_eq!(pixel[0], (i * 20) as u8);
            assert_eq!(frame.delay().numer_denom_ms(), (100, 1));
        }
    }

    #[test]
    fn test_gif_from_full_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crash_clip.gif");
        let buffer = FrameBuffer::new(30);
        for i in 0..45u64 {
            buffer.push(solid(i, (i * 5) as u8));
        }

        write_gif(&path, &buffer.snapshot(), 100).unwrap();

        let decoded = decode(&path);
        assert_eq!(decoded.len(), 30);
        // first retained frame is #15
        assert_eq!(decoded[0].buffer().get_pixel(0, 0)[0], 75);
    }

    #[test]
    fn test_empty_buffer_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        assert_eq!(write_gif(&path, &[], 100).unwrap(), 0);
        assert!(!path.exists());
    }
}
