//! DepthWriter - native depth PNG and normalized depth array

use contracts::{ContractError, FrameWriter, SensorPacket};
use tracing::trace;

use crate::decode;
use crate::npy;
use crate::output::OutputLayout;
use crate::writers::{expect_image, save_png, writer_error};

/// Writes `depth_png/depth_{frame}.png` (simulator encoding, unchanged) and
/// `depth_npy/depth_{frame}.npy` (float64, shape (H, W), values in [0, 1])
pub struct DepthWriter {
    name: String,
    layout: OutputLayout,
}

impl DepthWriter {
    pub fn new(name: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            name: name.into(),
            layout,
        }
    }
}

impl FrameWriter for DepthWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, packet: &SensorPacket) -> Result<(), ContractError> {
        let image = expect_image(&self.name, packet)?;

        let rgba = decode::to_rgba(image).map_err(|e| writer_error(&self.name, e))?;
        save_png(
            &self.layout.depth_png(packet.frame),
            image.width,
            image.height,
            &rgba,
            image::ColorType::Rgba8,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        let depth = decode::decode_depth(image).map_err(|e| writer_error(&self.name, e))?;
        npy::write_npy(
            &self.layout.depth_npy(packet.frame),
            &[image.height as usize, image.width as usize],
            &depth,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        trace!(writer = %self.name, frame = packet.frame, "depth frame written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{DEPTH_NPY_DIR, DEPTH_PNG_DIR};
    use crate::writers::test_support::bgra_packet;
    use contracts::SensorKind;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_depth_outputs() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        fs::create_dir_all(layout.dir(DEPTH_PNG_DIR)).unwrap();
        fs::create_dir_all(layout.dir(DEPTH_NPY_DIR)).unwrap();
        let mut writer = DepthWriter::new("depth", layout.clone());

        writer
            .write(&bgra_packet(SensorKind::Depth, 3, 3, 2))
            .await
            .unwrap();

        assert!(layout.depth_png(3).exists());

        let bytes = fs::read(layout.depth_npy(3)).unwrap();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'descr': '<f8'"));
        assert!(header.contains("'shape': (2, 3)"));

        let body = &bytes[10 + header_len..];
        assert_eq!(body.len(), 6 * 8);
        // pixel 2 is [2, 4, 6, 255]
        let value = f64::from_le_bytes(body[16..24].try_into().unwrap());
        let expected = (2.0 + 4.0 * 256.0 + 6.0 * 65536.0) / 16_777_215.0;
        assert!((value - expected).abs() < 1e-15);
    }
}
