//! RgbWriter - rgb/rgb_{frame}.png plus the GIF frame dump

use contracts::{ContractError, FrameWriter, SensorPacket};
use tracing::trace;

use crate::decode;
use crate::gif::{FrameBuffer, GifFrame};
use crate::output::OutputLayout;
use crate::writers::{expect_image, save_png, writer_error};

/// Writes RGB camera frames
///
/// With a `FrameBuffer` attached, every frame is also written without alpha
/// to `gif_frames/` and kept for the crash clip.
pub struct RgbWriter {
    name: String,
    layout: OutputLayout,
    gif: Option<FrameBuffer>,
}

impl RgbWriter {
    pub fn new(name: impl Into<String>, layout: OutputLayout, gif: Option<FrameBuffer>) -> Self {
        Self {
            name: name.into(),
            layout,
            gif,
        }
    }
}

impl FrameWriter for RgbWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, packet: &SensorPacket) -> Result<(), ContractError> {
        let image = expect_image(&self.name, packet)?;

        let rgba = decode::to_rgba(image).map_err(|e| writer_error(&self.name, e))?;
        save_png(
            &self.layout.rgb_frame(packet.frame),
            image.width,
            image.height,
            &rgba,
            image::ColorType::Rgba8,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        if let Some(buffer) = &self.gif {
            let rgb = decode::to_rgb(image).map_err(|e| writer_error(&self.name, e))?;
            save_png(
                &self.layout.gif_frame(packet.frame),
                image.width,
                image.height,
                &rgb,
                image::ColorType::Rgb8,
            )
            .map_err(|e| writer_error(&self.name, e))?;
            buffer.push(GifFrame {
                frame: packet.frame,
                width: image.width,
                height: image.height,
                rgb,
            });
        }

        trace!(writer = %self.name, frame = packet.frame, "rgb frame written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
