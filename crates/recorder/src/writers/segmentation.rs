//! SegmentationWriter - CityScapes PNG and raw class-id array

use contracts::{ContractError, FrameWriter, SensorPacket};
use tracing::trace;

use crate::decode;
use crate::npy;
use crate::output::OutputLayout;
use crate::writers::{expect_image, save_png, writer_error};

/// Writes `segmentation/seg_{frame}.png` (CityScapes palette) and
/// `segmentation_npy/seg_{frame}.npy` (uint8 class ids, shape (H, W))
pub struct SegmentationWriter {
    name: String,
    layout: OutputLayout,
}

impl SegmentationWriter {
    pub fn new(name: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            name: name.into(),
            layout,
        }
    }
}

impl FrameWriter for SegmentationWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, packet: &SensorPacket) -> Result<(), ContractError> {
        let image = expect_image(&self.name, packet)?;

        let palette = decode::cityscapes_rgb(image).map_err(|e| writer_error(&self.name, e))?;
        save_png(
            &self.layout.segmentation_png(packet.frame),
            image.width,
            image.height,
            &palette,
            image::ColorType::Rgb8,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        let ids = decode::class_ids(image).map_err(|e| writer_error(&self.name, e))?;
        npy::write_npy(
            &self.layout.segmentation_npy(packet.frame),
            &[image.height as usize, image.width as usize],
            &ids,
        )
        .map_err(|e| writer_error(&self.name, e))?;

        trace!(writer = %self.name, frame = packet.frame, "segmentation frame written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
