//! Per-sensor frame writers
//!
//! Each writer implements `FrameWriter` and is driven by exactly one
//! `WriterHandle` worker task, so it owns its files outright.

mod depth;
mod dvs;
mod radar;
mod rgb;
mod segmentation;

pub use depth::DepthWriter;
pub use dvs::DvsWriter;
pub use radar::{RadarWriter, RADAR_CSV_HEADER};
pub use rgb::RgbWriter;
pub use segmentation::SegmentationWriter;

use std::fmt::Display;
use std::path::Path;

use contracts::{ContractError, ImageData, SensorPacket, SensorPayload};

use crate::error::RecorderError;

/// Wrap any failure as a writer error carrying the writer name
pub(crate) fn writer_error(writer: &str, error: impl Display) -> ContractError {
    ContractError::writer(writer, error.to_string())
}

/// The image payload of `packet`, or an `UnexpectedPayload` error
pub(crate) fn expect_image<'a>(
    writer: &str,
    packet: &'a SensorPacket,
) -> Result<&'a ImageData, ContractError> {
    match &packet.payload {
        SensorPayload::Image(image) => Ok(image),
        other => Err(ContractError::UnexpectedPayload {
            writer: writer.to_string(),
            expected: "image",
            actual: other.kind_name(),
        }),
    }
}

/// Encode a packed buffer as PNG
pub(crate) fn save_png(
    path: &Path,
    width: u32,
    height: u32,
    buffer: &[u8],
    color: image::ColorType,
) -> Result<(), RecorderError> {
    image::save_buffer(path, buffer, width, height, color)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use bytes::Bytes;
    use contracts::{ImageData, ImageFormat, SensorKind, SensorPacket, SensorPayload};

    /// BGRA packet whose pixel `i` is `[i, 2i, 3i, 255]` (wrapping)
    pub fn bgra_packet(kind: SensorKind, frame: u64, width: u32, height: u32) -> SensorPacket {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| {
                let i = i as u8;
                [i, i.wrapping_mul(2), i.wrapping_mul(3), 255]
            })
            .collect();
        SensorPacket {
            sensor_id: format!("{kind:?}").to_lowercase(),
            kind,
            timestamp: frame as f64 * 0.05,
            frame,
            payload: SensorPayload::Image(ImageData {
                width,
                height,
                format: ImageFormat::Bgra8,
                data: Bytes::from(data),
            }),
        }
    }
}
