//! CARLA 传感器数据转换
//!
//! 将 CARLA 原生传感器数据转换为 `SensorPacket`。
//! 仅在 `real-carla` feature 启用时编译。

use bytes::Bytes;
use carla::sensor::data::{DvsEventArray, Image, RadarMeasurement};
use carla::sensor::{SensorData, SensorDataBase};
use contracts::{
    DvsEvent, DvsEventData, ImageData, ImageFormat, RadarData, RadarDetection, SensorKind,
    SensorPacket, SensorPayload,
};

/// 将 CARLA Image 转换为 SensorPayload (BGRA 原始字节)
fn image_to_payload(image: &Image) -> SensorPayload {
    let data = Bytes::copy_from_slice(image.as_raw_bytes());
    SensorPayload::Image(ImageData {
        width: image.width() as u32,
        height: image.height() as u32,
        format: ImageFormat::Bgra8,
        data,
    })
}

/// 将 CARLA DVS 事件数组转换为 SensorPayload
fn dvs_to_payload(events: &DvsEventArray) -> SensorPayload {
    SensorPayload::DvsEvents(DvsEventData {
        width: events.width() as u32,
        height: events.height() as u32,
        events: events
            .as_slice()
            .iter()
            .map(|e| DvsEvent {
                x: e.x,
                y: e.y,
                t: e.t,
                pol: e.pol,
            })
            .collect(),
    })
}

/// 将 CARLA RadarMeasurement 转换为 SensorPayload
fn radar_to_payload(radar: &RadarMeasurement) -> SensorPayload {
    SensorPayload::Radar(RadarData {
        detections: radar
            .as_slice()
            .iter()
            .map(|d| RadarDetection {
                velocity: d.velocity,
                azimuth: d.azimuth,
                altitude: d.altitude,
                depth: d.depth,
            })
            .collect(),
    })
}

/// 将 CARLA 传感器数据转换为 SensorPacket
///
/// 根据传感器类型自动选择合适的转换函数。
/// 如果数据类型与传感器类型不匹配，返回 None。
pub fn convert_sensor_data(
    sensor_id: &str,
    kind: SensorKind,
    data: &SensorData,
) -> Option<SensorPacket> {
    let timestamp = data.timestamp();
    let frame = data.frame() as u64;

    let payload = match kind {
        SensorKind::Rgb | SensorKind::Depth | SensorKind::SemanticSegmentation => {
            let image = Image::try_from(data.clone()).ok()?;
            image_to_payload(&image)
        }
        SensorKind::Dvs => {
            let events = DvsEventArray::try_from(data.clone()).ok()?;
            dvs_to_payload(&events)
        }
        SensorKind::Radar => {
            let radar = RadarMeasurement::try_from(data.clone()).ok()?;
            radar_to_payload(&radar)
        }
    };

    Some(SensorPacket {
        sensor_id: sensor_id.to_string(),
        kind,
        timestamp,
        frame,
        payload,
    })
}
