//! SensorPacket - 传感器回调输出
//!
//! 原始传感器数据包结构，由传感器回调生成，经有界队列交给写入任务。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::SensorKind;

/// 传感器数据包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPacket {
    /// 传感器 ID
    pub sensor_id: String,

    /// 传感器种类
    pub kind: SensorKind,

    /// CARLA 仿真时间戳 (seconds)
    pub timestamp: f64,

    /// 仿真帧号，用于文件命名
    pub frame: u64,

    /// 数据载荷
    pub payload: SensorPayload,
}

/// 传感器数据载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorPayload {
    /// 图像数据 (RGB/Depth/SemanticSeg)
    Image(ImageData),

    /// DVS 事件
    DvsEvents(DvsEventData),

    /// Radar 检测
    Radar(RadarData),
}

impl SensorPayload {
    /// Short name used in logs and errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            SensorPayload::Image(_) => "image",
            SensorPayload::DvsEvents(_) => "dvs_events",
            SensorPayload::Radar(_) => "radar",
        }
    }
}

/// 图像数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: ImageFormat,

    /// 原始像素数据
    pub data: Bytes,
}

impl ImageData {
    /// Bytes per pixel for the declared format
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            ImageFormat::Rgb8 => 3,
            ImageFormat::Rgba8 | ImageFormat::Bgra8 => 4,
        }
    }

    /// Whether the buffer length matches width * height * bpp
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.bytes_per_pixel()
    }
}

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Rgba8,
    /// CARLA 相机原生格式
    Bgra8,
}

/// DVS 事件帧
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DvsEventData {
    pub width: u32,
    pub height: u32,
    pub events: Vec<DvsEvent>,
}

/// 单个亮度变化事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvsEvent {
    pub x: u16,
    pub y: u16,
    /// 时间戳 (纳秒)
    pub t: i64,
    /// 极性：true = 变亮
    pub pol: bool,
}

/// Radar 数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarData {
    pub detections: Vec<RadarDetection>,
}

/// 单个雷达检测点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarDetection {
    /// 相对速度 (m/s)
    pub velocity: f32,
    /// 方位角 (rad)
    pub azimuth: f32,
    /// 俯仰角 (rad)
    pub altitude: f32,
    /// 距离 (m)
    pub depth: f32,
}

/// 3D 向量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}
