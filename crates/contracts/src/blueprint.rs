//! SessionBlueprint - Config Loader 输出
//!
//! 描述一次完整的录制会话：服务器连接、天气、自车、周边交通、传感器挂载、
//! 录制时长、碰撞序列与输出目录。
//!
//! 所有字段都有默认值，默认值即为 `full` 会话。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionBlueprint {
    /// 配置版本
    pub version: ConfigVersion,

    /// CARLA 服务器连接
    #[validate(nested)]
    pub server: ServerConfig,

    /// 天气参数
    #[validate(nested)]
    pub weather: WeatherParams,

    /// 自车
    #[validate(nested)]
    pub ego: EgoConfig,

    /// 周边交通
    #[validate(nested)]
    pub traffic: TrafficConfig,

    /// 挂载在自车上的传感器
    #[validate(nested)]
    pub sensors: Vec<SensorConfig>,

    /// 录制阶段
    #[validate(nested)]
    pub recording: RecordingConfig,

    /// 碰撞序列
    #[validate(nested)]
    pub crash: CrashConfig,

    /// 输出目录与 GIF
    #[validate(nested)]
    pub output: OutputConfig,

    /// 随机种子 (None = 使用系统熵)
    pub seed: Option<u64>,
}

impl Default for SessionBlueprint {
    fn default() -> Self {
        Self::full()
    }
}

impl SessionBlueprint {
    /// Full session: traffic-manager tuned ego, five sensors, crash clip.
    pub fn full() -> Self {
        Self {
            version: ConfigVersion::V1,
            server: ServerConfig::default(),
            weather: WeatherParams::default(),
            ego: EgoConfig::default(),
            traffic: TrafficConfig::default(),
            sensors: default_sensor_rig(),
            recording: RecordingConfig::default(),
            crash: CrashConfig::default(),
            output: OutputConfig::default(),
            seed: None,
        }
    }

    /// Basic session: plain autopilot, camera sensors only, no crash and no GIF.
    pub fn basic() -> Self {
        let mut blueprint = Self::full();
        blueprint.ego.traffic_manager.enabled = false;
        blueprint
            .sensors
            .retain(|sensor| sensor.kind != SensorKind::Radar);
        blueprint.crash.enabled = false;
        blueprint.output.gif.enabled = false;
        blueprint
    }

    /// Build a blueprint from a named profile
    pub fn from_profile(profile: SessionProfile) -> Self {
        match profile {
            SessionProfile::Full => Self::full(),
            SessionProfile::Basic => Self::basic(),
        }
    }

    /// First sensor of the given kind, if the rig has one
    pub fn sensor_of_kind(&self, kind: SensorKind) -> Option<&SensorConfig> {
        self.sensors.iter().find(|sensor| sensor.kind == kind)
    }

    /// Whether the RGB writer must keep frames for the crash clip
    pub fn needs_gif_frames(&self) -> bool {
        self.output.gif.enabled && self.sensor_of_kind(SensorKind::Rgb).is_some()
    }
}

/// 会话预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionProfile {
    /// RGB/Depth/Segmentation/DVS 录制
    Basic,
    /// 增加雷达、交通管理器调参、碰撞与 GIF
    #[default]
    Full,
}

/// CARLA 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器地址
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,

    /// 服务器端口
    pub port: u16,

    /// RPC 超时 (秒)
    #[validate(range(exclusive_min = 0.0, message = "timeout_sec must be > 0"))]
    pub timeout_sec: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2000,
            timeout_sec: 10.0,
        }
    }
}

/// 天气参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WeatherParams {
    #[validate(range(min = 0.0, max = 100.0))]
    pub cloudiness: f32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub precipitation: f32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub fog_density: f32,
    #[validate(range(min = -90.0, max = 90.0))]
    pub sun_altitude_angle: f32,
}

impl Default for WeatherParams {
    fn default() -> Self {
        Self {
            cloudiness: 90.0,
            precipitation: 80.0,
            fog_density: 85.0,
            sun_altitude_angle: 10.0,
        }
    }
}

/// 自车配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EgoConfig {
    /// 蓝图名称
    #[validate(length(min = 1, message = "ego blueprint cannot be empty"))]
    pub blueprint: String,

    /// 首选出生点序号；地图出生点不足时随机选择
    pub spawn_index: usize,

    /// 交通管理器调参 (enabled = false 时使用普通 autopilot)
    #[validate(nested)]
    pub traffic_manager: TrafficManagerConfig,
}

impl Default for EgoConfig {
    fn default() -> Self {
        Self {
            blueprint: "vehicle.tesla.model3".to_string(),
            spawn_index: 10,
            traffic_manager: TrafficManagerConfig::default(),
        }
    }
}

/// 交通管理器参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrafficManagerConfig {
    /// 是否通过交通管理器启用 autopilot
    pub enabled: bool,

    /// 与前车的全局距离 (米)
    #[validate(range(min = 0.0))]
    pub global_distance_to_leading_vehicle: f32,

    /// 同步模式
    pub synchronous_mode: bool,

    /// 自动变道
    pub auto_lane_change: bool,

    /// 与限速的百分比差值，负数表示超速
    #[validate(range(min = -100.0, max = 100.0))]
    pub percentage_speed_difference: f32,

    /// 闯红灯概率 (%)
    #[validate(range(min = 0.0, max = 100.0))]
    pub ignore_lights_percentage: f32,
}

impl Default for TrafficManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_distance_to_leading_vehicle: 3.0,
            synchronous_mode: false,
            auto_lane_change: true,
            percentage_speed_difference: -30.0,
            ignore_lights_percentage: 0.0,
        }
    }
}

/// 周边交通配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrafficConfig {
    /// 蓝图过滤通配符
    #[validate(length(min = 1, message = "traffic filter cannot be empty"))]
    pub blueprint_filter: String,

    /// 出生点筛选半径 (米)
    #[validate(range(exclusive_min = 0.0, message = "radius_m must be > 0"))]
    pub radius_m: f64,

    /// 最多生成的车辆数
    pub max_vehicles: usize,

    /// 随机选择推荐颜色
    pub randomize_color: bool,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            blueprint_filter: "vehicle.*".to_string(),
            radius_m: 60.0,
            max_vehicles: 25,
            randomize_color: true,
        }
    }
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    #[serde(default)]
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    #[serde(default)]
    pub rotation: Rotation,
}

impl Transform {
    /// Pure translation with zero rotation
    pub fn from_location(x: f64, y: f64, z: f64) -> Self {
        Self {
            location: Location { x, y, z },
            rotation: Rotation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

/// 传感器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    /// 唯一标识符
    #[validate(length(min = 1, message = "sensor id cannot be empty"))]
    pub id: String,

    /// 传感器种类
    pub kind: SensorKind,

    /// 相对于自车的挂载位姿
    #[serde(default = "default_mount")]
    pub transform: Transform,

    /// 蓝图属性 (image_size_x, fov, range ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl SensorConfig {
    /// Sensor at the default mount with the given attributes
    pub fn new<'a>(
        id: impl Into<String>,
        kind: SensorKind,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            transform: default_mount(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Integer attribute, if present and parseable
    pub fn attribute_u32(&self, key: &str) -> Option<u32> {
        self.attributes.get(key).and_then(|v| v.parse().ok())
    }
}

fn default_mount() -> Transform {
    Transform::from_location(1.5, 0.0, 2.4)
}

fn default_sensor_rig() -> Vec<SensorConfig> {
    let camera = [("image_size_x", "800"), ("image_size_y", "600"), ("fov", "90")];
    vec![
        SensorConfig::new("rgb", SensorKind::Rgb, camera),
        SensorConfig::new("depth", SensorKind::Depth, camera),
        SensorConfig::new("segmentation", SensorKind::SemanticSegmentation, camera),
        SensorConfig::new("dvs", SensorKind::Dvs, [("fov", "90")]),
        SensorConfig::new(
            "radar",
            SensorKind::Radar,
            [("horizontal_fov", "30"), ("vertical_fov", "10"), ("range", "50")],
        ),
    ]
}

/// 传感器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Rgb,
    Depth,
    SemanticSegmentation,
    Dvs,
    Radar,
}

impl SensorKind {
    /// CARLA blueprint id
    pub fn blueprint(self) -> &'static str {
        match self {
            SensorKind::Rgb => "sensor.camera.rgb",
            SensorKind::Depth => "sensor.camera.depth",
            SensorKind::SemanticSegmentation => "sensor.camera.semantic_segmentation",
            SensorKind::Dvs => "sensor.camera.dvs",
            SensorKind::Radar => "sensor.other.radar",
        }
    }

    /// Whether frames arrive as BGRA images
    pub fn is_camera(self) -> bool {
        matches!(
            self,
            SensorKind::Rgb | SensorKind::Depth | SensorKind::SemanticSegmentation
        )
    }
}

/// 录制阶段配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RecordingConfig {
    /// 录制时长 (秒)
    #[validate(range(exclusive_min = 0.0, message = "duration_sec must be > 0"))]
    pub duration_sec: f64,

    /// 每个传感器写入队列的容量
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    /// 关闭时等待写入任务排空的上限 (秒)
    #[validate(range(min = 0.0))]
    pub drain_timeout_sec: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            duration_sec: 60.0,
            queue_capacity: 64,
            drain_timeout_sec: 5.0,
        }
    }
}

/// 碰撞序列配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CrashConfig {
    /// 是否执行
    pub enabled: bool,

    /// 油门 [0, 1]
    #[validate(range(min = 0.0, max = 1.0))]
    pub throttle: f32,

    /// 转向 [-1, 1]
    #[validate(range(min = -1.0, max = 1.0))]
    pub steer: f32,

    /// 保持时间 (秒)
    #[validate(range(min = 0.0))]
    pub hold_sec: f64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            throttle: 1.0,
            steer: 0.0,
            hold_sec: 4.0,
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    /// 输出根目录
    pub root: PathBuf,

    /// 最终速度日志文件名
    #[validate(length(min = 1))]
    pub velocity_file: String,

    /// GIF 片段
    #[validate(nested)]
    pub gif: GifConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            velocity_file: "final_velocity.txt".to_string(),
            gif: GifConfig::default(),
        }
    }
}

/// GIF 片段配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GifConfig {
    pub enabled: bool,

    /// 保留的最近 RGB 帧数
    #[validate(range(min = 1, message = "frame_count must be >= 1"))]
    pub frame_count: usize,

    /// 每帧时长 (毫秒)
    #[validate(range(min = 1))]
    pub frame_delay_ms: u32,

    /// 文件名
    #[validate(length(min = 1))]
    pub file_name: String,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_count: 30,
            frame_delay_ms: 100,
            file_name: "crash_clip.gif".to_string(),
        }
    }
}
