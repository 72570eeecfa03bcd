//! # Recorder
//!
//! 传感器数据落盘：每个传感器一个有界队列和一个写入任务。
//!
//! ## 输出
//!
//! - RGB: PNG (可选 GIF 帧)
//! - Depth: PNG + 归一化深度 `.npy`
//! - Semantic segmentation: CityScapes PNG + class id `.npy`
//! - DVS: 结构化事件 `.npy`
//! - Radar: 单个 CSV
//!
//! ## 使用示例
//!
//! ```ignore
//! let recorder = Recorder::start(&blueprint)?;
//! sensor.listen(recorder.callback_for(&sensor_id).unwrap());
//! // ...
//! sensor.stop();
//! let report = recorder.finish(drain_timeout, &blueprint.output.gif).await?;
//! ```

pub mod decode;
mod error;
pub mod gif;
mod handle;
mod metrics;
pub mod npy;
pub mod output;
mod recorder;
pub mod writers;

pub use error::{RecorderError, Result};
pub use gif::{FrameBuffer, GifFrame};
pub use handle::{FrameSender, WriterHandle};
pub use metrics::{MetricsSnapshot, WriterMetrics};
pub use output::OutputLayout;
pub use recorder::{write_final_velocity, Recorder, RecordingReport, WriterReport};
