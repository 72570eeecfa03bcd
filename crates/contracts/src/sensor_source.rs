//! SensorSource trait - Sensor data source abstraction
//!
//! Decouples the recorder from the concrete sensor: real CARLA sensors and
//! mock sensors both deliver `SensorPacket`s through a callback.

use std::sync::Arc;

use crate::{SensorKind, SensorPacket};

/// Sensor data callback type
///
/// Invoked on the simulator's delivery thread, so it must not block.
pub type SensorDataCallback = Arc<dyn Fn(SensorPacket) + Send + Sync>;

/// Sensor data source trait
///
/// # Example
///
/// ```ignore
/// let sensor: Box<dyn SensorSource> = client.get_sensor_source(actor_id, "rgb".into(), SensorKind::Rgb)?;
/// sensor.listen(Arc::new(|packet| {
///     println!("frame {}", packet.frame);
/// }));
/// // ... record ...
/// sensor.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Sensor config ID
    fn sensor_id(&self) -> &str;

    /// Sensor kind
    fn sensor_kind(&self) -> SensorKind;

    /// Register data callback
    ///
    /// Repeated calls while listening are ignored.
    fn listen(&self, callback: SensorDataCallback);

    /// Stop delivering frames
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
