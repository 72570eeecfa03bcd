//! CARLA client abstraction
//!
//! Defines traits for interacting with CARLA, supporting real implementation and mock testing.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use contracts::{
    ActorId, SensorKind, SensorSource, TrafficManagerConfig, Transform, Vector3, WeatherParams,
};

use crate::error::Result;

/// Vehicle blueprint as seen by the spawner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleBlueprint {
    /// Blueprint id, e.g. "vehicle.audi.tt"
    pub id: String,

    /// Recommended values of the `color` attribute (empty if the blueprint has none)
    pub recommended_colors: Vec<String>,
}

impl VehicleBlueprint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            recommended_colors: Vec::new(),
        }
    }

    pub fn with_colors<'a>(mut self, colors: impl IntoIterator<Item = &'a str>) -> Self {
        self.recommended_colors = colors.into_iter().map(str::to_string).collect();
        self
    }

    /// Whether the blueprint exposes a `color` attribute
    pub fn has_color(&self) -> bool {
        !self.recommended_colors.is_empty()
    }
}

/// Manual vehicle control
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleControl {
    pub throttle: f32,
    pub steer: f32,
    pub brake: f32,
}

/// CARLA client trait
///
/// Abstracts CARLA core operations for testing and future implementation replacement.
/// Supports unified interface for real CARLA client and Mock client.
pub trait CarlaClient: Send + Sync {
    /// Connect to CARLA server and load the current world
    ///
    /// # Returns
    /// Name of the loaded map
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Apply weather parameters to the world
    fn set_weather(&self, weather: &WeatherParams) -> impl Future<Output = Result<()>> + Send;

    /// Recommended spawn points of the current map, in map order
    fn spawn_points(&self) -> impl Future<Output = Result<Vec<Transform>>> + Send;

    /// Vehicle blueprints matching a wildcard filter, e.g. "vehicle.*"
    fn vehicle_blueprints(
        &self,
        filter: &str,
    ) -> impl Future<Output = Result<Vec<VehicleBlueprint>>> + Send;

    /// Try to spawn a vehicle
    ///
    /// # Returns
    /// `Ok(None)` when the spawn point is occupied, `Err` on any other failure
    fn try_spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Transform,
        attributes: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Option<ActorId>>> + Send;

    /// Toggle the built-in autopilot
    fn set_autopilot(
        &self,
        actor_id: ActorId,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Enable autopilot through the traffic manager and apply per-vehicle tuning
    fn enable_managed_autopilot(
        &self,
        actor_id: ActorId,
        config: &TrafficManagerConfig,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Apply manual control (autopilot must be off)
    fn apply_control(
        &self,
        actor_id: ActorId,
        control: VehicleControl,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Current velocity in m/s
    fn velocity(&self, actor_id: ActorId) -> impl Future<Output = Result<Vector3>> + Send;

    /// Spawn sensor and attach to parent actor
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint name, e.g., "sensor.camera.rgb"
    /// * `transform` - Pose relative to parent actor
    /// * `parent_id` - Parent actor ID
    /// * `attributes` - Sensor attributes
    fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<ActorId>> + Send;

    /// Destroy actor
    ///
    /// Idempotent operation: returns Ok if actor doesn't exist
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Check if actor exists
    fn actor_exists(&self, actor_id: ActorId) -> impl Future<Output = Result<bool>> + Send;

    /// Get sensor data source
    ///
    /// # Returns
    /// Boxed `SensorSource`, None if the actor is not a sensor of this client
    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>>;
}
