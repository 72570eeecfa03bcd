//! # Actor Factory
//!
//! CARLA asset factory module.
//!
//! Responsibilities:
//! - Connect to the simulator behind the `CarlaClient` trait
//! - Pick the ego spawn point and nearby traffic spawn points
//! - Spawn ego, traffic and the sensor rig from `SessionBlueprint`
//! - Provide teardown and rollback
//! - Provide unified `SensorSource` abstraction
//! - Support an in-process Mock simulator
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod factory;
pub mod mock_client;
pub mod mock_sensor;
pub mod spawn_points;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod carla_sensor_source;
#[cfg(feature = "real-carla")]
pub mod sensor_data_converter;

pub use client::{CarlaClient, VehicleBlueprint, VehicleControl};
pub use contracts::{ActorId, SensorSource, SessionBlueprint, SessionGraph};
pub use error::{ActorFactoryError, Result};
pub use factory::{SessionSpawner, SpawnedSession, TrafficReport};
pub use mock_client::{grid_spawn_points, MockCarlaClient, MockConfig};
pub use mock_sensor::{MockSensor, MockSensorConfig};

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
#[cfg(feature = "real-carla")]
pub use carla_sensor_source::CarlaSensorSource;
