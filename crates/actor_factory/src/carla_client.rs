//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use carla::client::{ActorBase, Client, Sensor, TrafficManager, Vehicle, World};
use carla::geom::{Location, Rotation, Transform as CarlaTransform};
use carla::rpc::{VehicleControl as CarlaVehicleControl, WeatherParameters};
use contracts::{
    ActorId, SensorKind, SensorSource, TrafficManagerConfig, Transform, Vector3, WeatherParams,
};
use tracing::{debug, info, instrument, warn};

use crate::carla_sensor_source::CarlaSensorSource;
use crate::client::{CarlaClient, VehicleBlueprint, VehicleControl};
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements CarlaClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    /// CARLA client
    client: Arc<Mutex<Option<Client>>>,
    /// World reference (uses Mutex for interior mutability)
    world: Arc<Mutex<Option<World>>>,
    /// Traffic manager, created lazily for the ego vehicle
    traffic_manager: Arc<Mutex<Option<TrafficManager>>>,
    /// Created actors list (for teardown)
    actors: Arc<Mutex<HashMap<ActorId, ActorType>>>,
}

/// Actor type enumeration
#[derive(Clone)]
enum ActorType {
    Vehicle(Vehicle),
    Sensor(Sensor),
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut world_guard = self.world.lock().unwrap();
        let world = world_guard
            .as_mut()
            .ok_or_else(|| ActorFactoryError::ConnectionFailed {
                message: "not connected to CARLA server".into(),
            })?;
        f(world)
    }

    /// Save actor to registry for teardown
    fn store_actor(&self, actor_id: ActorId, actor: ActorType) {
        self.actors.lock().unwrap().insert(actor_id, actor);
    }

    fn vehicle(&self, actor_id: ActorId) -> Result<Vehicle> {
        match self.actors.lock().unwrap().get(&actor_id) {
            Some(ActorType::Vehicle(v)) => Ok(v.clone()),
            _ => Err(ActorFactoryError::control(actor_id, "vehicle not found")),
        }
    }

    fn parent_vehicle_for_sensor(
        &self,
        sensor_blueprint: &str,
        parent_id: ActorId,
    ) -> Result<Vehicle> {
        self.vehicle(parent_id).map_err(|_| {
            ActorFactoryError::sensor_spawn(
                sensor_blueprint,
                format!("actor_{}", parent_id),
                "parent vehicle not found",
            )
        })
    }

    /// Get or create the traffic manager on the default port
    fn with_traffic_manager<R>(&self, f: impl FnOnce(&mut TrafficManager) -> R) -> Result<R> {
        let mut tm_guard = self.traffic_manager.lock().unwrap();
        if tm_guard.is_none() {
            let mut client_guard = self.client.lock().unwrap();
            let client = client_guard
                .as_mut()
                .ok_or_else(|| ActorFactoryError::ConnectionFailed {
                    message: "not connected to CARLA server".into(),
                })?;
            *tm_guard = Some(client.instance_tm(None));
        }
        match tm_guard.as_mut() {
            Some(tm) => Ok(f(tm)),
            None => Err(ActorFactoryError::ConnectionFailed {
                message: "traffic manager unavailable".into(),
            }),
        }
    }

    fn create_sensor(
        world: &mut World,
        blueprint: &str,
        transform: Transform,
        parent_actor: &Vehicle,
        parent_id: ActorId,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Sensor> {
        let bp_library = world.blueprint_library();
        let mut sensor_bp = bp_library.find(blueprint).ok_or_else(|| {
            ActorFactoryError::BlueprintNotFound {
                blueprint: blueprint.to_string(),
            }
        })?;

        for (key, value) in attributes {
            let success = sensor_bp.set_attribute(key, value);
            if !success {
                warn!(key, value, "failed to set sensor attribute");
            }
        }

        let carla_transform = to_carla_transform(&transform);
        let actor = world
            .spawn_actor_attached(&sensor_bp, &carla_transform, parent_actor, None)
            .map_err(|e| {
                ActorFactoryError::sensor_spawn(blueprint, format!("actor_{}", parent_id), e.to_string())
            })?;

        Sensor::try_from(actor).map_err(|_| {
            ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{}", parent_id),
                "spawned actor is not a sensor",
            )
        })
    }

    fn destroy_vehicle_actor(vehicle: Vehicle, actor_id: ActorId) {
        if !vehicle.destroy() {
            warn!(actor_id, "destroy vehicle returned false");
        }
    }

    fn destroy_sensor_actor(sensor: Sensor, actor_id: ActorId) {
        if sensor.is_listening() {
            sensor.stop();
        }
        if !sensor.destroy() {
            warn!(actor_id, "destroy sensor returned false");
        }
    }

    /// Get underlying CARLA Sensor object
    pub fn get_sensor(&self, actor_id: ActorId) -> Option<Sensor> {
        let actors = self.actors.lock().unwrap();
        match actors.get(&actor_id) {
            Some(ActorType::Sensor(sensor)) => Some(sensor.clone()),
            _ => None,
        }
    }
}

/// Convert internal Transform to CARLA Transform
fn to_carla_transform(transform: &Transform) -> CarlaTransform {
    let location = Location {
        x: transform.location.x as f32,
        y: transform.location.y as f32,
        z: transform.location.z as f32,
    };
    let rotation = Rotation {
        pitch: transform.rotation.pitch as f32,
        yaw: transform.rotation.yaw as f32,
        roll: transform.rotation.roll as f32,
    };
    CarlaTransform { location, rotation }
}

/// Convert CARLA Transform to internal Transform
fn from_carla_transform(transform: &CarlaTransform) -> Transform {
    Transform {
        location: contracts::Location {
            x: f64::from(transform.location.x),
            y: f64::from(transform.location.y),
            z: f64::from(transform.location.z),
        },
        rotation: contracts::Rotation {
            pitch: f64::from(transform.rotation.pitch),
            yaw: f64::from(transform.rotation.yaw),
            roll: f64::from(transform.rotation.roll),
        },
    }
}

impl CarlaClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self, timeout), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<String> {
        let mut client = Client::connect(host, port, None);
        client.set_timeout(timeout);
        let world = client.world();
        let map_name = world.map().name();

        info!(map = %map_name, "connected to CARLA server");

        *self.client.lock().unwrap() = Some(client);
        *self.world.lock().unwrap() = Some(world);

        Ok(map_name)
    }

    #[instrument(name = "real_carla_set_weather", skip(self, weather))]
    async fn set_weather(&self, weather: &WeatherParams) -> Result<()> {
        self.with_world_mut(|world| {
            let mut params: WeatherParameters = world.weather();
            params.cloudiness = weather.cloudiness;
            params.precipitation = weather.precipitation;
            params.fog_density = weather.fog_density;
            params.sun_altitude_angle = weather.sun_altitude_angle;
            world.set_weather(&params);
            Ok(())
        })
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.with_world_mut(|world| {
            let points = world.map().recommended_spawn_points();
            Ok((0..points.len())
                .filter_map(|i| points.get(i))
                .map(from_carla_transform)
                .collect())
        })
    }

    async fn vehicle_blueprints(&self, filter: &str) -> Result<Vec<VehicleBlueprint>> {
        self.with_world_mut(|world| {
            let library = world.blueprint_library();
            Ok(library
                .filter(filter)
                .iter()
                .map(|bp| {
                    let colors = bp
                        .attribute_by_id("color")
                        .map(|attr| attr.recommended_values())
                        .unwrap_or_default();
                    VehicleBlueprint {
                        id: bp.id(),
                        recommended_colors: colors,
                    }
                })
                .collect())
        })
    }

    #[instrument(
        name = "real_carla_try_spawn_vehicle",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint)
    )]
    async fn try_spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Transform,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Option<ActorId>> {
        let spawned = self.with_world_mut(|world| {
            let library = world.blueprint_library();
            let mut vehicle_bp =
                library
                    .find(blueprint)
                    .ok_or_else(|| ActorFactoryError::BlueprintNotFound {
                        blueprint: blueprint.to_string(),
                    })?;
            for (key, value) in attributes {
                if !vehicle_bp.set_attribute(key, value) {
                    warn!(key, value, "failed to set vehicle attribute");
                }
            }

            // CARLA rejects spawns that collide with an existing actor
            let actor = match world.spawn_actor(&vehicle_bp, &to_carla_transform(&transform)) {
                Ok(actor) => actor,
                Err(e) => {
                    debug!(error = %e, "spawn rejected by server");
                    return Ok(None);
                }
            };

            Vehicle::try_from(actor)
                .map(Some)
                .map_err(|_| ActorFactoryError::vehicle_spawn(blueprint, "spawned actor is not a vehicle"))
        })?;

        let Some(vehicle) = spawned else {
            return Ok(None);
        };
        let actor_id = vehicle.id();
        debug!(actor_id, blueprint, "vehicle spawned");
        self.store_actor(actor_id, ActorType::Vehicle(vehicle));
        Ok(Some(actor_id))
    }

    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        let vehicle = self.vehicle(actor_id)?;
        vehicle.set_autopilot(enabled);
        debug!(actor_id, enabled, "autopilot toggled");
        Ok(())
    }

    #[instrument(name = "real_carla_managed_autopilot", skip(self, config), fields(actor_id))]
    async fn enable_managed_autopilot(
        &self,
        actor_id: ActorId,
        config: &TrafficManagerConfig,
    ) -> Result<()> {
        let vehicle = self.vehicle(actor_id)?;
        self.with_traffic_manager(|tm| {
            tm.set_global_distance_to_leading_vehicle(config.global_distance_to_leading_vehicle);
            tm.set_synchronous_mode(config.synchronous_mode);
            vehicle.set_autopilot_opt(true, tm.port());
            tm.set_auto_lane_change(&vehicle, config.auto_lane_change);
            tm.set_percentage_speed_difference(&vehicle, config.percentage_speed_difference);
            tm.set_percentage_running_light(&vehicle, config.ignore_lights_percentage);
        })?;
        info!(actor_id, "autopilot enabled through traffic manager");
        Ok(())
    }

    async fn apply_control(&self, actor_id: ActorId, control: VehicleControl) -> Result<()> {
        let vehicle = self.vehicle(actor_id)?;
        vehicle.apply_control(&CarlaVehicleControl {
            throttle: control.throttle,
            steer: control.steer,
            brake: control.brake,
            ..Default::default()
        });
        Ok(())
    }

    async fn velocity(&self, actor_id: ActorId) -> Result<Vector3> {
        let vehicle = self.vehicle(actor_id)?;
        let v = vehicle.velocity();
        Ok(Vector3::new(f64::from(v.x), f64::from(v.y), f64::from(v.z)))
    }

    #[instrument(
        name = "real_carla_spawn_sensor",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent_id: ActorId,
        attributes: &BTreeMap<String, String>,
    ) -> Result<ActorId> {
        let parent_actor = self.parent_vehicle_for_sensor(blueprint, parent_id)?;
        let sensor = self.with_world_mut(|world| {
            Self::create_sensor(
                world,
                blueprint,
                transform,
                &parent_actor,
                parent_id,
                attributes,
            )
        })?;

        let actor_id = sensor.id();

        debug!(
            actor_id,
            blueprint, parent_id, "sensor spawned and attached"
        );
        self.store_actor(actor_id, ActorType::Sensor(sensor));

        Ok(actor_id)
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let mut actors = self.actors.lock().unwrap();

        if let Some(actor) = actors.remove(&actor_id) {
            match actor {
                ActorType::Vehicle(v) => Self::destroy_vehicle_actor(v, actor_id),
                ActorType::Sensor(s) => Self::destroy_sensor_actor(s, actor_id),
            }
            debug!(actor_id, "actor destroyed");
        }

        // Idempotent: return Ok even if not exists
        Ok(())
    }

    #[instrument(name = "real_carla_actor_exists", skip(self), fields(actor_id))]
    async fn actor_exists(&self, actor_id: ActorId) -> Result<bool> {
        Ok(self.actors.lock().unwrap().contains_key(&actor_id))
    }

    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>> {
        let sensor = self.get_sensor(actor_id)?;
        Some(Box::new(CarlaSensorSource::new(sensor_id, kind, sensor)))
    }
}
