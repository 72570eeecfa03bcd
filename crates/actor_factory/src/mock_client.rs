//! Mock CARLA 客户端
//!
//! 进程内模拟器：合成出生点、车辆蓝图和传感器，支持注入失败场景。
//! 用于单元测试，以及未启用 `real-carla` 时的端到端运行。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use contracts::{
    ActorId, SensorKind, SensorSource, TrafficManagerConfig, Transform, Vector3, WeatherParams,
};
use tracing::{debug, instrument};

use crate::client::{CarlaClient, VehicleBlueprint, VehicleControl};
use crate::error::{ActorFactoryError, Result};
use crate::mock_sensor::{MockSensor, MockSensorConfig};

/// 自动驾驶时的巡航速度 (m/s)
const MOCK_CRUISE_SPEED: f64 = 8.0;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 地图名称
    pub map_name: String,
    /// 地图出生点
    pub spawn_points: Vec<Transform>,
    /// 蓝图库中的车辆蓝图
    pub blueprints: Vec<VehicleBlueprint>,
    /// 已被占用的出生点 (try_spawn 返回 None)
    pub occupied_points: Vec<Transform>,
    /// 应该 spawn 失败的车辆蓝图
    pub fail_blueprints: Vec<String>,
    /// 应该 spawn 失败的传感器蓝图
    pub fail_sensors: Vec<String>,
    /// 应该失败的 destroy actor IDs
    pub fail_destroy: Vec<ActorId>,
    /// 全油门时的速度 (m/s)
    pub full_throttle_speed: f64,
    /// Mock 传感器参数
    pub sensor: MockSensorConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            map_name: "Town10HD_Mock".to_string(),
            spawn_points: grid_spawn_points(8, 6, 20.0),
            blueprints: default_blueprints(),
            occupied_points: Vec::new(),
            fail_blueprints: Vec::new(),
            fail_sensors: Vec::new(),
            fail_destroy: Vec::new(),
            full_throttle_speed: 25.0,
            sensor: MockSensorConfig::default(),
        }
    }
}

/// `columns × rows` 网格上的出生点
pub fn grid_spawn_points(columns: usize, rows: usize, spacing: f64) -> Vec<Transform> {
    (0..rows)
        .flat_map(|row| {
            (0..columns).map(move |col| {
                Transform::from_location(col as f64 * spacing, row as f64 * spacing, 0.5)
            })
        })
        .collect()
}

fn default_blueprints() -> Vec<VehicleBlueprint> {
    vec![
        VehicleBlueprint::new("vehicle.tesla.model3").with_colors(["17,37,103", "255,255,255"]),
        VehicleBlueprint::new("vehicle.audi.tt").with_colors(["0,0,0", "203,0,0"]),
        VehicleBlueprint::new("vehicle.lincoln.mkz_2020").with_colors(["52,53,60"]),
        VehicleBlueprint::new("vehicle.carlamotors.carlacola"),
        VehicleBlueprint::new("vehicle.kawasaki.ninja"),
    ]
}

/// fnmatch 风格的通配符匹配 (仅支持 `*`)
fn matches_filter(pattern: &str, id: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return true;
    };
    let Some(mut rest) = id.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard: exact match
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[derive(Debug, Clone)]
enum MockActorKind {
    Vehicle {
        transform: Transform,
        autopilot: bool,
        managed: bool,
        control: VehicleControl,
    },
    Sensor {
        kind: Option<SensorKind>,
    },
}

#[derive(Debug, Clone)]
struct MockActor {
    blueprint: String,
    attributes: BTreeMap<String, String>,
    kind: MockActorKind,
}

/// Mock CARLA 客户端
pub struct MockCarlaClient {
    /// 配置（可注入失败场景）
    config: MockConfig,
    /// Actor ID 计数器
    next_actor_id: AtomicU32,
    /// 已创建的 actors
    actors: Mutex<HashMap<ActorId, MockActor>>,
    /// 运行时追加的 destroy 失败列表
    fail_destroy: Mutex<Vec<ActorId>>,
    /// 连接状态
    connected: Mutex<bool>,
    /// 最近一次设置的天气
    weather: Mutex<Option<WeatherParams>>,
}

impl MockCarlaClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        let fail_destroy = config.fail_destroy.clone();
        Self {
            config,
            next_actor_id: AtomicU32::new(1000), // 从 1000 开始，便于识别
            actors: Mutex::new(HashMap::new()),
            fail_destroy: Mutex::new(fail_destroy),
            connected: Mutex::new(false),
            weather: Mutex::new(None),
        }
    }

    /// 获取当前已创建的 actor 数量
    pub fn actor_count(&self) -> usize {
        self.actors.lock().unwrap().len()
    }

    /// 获取所有已创建的 actor IDs (升序)
    pub fn all_actor_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.actors.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 使之后对该 actor 的 destroy 失败
    pub fn fail_destroy(&self, actor_id: ActorId) {
        self.fail_destroy.lock().unwrap().push(actor_id);
    }

    /// actor 的属性值
    pub fn actor_attribute(&self, actor_id: ActorId, key: &str) -> Option<String> {
        self.actors
            .lock()
            .unwrap()
            .get(&actor_id)
            .and_then(|actor| actor.attributes.get(key).cloned())
    }

    /// 车辆是否处于 autopilot
    pub fn is_autopilot(&self, actor_id: ActorId) -> bool {
        matches!(
            self.actors.lock().unwrap().get(&actor_id).map(|a| &a.kind),
            Some(MockActorKind::Vehicle { autopilot: true, .. })
        )
    }

    /// 车辆是否由交通管理器接管
    pub fn is_managed(&self, actor_id: ActorId) -> bool {
        matches!(
            self.actors.lock().unwrap().get(&actor_id).map(|a| &a.kind),
            Some(MockActorKind::Vehicle { managed: true, .. })
        )
    }

    /// 最近一次设置的天气
    pub fn weather(&self) -> Option<WeatherParams> {
        *self.weather.lock().unwrap()
    }

    fn allocate_actor_id(&self) -> ActorId {
        self.next_actor_id.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<()> {
        if *self.connected.lock().unwrap() {
            Ok(())
        } else {
            Err(ActorFactoryError::ConnectionFailed {
                message: "not connected".into(),
            })
        }
    }

    fn with_vehicle<T>(
        &self,
        actor_id: ActorId,
        f: impl FnOnce(&mut bool, &mut bool, &mut VehicleControl) -> T,
    ) -> Result<T> {
        let mut actors = self.actors.lock().unwrap();
        match actors.get_mut(&actor_id).map(|a| &mut a.kind) {
            Some(MockActorKind::Vehicle {
                autopilot,
                managed,
                control,
                ..
            }) => Ok(f(autopilot, managed, control)),
            _ => Err(ActorFactoryError::control(actor_id, "vehicle not found")),
        }
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CarlaClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self, timeout), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<String> {
        let _ = (host, port, timeout);
        *self.connected.lock().unwrap() = true;
        Ok(self.config.map_name.clone())
    }

    async fn set_weather(&self, weather: &WeatherParams) -> Result<()> {
        self.ensure_connected()?;
        *self.weather.lock().unwrap() = Some(*weather);
        Ok(())
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.ensure_connected()?;
        Ok(self.config.spawn_points.clone())
    }

    async fn vehicle_blueprints(&self, filter: &str) -> Result<Vec<VehicleBlueprint>> {
        self.ensure_connected()?;
        Ok(self
            .config
            .blueprints
            .iter()
            .filter(|bp| matches_filter(filter, &bp.id))
            .cloned()
            .collect())
    }

    #[instrument(
        name = "mock_carla_try_spawn_vehicle",
        skip(self, transform, attributes),
        fields(blueprint = %blueprint)
    )]
    async fn try_spawn_vehicle(
        &self,
        blueprint: &str,
        transform: Transform,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Option<ActorId>> {
        self.ensure_connected()?;

        if self.config.fail_blueprints.iter().any(|b| b == blueprint) {
            return Err(ActorFactoryError::vehicle_spawn(blueprint, "mock failure"));
        }

        let mut actors = self.actors.lock().unwrap();
        let occupied = self.config.occupied_points.contains(&transform)
            || actors.values().any(|actor| {
                matches!(actor.kind, MockActorKind::Vehicle { transform: t, .. } if t == transform)
            });
        if occupied {
            debug!("spawn point occupied");
            return Ok(None);
        }

        let actor_id = self.allocate_actor_id();
        actors.insert(
            actor_id,
            MockActor {
                blueprint: blueprint.to_string(),
                attributes: attributes.clone(),
                kind: MockActorKind::Vehicle {
                    transform,
                    autopilot: false,
                    managed: false,
                    control: VehicleControl::default(),
                },
            },
        );
        Ok(Some(actor_id))
    }

    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        self.with_vehicle(actor_id, |autopilot, managed, _| {
            *autopilot = enabled;
            if !enabled {
                *managed = false;
            }
        })
    }

    async fn enable_managed_autopilot(
        &self,
        actor_id: ActorId,
        config: &TrafficManagerConfig,
    ) -> Result<()> {
        let _ = config;
        self.with_vehicle(actor_id, |autopilot, managed, _| {
            *autopilot = true;
            *managed = true;
        })
    }

    async fn apply_control(&self, actor_id: ActorId, control: VehicleControl) -> Result<()> {
        self.with_vehicle(actor_id, |_, _, current| *current = control)
    }

    async fn velocity(&self, actor_id: ActorId) -> Result<Vector3> {
        let full_speed = self.config.full_throttle_speed;
        self.with_vehicle(actor_id, |autopilot, _, control| {
            if *autopilot {
                Vector3::new(MOCK_CRUISE_SPEED, 0.0, 0.0)
            } else {
                let speed = f64::from(control.throttle) * full_speed;
                let steer = f64::from(control.steer);
                Vector3::new(speed * (1.0 - steer.abs()), speed * steer, 0.0)
            }
        })
    }

    #[instrument(
        name = "mock_carla_spawn_sensor",
        skip(self, _transform, attributes),
        fields(blueprint = %blueprint, parent_id)
    )]
    async fn spawn_sensor(
        &self,
        blueprint: &str,
        _transform: Transform,
        parent_id: ActorId,
        attributes: &BTreeMap<String, String>,
    ) -> Result<ActorId> {
        self.ensure_connected()?;

        let mut actors = self.actors.lock().unwrap();

        // 验证 parent 存在
        if !actors.contains_key(&parent_id) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{}", parent_id),
                "parent actor not found",
            ));
        }

        if self.config.fail_sensors.iter().any(|b| b == blueprint) {
            return Err(ActorFactoryError::sensor_spawn(
                blueprint,
                format!("actor_{}", parent_id),
                "mock failure",
            ));
        }

        let kind = [
            SensorKind::Rgb,
            SensorKind::Depth,
            SensorKind::SemanticSegmentation,
            SensorKind::Dvs,
            SensorKind::Radar,
        ]
        .into_iter()
        .find(|kind| kind.blueprint() == blueprint);

        let actor_id = self.allocate_actor_id();
        actors.insert(
            actor_id,
            MockActor {
                blueprint: blueprint.to_string(),
                attributes: attributes.clone(),
                kind: MockActorKind::Sensor { kind },
            },
        );
        Ok(actor_id)
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        if self.fail_destroy.lock().unwrap().contains(&actor_id) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        // 幂等：即使不存在也返回 Ok
        if let Some(actor) = self.actors.lock().unwrap().remove(&actor_id) {
            debug!(blueprint = %actor.blueprint, "actor destroyed");
        }
        Ok(())
    }

    #[instrument(name = "mock_carla_actor_exists", skip(self), fields(actor_id))]
    async fn actor_exists(&self, actor_id: ActorId) -> Result<bool> {
        Ok(self.actors.lock().unwrap().contains_key(&actor_id))
    }

    fn get_sensor_source(
        &self,
        actor_id: ActorId,
        sensor_id: String,
        kind: SensorKind,
    ) -> Option<Box<dyn SensorSource>> {
        let actors = self.actors.lock().unwrap();
        match actors.get(&actor_id).map(|a| &a.kind) {
            Some(MockActorKind::Sensor { kind: Some(actual) }) if *actual == kind => Some(
                Box::new(MockSensor::new(sensor_id, kind, self.config.sensor.clone())),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn connected() -> MockCarlaClient {
        let mut client = MockCarlaClient::new();
        let map = client
            .connect("localhost", 2000, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(map, "Town10HD_Mock");
        client
    }

    #[test]
    fn test_matches_filter() {
        assert!(matches_filter("vehicle.*", "vehicle.audi.tt"));
        assert!(matches_filter("vehicle.tesla.model3", "vehicle.tesla.model3"));
        assert!(!matches_filter("vehicle.tesla.model3", "vehicle.tesla.cybertruck"));
        assert!(matches_filter("*tesla*", "vehicle.tesla.model3"));
        assert!(!matches_filter("walker.*", "vehicle.audi.tt"));
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let client = MockCarlaClient::new();
        assert!(matches!(
            client.spawn_points().await,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_spawn_vehicle_and_occupied_point() {
        let client = connected().await;
        let point = client.spawn_points().await.unwrap()[0];

        let actor_id = client
            .try_spawn_vehicle("vehicle.tesla.model3", point, &BTreeMap::new())
            .await
            .unwrap()
            .unwrap();
        assert!(actor_id >= 1000);

        // Same point is now occupied
        let second = client
            .try_spawn_vehicle("vehicle.audi.tt", point, &BTreeMap::new())
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(client.actor_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_spawn_sensor_and_source() {
        let client = connected().await;
        let point = client.spawn_points().await.unwrap()[3];
        let vehicle_id = client
            .try_spawn_vehicle("vehicle.tesla.model3", point, &BTreeMap::new())
            .await
            .unwrap()
            .unwrap();
        let sensor_id = client
            .spawn_sensor(
                "sensor.other.radar",
                Transform::default(),
                vehicle_id,
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        assert!(sensor_id > vehicle_id);
        assert_eq!(client.actor_count(), 2);

        let source = client
            .get_sensor_source(sensor_id, "radar".to_string(), SensorKind::Radar)
            .unwrap();
        assert_eq!(source.sensor_kind(), SensorKind::Radar);
        assert!(client
            .get_sensor_source(vehicle_id, "x".to_string(), SensorKind::Radar)
            .is_none());

        let received = Arc::new(Mutex::new(0u32));
        let received_clone = received.clone();
        source.listen(Arc::new(move |_| *received_clone.lock().unwrap() += 1));
        tokio::time::sleep(Duration::from_millis(80)).await;
        source.stop();
        assert!(*received.lock().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_velocity_follows_control() {
        let client = connected().await;
        let point = client.spawn_points().await.unwrap()[0];
        let id = client
            .try_spawn_vehicle("vehicle.tesla.model3", point, &BTreeMap::new())
            .await
            .unwrap()
            .unwrap();

        client.set_autopilot(id, true).await.unwrap();
        assert_eq!(client.velocity(id).await.unwrap().x, MOCK_CRUISE_SPEED);

        client.set_autopilot(id, false).await.unwrap();
        client
            .apply_control(
                id,
                VehicleControl {
                    throttle: 1.0,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let v = client.velocity(id).await.unwrap();
        assert_eq!(v.x, 25.0);
        assert_eq!(v.y, 0.0);
    }

    #[tokio::test]
    async fn test_mock_destroy_idempotent() {
        let client = connected().await;
        let point = client.spawn_points().await.unwrap()[0];
        let actor_id = client
            .try_spawn_vehicle("vehicle.tesla.model3", point, &BTreeMap::new())
            .await
            .unwrap()
            .unwrap();
        client.destroy_actor(actor_id).await.unwrap();
        // Second destroy should also succeed
        client.destroy_actor(actor_id).await.unwrap();
        assert_eq!(client.actor_count(), 0);
        assert!(!client.actor_exists(actor_id).await.unwrap());
    }
}
