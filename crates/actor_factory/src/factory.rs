//! SessionSpawner 核心实现
//!
//! 按顺序生成自车、周边交通与传感器，管理生命周期。

use std::collections::BTreeMap;
use std::sync::Mutex;

use contracts::{
    ActorId, EgoConfig, SensorConfig, SessionBlueprint, SessionGraph, TrafficConfig, Transform,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::{debug, error, info, instrument, warn};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};
use crate::spawn_points::{nearby_spawn_points, plan_traffic_points, select_ego_spawn};

/// 周边交通生成结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficReport {
    /// 半径内可用的出生点数 (截断前)
    pub candidates: usize,
    /// 成功生成的车辆数
    pub spawned: usize,
    /// 被跳过的车辆数 (出生点被占用或 spawn 失败)
    pub skipped: usize,
}

/// 一次会话生成的全部 actors
#[derive(Debug, Clone)]
pub struct SpawnedSession {
    pub graph: SessionGraph,
    /// 自车出生点
    pub ego_spawn: Transform,
    pub traffic: TrafficReport,
}

/// Session Spawner
///
/// 负责从 SessionBlueprint spawn 自车、交通与传感器，
/// 并提供 teardown 和回滚能力。
pub struct SessionSpawner<C: CarlaClient> {
    client: C,
    rng: Mutex<StdRng>,
}

impl<C: CarlaClient> SessionSpawner<C> {
    /// 创建新的 SessionSpawner
    ///
    /// `seed` 为 None 时使用系统熵
    pub fn new(client: C, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            client,
            rng: Mutex::new(rng),
        }
    }

    /// 底层客户端
    pub fn client(&self) -> &C {
        &self.client
    }

    /// 按蓝图生成整个会话：自车 → 交通 → 传感器
    ///
    /// # 原子性保证
    /// 自车或传感器失败时，会回滚销毁所有已创建的 actors。
    /// 单辆交通车失败只会被跳过。
    #[instrument(
        name = "session_spawner_spawn_session",
        skip(self, blueprint),
        fields(ego = %blueprint.ego.blueprint, sensors = blueprint.sensors.len())
    )]
    pub async fn spawn_session(&self, blueprint: &SessionBlueprint) -> Result<SpawnedSession> {
        let points = self.client.spawn_points().await?;
        let mut graph = SessionGraph::new();

        let (ego_id, ego_spawn) = self.spawn_ego(&blueprint.ego, &points).await?;
        graph.register_ego(ego_id);

        let traffic = match self
            .spawn_traffic(&blueprint.traffic, &points, &ego_spawn, &mut graph)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "traffic spawn failed, rolling back session");
                self.rollback(&graph).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .attach_sensors(ego_id, &blueprint.sensors, &mut graph)
            .await
        {
            warn!(error = %e, "sensor rig failed, rolling back session");
            self.rollback(&graph).await;
            return Err(e);
        }

        info!(
            ego = ego_id,
            traffic = traffic.spawned,
            sensors = graph.sensors.len(),
            "spawn_session completed successfully"
        );

        Ok(SpawnedSession {
            graph,
            ego_spawn,
            traffic,
        })
    }

    /// 生成自车并启用 autopilot
    ///
    /// 首选出生点被占用时直接失败，不会尝试其他出生点。
    #[instrument(
        name = "session_spawner_spawn_ego",
        skip(self, config, points),
        fields(blueprint = %config.blueprint, spawn_index = config.spawn_index)
    )]
    pub async fn spawn_ego(
        &self,
        config: &EgoConfig,
        points: &[Transform],
    ) -> Result<(ActorId, Transform)> {
        let spawn = {
            let mut rng = self.rng.lock().unwrap();
            select_ego_spawn(points, config.spawn_index, &mut *rng)
        }
        .ok_or(ActorFactoryError::NoSpawnPoints)?;

        let blueprints = self.client.vehicle_blueprints(&config.blueprint).await?;
        let blueprint = blueprints
            .first()
            .ok_or_else(|| ActorFactoryError::BlueprintNotFound {
                blueprint: config.blueprint.clone(),
            })?;

        let actor_id = self
            .client
            .try_spawn_vehicle(&blueprint.id, spawn, &Default::default())
            .await?
            .ok_or_else(|| {
                ActorFactoryError::vehicle_spawn("ego", "spawn point occupied")
            })?;

        let autopilot = if config.traffic_manager.enabled {
            self.client
                .enable_managed_autopilot(actor_id, &config.traffic_manager)
                .await
        } else {
            self.client.set_autopilot(actor_id, true).await
        };

        if let Err(e) = autopilot {
            warn!(actor_id, error = %e, "autopilot failed, destroying ego");
            self.destroy_actor_safe(actor_id, "ego").await;
            return Err(e);
        }

        info!(
            actor_id,
            managed = config.traffic_manager.enabled,
            "ego vehicle spawned with autopilot"
        );
        Ok((actor_id, spawn))
    }

    /// 在自车周围生成交通车辆
    ///
    /// 出生点筛选、打乱、截断后逐个尝试；失败或被占用的点会被跳过。
    /// 只有读取蓝图库失败才返回错误。
    #[instrument(
        name = "session_spawner_spawn_traffic",
        skip(self, config, points, center, graph),
        fields(radius_m = config.radius_m, max_vehicles = config.max_vehicles)
    )]
    pub async fn spawn_traffic(
        &self,
        config: &TrafficConfig,
        points: &[Transform],
        center: &Transform,
        graph: &mut SessionGraph,
    ) -> Result<TrafficReport> {
        let blueprints = self
            .client
            .vehicle_blueprints(&config.blueprint_filter)
            .await?;

        let candidates = nearby_spawn_points(points, center, config.radius_m).len();
        let planned = {
            let mut rng = self.rng.lock().unwrap();
            plan_traffic_points(
                points,
                center,
                config.radius_m,
                config.max_vehicles,
                &mut *rng,
            )
        };

        let mut report = TrafficReport {
            candidates,
            ..Default::default()
        };

        if blueprints.is_empty() {
            warn!(filter = %config.blueprint_filter, "no vehicle blueprints match filter");
            report.skipped = planned.len();
            return Ok(report);
        }

        for point in planned {
            let (blueprint_id, attributes) = {
                let mut rng = self.rng.lock().unwrap();
                let mut attributes = BTreeMap::new();
                let blueprint = blueprints.choose(&mut *rng).unwrap_or(&blueprints[0]);
                if config.randomize_color {
                    if let Some(color) = blueprint.recommended_colors.choose(&mut *rng) {
                        attributes.insert("color".to_string(), color.clone());
                    }
                }
                (blueprint.id.clone(), attributes)
            };

            match self
                .client
                .try_spawn_vehicle(&blueprint_id, point, &attributes)
                .await
            {
                Ok(Some(actor_id)) => {
                    graph.register_traffic(actor_id);
                    if let Err(e) = self.client.set_autopilot(actor_id, true).await {
                        debug!(actor_id, error = %e, "traffic autopilot failed");
                    }
                    report.spawned += 1;
                }
                Ok(None) => {
                    debug!(blueprint = %blueprint_id, "spawn point occupied, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    debug!(blueprint = %blueprint_id, error = %e, "traffic spawn failed, skipping");
                    report.skipped += 1;
                }
            }
        }

        info!(
            candidates = report.candidates,
            spawned = report.spawned,
            skipped = report.skipped,
            "traffic spawned"
        );
        Ok(report)
    }

    /// 在自车上挂载传感器
    ///
    /// 任一传感器失败时，本次已挂载的传感器会被销毁，错误向上返回。
    #[instrument(
        name = "session_spawner_attach_sensors",
        skip(self, sensors, graph),
        fields(sensor_count = sensors.len())
    )]
    pub async fn attach_sensors(
        &self,
        ego_id: ActorId,
        sensors: &[SensorConfig],
        graph: &mut SessionGraph,
    ) -> Result<()> {
        let mut attached: Vec<(String, ActorId)> = Vec::new();

        for sensor in sensors {
            match self.spawn_sensor_actor(ego_id, sensor).await {
                Ok(actor_id) => {
                    graph.register_sensor(sensor.id.clone(), sensor.kind, actor_id);
                    attached.push((sensor.id.clone(), actor_id));
                }
                Err(e) => {
                    warn!(
                        sensor_id = %sensor.id,
                        error = %e,
                        "sensor spawn failed, rolling back attached sensors"
                    );
                    for (sid, aid) in &attached {
                        self.destroy_actor_safe(*aid, sid).await;
                    }
                    graph.sensors.retain(|s| !attached.iter().any(|(_, aid)| *aid == s.actor_id));
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// 销毁 SessionGraph 中的所有 actors
    ///
    /// # 幂等性
    /// 多次调用安全，不存在的 actor 会被忽略。
    #[instrument(
        name = "session_spawner_teardown",
        skip(self, graph),
        fields(sensor_count = graph.sensors.len(), traffic_count = graph.traffic.len())
    )]
    pub async fn teardown(&self, graph: &SessionGraph) -> Result<()> {
        info!("starting teardown");

        // 先销毁 sensors
        for sensor in &graph.sensors {
            self.destroy_actor_safe(sensor.actor_id, &sensor.sensor_id)
                .await;
        }

        // 再销毁自车
        if let Some(ego) = graph.ego {
            self.destroy_actor_safe(ego, "ego").await;
        }

        // 最后销毁交通车辆
        for actor_id in &graph.traffic {
            self.destroy_actor_safe(*actor_id, "traffic").await;
        }

        info!("teardown completed");
        Ok(())
    }

    /// 回滚：销毁所有已创建的 actors
    #[instrument(
        name = "session_spawner_rollback",
        skip(self, graph),
        fields(actor_count = graph.actor_count())
    )]
    async fn rollback(&self, graph: &SessionGraph) {
        warn!("performing rollback");
        for actor_id in graph.teardown_order() {
            self.destroy_actor_safe(actor_id, "rollback").await;
        }
    }

    /// 安全销毁 actor（忽略错误，仅记录日志）
    #[instrument(
        name = "session_spawner_destroy_actor",
        skip(self, role),
        fields(role = %role)
    )]
    async fn destroy_actor_safe(&self, actor_id: ActorId, role: &str) {
        debug!(actor_id, role, "destroying actor");

        if let Err(e) = self.client.destroy_actor(actor_id).await {
            error!(
                actor_id,
                role,
                error = %e,
                "failed to destroy actor"
            );
        }
    }

    #[instrument(
        name = "session_spawner_spawn_sensor_actor",
        skip(self, config),
        fields(sensor_id = %config.id, kind = ?config.kind)
    )]
    async fn spawn_sensor_actor(&self, ego_id: ActorId, config: &SensorConfig) -> Result<ActorId> {
        self.client
            .spawn_sensor(
                config.kind.blueprint(),
                config.transform,
                ego_id,
                &config.attributes,
            )
            .await
            .map_err(|e| ActorFactoryError::sensor_spawn(&config.id, "ego", e.to_string()))
            .inspect(|&actor_id| {
                info!(actor_id, "sensor spawned and attached successfully");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::VehicleBlueprint;
    use crate::mock_client::{MockCarlaClient, MockConfig};
    use std::time::Duration;

    /// 40 points on a line, 5 m apart; index 10 sits at x = 50
    fn line_points() -> Vec<Transform> {
        (0..40)
            .map(|i| Transform::from_location(i as f64 * 5.0, 0.0, 0.5))
            .collect()
    }

    async fn connected(config: MockConfig) -> MockCarlaClient {
        let mut client = MockCarlaClient::with_config(config);
        client
            .connect("localhost", 2000, Duration::from_secs(1))
            .await
            .unwrap();
        client
    }

    fn mock_config() -> MockConfig {
        MockConfig {
            spawn_points: line_points(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_session_success() {
        let client = connected(mock_config()).await;
        let spawner = SessionSpawner::new(client, Some(7));
        let blueprint = SessionBlueprint::full();

        let session = spawner.spawn_session(&blueprint).await.unwrap();

        assert_eq!(session.ego_spawn, line_points()[10]);
        assert!(session.graph.ego.is_some());
        assert_eq!(session.graph.sensors.len(), 5);
        // points within 60 m of x=50 are x = 0..=105, minus the ego point itself
        assert_eq!(session.traffic.candidates, 21);
        assert_eq!(session.traffic.spawned, 21);
        assert_eq!(session.graph.traffic.len(), 21);
        assert_eq!(
            spawner.client().actor_count(),
            session.graph.actor_count()
        );
    }

    #[tokio::test]
    async fn test_traffic_bounded_by_max_vehicles() {
        let client = connected(mock_config()).await;
        let spawner = SessionSpawner::new(client, Some(1));
        let mut blueprint = SessionBlueprint::full();
        blueprint.traffic.max_vehicles = 4;

        let session = spawner.spawn_session(&blueprint).await.unwrap();
        assert_eq!(session.traffic.spawned, 4);
        assert_eq!(session.traffic.skipped, 0);
    }

    #[tokio::test]
    async fn test_ego_spawn_failure_aborts() {
        let mut config = mock_config();
        config.occupied_points = vec![line_points()[10]];
        let client = connected(config).await;
        let spawner = SessionSpawner::new(client, Some(1));

        let result = spawner.spawn_session(&SessionBlueprint::full()).await;

        assert!(matches!(
            result,
            Err(ActorFactoryError::VehicleSpawnFailed { .. })
        ));
        assert_eq!(spawner.client().actor_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_map_fails() {
        let client = connected(MockConfig {
            spawn_points: vec![],
            ..Default::default()
        })
        .await;
        let spawner = SessionSpawner::new(client, None);

        let result = spawner.spawn_session(&SessionBlueprint::full()).await;
        assert!(matches!(result, Err(ActorFactoryError::NoSpawnPoints)));
    }

    #[tokio::test]
    async fn test_failed_traffic_spawns_are_skipped() {
        let mut config = mock_config();
        config.blueprints = vec![VehicleBlueprint::new("vehicle.broken.car")];
        config.fail_blueprints = vec!["vehicle.broken.car".to_string()];
        // Occupy two of the candidate points as well
        config.occupied_points = vec![line_points()[11], line_points()[12]];
        let client = connected(config).await;
        let spawner = SessionSpawner::new(client, Some(3));

        let points = line_points();
        let mut graph = SessionGraph::new();

        let report = spawner
            .spawn_traffic(&TrafficConfig::default(), &points, &points[10], &mut graph)
            .await
            .unwrap();

        assert_eq!(report.candidates, 21);
        assert_eq!(report.spawned, 0);
        assert_eq!(report.skipped, 21);
        assert!(graph.traffic.is_empty());
    }

    #[tokio::test]
    async fn test_traffic_colors_come_from_recommended_values() {
        let mut config = mock_config();
        config.blueprints =
            vec![VehicleBlueprint::new("vehicle.audi.tt").with_colors(["255,0,0", "0,0,255"])];
        let client = connected(config).await;
        let spawner = SessionSpawner::new(client, Some(5));

        let points = line_points();
        let mut graph = SessionGraph::new();
        let traffic = TrafficConfig {
            max_vehicles: 6,
            ..Default::default()
        };
        spawner
            .spawn_traffic(&traffic, &points, &points[10], &mut graph)
            .await
            .unwrap();

        for actor_id in &graph.traffic {
            let color = spawner.client().actor_attribute(*actor_id, "color").unwrap();
            assert!(color == "255,0,0" || color == "0,0,255");
        }
    }

    #[tokio::test]
    async fn test_sensor_spawn_failure_rollback() {
        let mut config = mock_config();
        config.fail_sensors = vec!["sensor.other.radar".to_string()];
        let client = connected(config).await;
        let spawner = SessionSpawner::new(client, Some(1));

        let result = spawner.spawn_session(&SessionBlueprint::full()).await;

        assert!(matches!(
            result,
            Err(ActorFactoryError::SensorSpawnFailed { .. })
        ));
        // Ego, traffic and the four sensors before radar are all gone
        assert_eq!(spawner.client().actor_count(), 0);
    }

    #[tokio::test]
    async fn test_basic_profile_uses_plain_autopilot() {
        let client = connected(mock_config()).await;
        let spawner = SessionSpawner::new(client, Some(1));

        let session = spawner
            .spawn_session(&SessionBlueprint::basic())
            .await
            .unwrap();
        let ego = session.graph.ego.unwrap();

        assert!(spawner.client().is_autopilot(ego));
        assert!(!spawner.client().is_managed(ego));
        assert_eq!(session.graph.sensors.len(), 4);
    }

    #[tokio::test]
    async fn test_teardown_idempotent() {
        let client = connected(mock_config()).await;
        let spawner = SessionSpawner::new(client, Some(1));

        let session = spawner
            .spawn_session(&SessionBlueprint::full())
            .await
            .unwrap();

        // First teardown
        spawner.teardown(&session.graph).await.unwrap();
        assert_eq!(spawner.client().actor_count(), 0);

        // Second teardown should also succeed
        spawner.teardown(&session.graph).await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_continues_after_destroy_failure() {
        let client = connected(mock_config()).await;
        let spawner = SessionSpawner::new(client, Some(1));
        let session = spawner
            .spawn_session(&SessionBlueprint::full())
            .await
            .unwrap();

        let stuck = session.graph.sensors[0].actor_id;
        spawner.client().fail_destroy(stuck);

        spawner.teardown(&session.graph).await.unwrap();
        assert_eq!(spawner.client().all_actor_ids(), vec![stuck]);
    }
}
