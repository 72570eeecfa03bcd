//! SessionGraph - Actor Factory output
//!
//! Owns every actor handle created for a session so teardown does not depend
//! on who spawned what.

use crate::SensorKind;

/// CARLA actor handle type
pub type ActorId = u32;

/// Sensor actor attached to the ego vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorActor {
    /// Sensor config ID
    pub sensor_id: String,
    pub kind: SensorKind,
    pub actor_id: ActorId,
}

/// Runtime actor graph of one session
#[derive(Debug, Clone, Default)]
pub struct SessionGraph {
    /// Ego vehicle
    pub ego: Option<ActorId>,

    /// Traffic vehicles, in spawn order
    pub traffic: Vec<ActorId>,

    /// Sensors attached to the ego, in spawn order
    pub sensors: Vec<SensorActor>,
}

impl SessionGraph {
    /// Create empty SessionGraph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register ego vehicle
    pub fn register_ego(&mut self, actor_id: ActorId) {
        self.ego = Some(actor_id);
    }

    /// Register traffic vehicle
    pub fn register_traffic(&mut self, actor_id: ActorId) {
        self.traffic.push(actor_id);
    }

    /// Register sensor
    pub fn register_sensor(&mut self, sensor_id: impl Into<String>, kind: SensorKind, actor_id: ActorId) {
        self.sensors.push(SensorActor {
            sensor_id: sensor_id.into(),
            kind,
            actor_id,
        });
    }

    /// Look up a sensor by config ID
    pub fn sensor(&self, sensor_id: &str) -> Option<&SensorActor> {
        self.sensors.iter().find(|s| s.sensor_id == sensor_id)
    }

    /// All actor handles in teardown order: sensors, ego, traffic
    pub fn teardown_order(&self) -> Vec<ActorId> {
        self.sensors
            .iter()
            .map(|s| s.actor_id)
            .chain(self.ego)
            .chain(self.traffic.iter().copied())
            .collect()
    }

    /// Total number of actors held
    pub fn actor_count(&self) -> usize {
        self.sensors.len() + self.traffic.len() + usize::from(self.ego.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_order_sensors_first() {
        let mut graph = SessionGraph::new();
        graph.register_ego(1);
        graph.register_traffic(2);
        graph.register_traffic(3);
        graph.register_sensor("rgb", SensorKind::Rgb, 4);
        graph.register_sensor("radar", SensorKind::Radar, 5);

        assert_eq!(graph.teardown_order(), vec![4, 5, 1, 2, 3]);
        assert_eq!(graph.actor_count(), 5);
        assert_eq!(graph.sensor("radar").map(|s| s.actor_id), Some(5));
    }

    #[test]
    fn empty_graph() {
        let graph = SessionGraph::new();
        assert!(graph.teardown_order().is_empty());
        assert_eq!(graph.actor_count(), 0);
    }
}
