//! 真实 CARLA 传感器的 `SensorSource` 适配 (feature `real-carla`)
//!
//! CARLA callbacks arrive on the client's own threads. Each one is converted
//! to a `SensorPacket` and passed through a [`FrameGate`] before it reaches
//! the recorder queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use carla::client::Sensor;
use contracts::{SensorDataCallback, SensorKind, SensorPacket, SensorSource};
use tracing::{debug, trace, warn};

use crate::sensor_data_converter::convert_sensor_data;

/// Decides whether a converted frame is handed to the recorder
///
/// Closed gates drop everything, so frames CARLA delivers after `stop()`
/// never reach a writer that is already draining.
#[derive(Debug, Default)]
pub struct FrameGate {
    open: AtomicBool,
    unconverted: AtomicU64,
}

impl FrameGate {
    /// Open the gate; returns false if it was already open
    pub fn open(&self) -> bool {
        !self.open.swap(true, Ordering::SeqCst)
    }

    /// Close the gate; returns false if it was already closed
    pub fn close(&self) -> bool {
        self.open.swap(false, Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Frames CARLA delivered that could not be converted
    pub fn unconverted(&self) -> u64 {
        self.unconverted.load(Ordering::Relaxed)
    }

    /// Filter one conversion result
    pub fn admit(&self, converted: Option<SensorPacket>) -> Option<SensorPacket> {
        if !self.is_open() {
            return None;
        }
        if converted.is_none() {
            self.unconverted.fetch_add(1, Ordering::Relaxed);
        }
        converted
    }
}

/// Real sensor actor feeding the recorder
pub struct CarlaSensorSource {
    sensor_id: String,
    kind: SensorKind,
    sensor: Sensor,
    gate: Arc<FrameGate>,
}

impl CarlaSensorSource {
    pub fn new(sensor_id: String, kind: SensorKind, sensor: Sensor) -> Self {
        Self {
            sensor_id,
            kind,
            sensor,
            gate: Arc::new(FrameGate::default()),
        }
    }
}

impl SensorSource for CarlaSensorSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn sensor_kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&self, callback: SensorDataCallback) {
        if !self.gate.open() {
            warn!(sensor_id = %self.sensor_id, "Sensor already listening");
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let kind = self.kind;
        let gate = self.gate.clone();
        debug!(sensor_id = %sensor_id, kind = ?kind, "Listening on CARLA sensor");

        self.sensor.listen(move |sensor_data| {
            let converted = convert_sensor_data(&sensor_id, kind, &sensor_data);
            match gate.admit(converted) {
                Some(packet) => {
                    trace!(sensor_id = %sensor_id, frame = packet.frame, "Frame received");
                    callback(packet);
                }
                None if gate.is_open() => {
                    trace!(
                        sensor_id = %sensor_id,
                        unconverted = gate.unconverted(),
                        "Unexpected sensor data, frame skipped"
                    );
                }
                None => {}
            }
        });
    }

    fn stop(&self) {
        if self.gate.close() {
            self.sensor.stop();
            debug!(
                sensor_id = %self.sensor_id,
                unconverted = self.gate.unconverted(),
                "CARLA sensor stopped"
            );
        }
    }

    fn is_listening(&self) -> bool {
        self.gate.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RadarData, SensorPayload};

    fn radar_packet(frame: u64) -> SensorPacket {
        SensorPacket {
            sensor_id: "radar".to_string(),
            kind: SensorKind::Radar,
            timestamp: frame as f64 * 0.05,
            frame,
            payload: SensorPayload::Radar(RadarData { detections: vec![] }),
        }
    }

    #[test]
    fn test_closed_gate_drops_frames() {
        let gate = FrameGate::default();
        assert!(gate.admit(Some(radar_packet(1))).is_none());

        assert!(gate.open());
        assert_eq!(gate.admit(Some(radar_packet(2))).unwrap().frame, 2);

        assert!(gate.close());
        assert!(gate.admit(Some(radar_packet(3))).is_none());
        assert_eq!(gate.unconverted(), 0);
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let gate = FrameGate::default();
        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.close());
        assert!(!gate.close());
    }

    #[test]
    fn test_unconverted_frames_counted_only_while_open() {
        let gate = FrameGate::default();
        gate.admit(None);
        assert_eq!(gate.unconverted(), 0);

        gate.open();
        gate.admit(None);
        gate.admit(None);
        assert_eq!(gate.unconverted(), 2);
    }
}
