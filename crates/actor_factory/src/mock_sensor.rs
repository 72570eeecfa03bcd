//! Mock sensor implementation
//!
//! Implements `SensorSource` trait, generates simulated sensor data.
//! Used for testing and development without CARLA environment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    DvsEvent, DvsEventData, ImageData, ImageFormat, RadarData, RadarDetection, SensorDataCallback,
    SensorKind, SensorPacket, SensorPayload, SensorSource,
};
use tracing::{debug, trace};

/// Number of semantic tags the mock segmentation camera cycles through
const MOCK_TAG_COUNT: u32 = 29;

/// Mock sensor configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Send frequency (Hz)
    pub frequency_hz: f64,
    /// Image width (cameras and DVS)
    pub image_width: u32,
    /// Image height (cameras and DVS)
    pub image_height: u32,
    /// Events per DVS frame
    pub dvs_events: usize,
    /// Detections per radar frame
    pub radar_detections: usize,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 20.0,
            image_width: 80,
            image_height: 60,
            dvs_events: 32,
            radar_detections: 5,
        }
    }
}

/// Mock sensor
///
/// Generates simulated data at specified frequency in a background thread.
/// Data is sent through callback function, consistent with real CARLA sensor behavior.
pub struct MockSensor {
    sensor_id: String,
    kind: SensorKind,
    config: MockSensorConfig,
    listening: Arc<AtomicBool>,
}

impl MockSensor {
    /// Create new Mock sensor
    pub fn new(sensor_id: String, kind: SensorKind, config: MockSensorConfig) -> Self {
        Self {
            sensor_id,
            kind,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create Mock sensor with default configuration
    pub fn with_defaults(sensor_id: String, kind: SensorKind) -> Self {
        Self::new(sensor_id, kind, MockSensorConfig::default())
    }

    /// Generate simulated data payload
    pub fn generate_payload(config: &MockSensorConfig, kind: SensorKind, frame: u64) -> SensorPayload {
        let (width, height) = (config.image_width, config.image_height);
        match kind {
            SensorKind::Rgb => bgra_image(width, height, |x, y| {
                let shade = ((x + y) as u64 + frame) as u8;
                [shade, shade / 2, 255 - shade]
            }),
            SensorKind::Depth => bgra_image(width, height, |x, _| {
                // Encoded depth grows left to right, low byte first in the buffer
                let encoded = (x * 0xFFFF) / width.max(1);
                let [lo, mid, hi, _] = encoded.to_le_bytes();
                [lo, mid, hi]
            }),
            SensorKind::SemanticSegmentation => bgra_image(width, height, |_, y| {
                let tag = (y * MOCK_TAG_COUNT / height.max(1)) as u8;
                [0, 0, tag]
            }),
            SensorKind::Dvs => {
                let events = (0..config.dvs_events)
                    .map(|i| DvsEvent {
                        x: (i as u32 % width.max(1)) as u16,
                        y: ((i as u32 + frame as u32) % height.max(1)) as u16,
                        t: (frame as i64) * 1_000_000 + i as i64,
                        pol: i % 2 == 0,
                    })
                    .collect();
                SensorPayload::DvsEvents(DvsEventData {
                    width,
                    height,
                    events,
                })
            }
            SensorKind::Radar => {
                let detections = (0..config.radar_detections)
                    .map(|i| RadarDetection {
                        velocity: -(i as f32),
                        azimuth: 0.01 * i as f32,
                        altitude: -0.005 * i as f32,
                        depth: 5.0 + i as f32 * 2.5,
                    })
                    .collect();
                SensorPayload::Radar(RadarData { detections })
            }
        }
    }
}

/// Build a 4-channel image from a per-pixel function returning the first three bytes
fn bgra_image(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 3]) -> SensorPayload {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let [c0, c1, c2] = pixel(x, y);
            data.extend_from_slice(&[c0, c1, c2, 255]);
        }
    }
    SensorPayload::Image(ImageData {
        width,
        height,
        format: ImageFormat::Bgra8,
        data: Bytes::from(data),
    })
}

impl SensorSource for MockSensor {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn sensor_kind(&self) -> SensorKind {
        self.kind
    }

    fn listen(&self, callback: SensorDataCallback) {
        // Idempotent: if already listening, don't start again
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let sensor_id = self.sensor_id.clone();
        let kind = self.kind;
        let config = self.config.clone();
        let listening = self.listening.clone();

        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);

        thread::spawn(move || {
            let mut frame: u64 = 0;

            debug!(
                sensor_id = %sensor_id,
                kind = ?kind,
                frequency_hz = config.frequency_hz,
                "mock sensor started"
            );

            while listening.load(Ordering::Relaxed) {
                frame += 1;
                let timestamp = frame as f64 / config.frequency_hz;

                let packet = SensorPacket {
                    sensor_id: sensor_id.clone(),
                    kind,
                    timestamp,
                    frame,
                    payload: Self::generate_payload(&config, kind, frame),
                };

                callback(packet);

                trace!(sensor_id = %sensor_id, frame, timestamp, "mock packet sent");

                thread::sleep(interval);
            }

            debug!(sensor_id = %sensor_id, "mock sensor stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
