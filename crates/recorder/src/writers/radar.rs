//! RadarWriter - radar_data/radar.csv
//!
//! The CSV is created with its header when the writer is built and stays
//! open until close, one row per detection.

use std::fs::File;
use std::io::BufWriter;

use contracts::{ContractError, FrameWriter, SensorPacket, SensorPayload};
use tracing::{debug, trace};

use crate::error::{RecorderError, Result};
use crate::output::OutputLayout;
use crate::writers::writer_error;

pub const RADAR_CSV_HEADER: [&str; 6] = [
    "frame",
    "object_id",
    "depth",
    "velocity",
    "azimuth",
    "altitude",
];

/// Appends one CSV row per radar detection
pub struct RadarWriter {
    name: String,
    csv: Option<csv::Writer<BufWriter<File>>>,
    rows: u64,
}

impl RadarWriter {
    /// Create `radar.csv` (truncating any previous file) and write the header
    pub fn create(name: impl Into<String>, layout: &OutputLayout) -> Result<Self> {
        let path = layout.radar_csv();
        let file = File::create(&path).map_err(|e| RecorderError::io(&path, e))?;
        let mut csv = csv::Writer::from_writer(BufWriter::new(file));
        csv.write_record(RADAR_CSV_HEADER)?;
        csv.flush().map_err(|e| RecorderError::io(&path, e))?;

        Ok(Self {
            name: name.into(),
            csv: Some(csv),
            rows: 0,
        })
    }

    /// Rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl FrameWriter for RadarWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, packet: &SensorPacket) -> std::result::Result<(), ContractError> {
        let SensorPayload::Radar(radar) = &packet.payload else {
            return Err(ContractError::UnexpectedPayload {
                writer: self.name.clone(),
                expected: "radar",
                actual: packet.payload.kind_name(),
            });
        };
        let Some(csv) = self.csv.as_mut() else {
            return Err(ContractError::writer(&self.name, "writer already closed"));
        };

        for (object_id, detection) in radar.detections.iter().enumerate() {
            csv.write_record([
                packet.frame.to_string(),
                object_id.to_string(),
                detection.depth.to_string(),
                detection.velocity.to_string(),
                detection.azimuth.to_string(),
                detection.altitude.to_string(),
            ])
            .map_err(|e| writer_error(&self.name, e))?;
            self.rows += 1;
        }

        trace!(
            writer = %self.name,
            frame = packet.frame,
            detections = radar.detections.len(),
            "radar frame written"
        );
        Ok(())
    }

    async fn flush(&mut self) -> std::result::Result<(), ContractError> {
        if let Some(csv) = self.csv.as_mut() {
            csv.flush().map_err(|e| writer_error(&self.name, e))?;
        }
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), ContractError> {
        if let Some(mut csv) = self.csv.take() {
            csv.flush().map_err(|e| writer_error(&self.name, e))?;
            debug!(writer = %self.name, rows = self.rows, "radar csv closed");
        }
        Ok(())
    }
}
