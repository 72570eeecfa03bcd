//! Recorder - one writer per sensor, plus the end-of-session artifacts

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use contracts::{GifConfig, SensorDataCallback, SensorKind, SessionBlueprint};
use tracing::{info, instrument, warn};

use crate::error::{RecorderError, Result};
use crate::gif::{self, FrameBuffer};
use crate::handle::WriterHandle;
use crate::metrics::MetricsSnapshot;
use crate::output::OutputLayout;
use crate::writers::{DepthWriter, DvsWriter, RadarWriter, RgbWriter, SegmentationWriter};

struct SensorWriter {
    sensor_id: String,
    kind: SensorKind,
    handle: WriterHandle,
}

/// Owns the writer tasks of a recording session
///
/// Must be started from within a Tokio runtime.
pub struct Recorder {
    layout: OutputLayout,
    writers: Vec<SensorWriter>,
    frame_buffer: Option<FrameBuffer>,
}

impl Recorder {
    /// Prepare the output folders under `blueprint.output.root` and spawn writers
    pub fn start(blueprint: &SessionBlueprint) -> Result<Self> {
        Self::with_layout(blueprint, OutputLayout::new(&blueprint.output.root))
    }

    /// Same as [`Recorder::start`] with an explicit layout
    #[instrument(name = "recorder_start", skip_all, fields(root = %layout.root().display()))]
    pub fn with_layout(blueprint: &SessionBlueprint, layout: OutputLayout) -> Result<Self> {
        layout.prepare(blueprint)?;

        let frame_buffer = blueprint
            .needs_gif_frames()
            .then(|| FrameBuffer::new(blueprint.output.gif.frame_count));
        let capacity = blueprint.recording.queue_capacity;

        let mut writers = Vec::with_capacity(blueprint.sensors.len());
        for sensor in &blueprint.sensors {
            let id = sensor.id.clone();
            let handle = match sensor.kind {
                SensorKind::Rgb => WriterHandle::spawn(
                    RgbWriter::new(id.clone(), layout.clone(), frame_buffer.clone()),
                    capacity,
                ),
                SensorKind::Depth => {
                    WriterHandle::spawn(DepthWriter::new(id.clone(), layout.clone()), capacity)
                }
                SensorKind::SemanticSegmentation => WriterHandle::spawn(
                    SegmentationWriter::new(id.clone(), layout.clone()),
                    capacity,
                ),
                SensorKind::Dvs => {
                    WriterHandle::spawn(DvsWriter::new(id.clone(), layout.clone()), capacity)
                }
                SensorKind::Radar => {
                    let writer = RadarWriter::create(id.clone(), &layout).map_err(|e| {
                        RecorderError::writer_creation(&sensor.id, e.to_string())
                    })?;
                    WriterHandle::spawn(writer, capacity)
                }
            };
            writers.push(SensorWriter {
                sensor_id: id,
                kind: sensor.kind,
                handle,
            });
        }

        info!(
            writers = writers.len(),
            gif_frames = frame_buffer.as_ref().map(FrameBuffer::capacity),
            "Recorder started"
        );

        Ok(Self {
            layout,
            writers,
            frame_buffer,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Sensor ids that have a writer
    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.writers.iter().map(|w| w.sensor_id.as_str())
    }

    /// Callback feeding `sensor_id`'s writer queue
    pub fn callback_for(&self, sensor_id: &str) -> Option<SensorDataCallback> {
        self.writers
            .iter()
            .find(|w| w.sensor_id == sensor_id)
            .map(|w| w.handle.sender().callback())
    }

    /// Recent RGB frames kept for the crash clip
    pub fn frame_buffer(&self) -> Option<&FrameBuffer> {
        self.frame_buffer.as_ref()
    }

    /// Drain every writer, then assemble the crash clip if enabled
    ///
    /// Sensors must already be stopped. Each writer gets up to
    /// `drain_timeout` to write what it has queued.
    #[instrument(name = "recorder_finish", skip_all)]
    pub async fn finish(
        self,
        drain_timeout: Duration,
        gif_config: &GifConfig,
    ) -> Result<RecordingReport> {
        let mut writers = Vec::with_capacity(self.writers.len());
        for writer in self.writers {
            let metrics = Arc::clone(writer.handle.metrics());
            let drained = writer.handle.shutdown(drain_timeout).await;
            writers.push(WriterReport {
                sensor_id: writer.sensor_id,
                kind: writer.kind,
                drained,
                metrics: metrics.snapshot(),
            });
        }

        let mut report = RecordingReport {
            writers,
            gif_path: None,
            gif_frames: 0,
        };

        if let Some(buffer) = &self.frame_buffer {
            let path = self.layout.root_file(&gif_config.file_name);
            let frames = buffer.snapshot();
            report.gif_frames = gif::write_gif(&path, &frames, gif_config.frame_delay_ms)?;
            if report.gif_frames > 0 {
                report.gif_path = Some(path);
            }
        }

        let undrained = report.writers.iter().filter(|w| !w.drained).count();
        if undrained > 0 {
            warn!(undrained, "Some writers did not drain before the timeout");
        }
        info!(
            frames_written = report.total_written(),
            frames_dropped = report.total_dropped(),
            gif_frames = report.gif_frames,
            "Recorder finished"
        );
        Ok(report)
    }
}

/// Write the post-crash speed log
///
/// Format: `Final crash velocity: {speed:.2} m/s`
pub fn write_final_velocity(
    layout: &OutputLayout,
    file_name: &str,
    speed_mps: f64,
) -> Result<PathBuf> {
    let path = layout.root_file(file_name);
    fs::write(&path, format!("Final crash velocity: {speed_mps:.2} m/s\n"))
        .map_err(|e| RecorderError::io(&path, e))?;
    info!(path = %path.display(), speed_mps, "final velocity written");
    Ok(path)
}

/// Per-writer outcome
#[derive(Debug, Clone)]
pub struct WriterReport {
    pub sensor_id: String,
    pub kind: SensorKind,
    /// Finished draining before the timeout
    pub drained: bool,
    pub metrics: MetricsSnapshot,
}

/// Outcome of a recording session
#[derive(Debug, Clone, Default)]
pub struct RecordingReport {
    pub writers: Vec<WriterReport>,
    pub gif_path: Option<PathBuf>,
    pub gif_frames: usize,
}

impl RecordingReport {
    pub fn total_written(&self) -> u64 {
        self.writers.iter().map(|w| w.metrics.write_count).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.writers.iter().map(|w| w.metrics.dropped_count).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.writers.iter().map(|w| w.metrics.failure_count).sum()
    }

    pub fn writer(&self, sensor_id: &str) -> Option<&WriterReport> {
        self.writers.iter().find(|w| w.sensor_id == sensor_id)
    }
}

impl fmt::Display for RecordingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Recording Summary ===")?;
        for w in &self.writers {
            writeln!(
                f,
                "{:<14} written={} failed={} dropped={}{}",
                w.sensor_id,
                w.metrics.write_count,
                w.metrics.failure_count,
                w.metrics.dropped_count,
                if w.drained { "" } else { " (drain timed out)" }
            )?;
            writeln!(f, "  write time (ms): {}", w.metrics.write_ms)?;
        }
        match &self.gif_path {
            Some(path) => writeln!(f, "GIF: {} ({} frames)", path.display(), self.gif_frames)?,
            None => writeln!(f, "GIF: none")?,
        }
        Ok(())
    }
}
