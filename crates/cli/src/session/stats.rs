//! Session statistics.

use std::path::PathBuf;
use std::time::Duration;

use actor_factory::TrafficReport;
use recorder::RecordingReport;

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Map reported by the server
    pub map: String,

    /// Background traffic outcome
    pub traffic: TrafficReport,

    /// Number of sensors that delivered to a writer
    pub active_sensors: usize,

    /// Per-writer results and the GIF
    pub recording: RecordingReport,

    /// Speed after the crash hold, if the crash ran
    pub final_speed_mps: Option<f64>,

    /// Velocity log written after the crash
    pub velocity_file: Option<PathBuf>,

    /// Recording was cut short by a shutdown signal
    pub interrupted: bool,

    /// Wall-clock duration of the whole session
    pub duration: Duration,
}

impl SessionStats {
    /// Frames written per second over the whole session
    pub fn write_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.recording.total_written() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===\n");

        println!("Overview");
        println!("   Map: {}", self.map);
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Interrupted: {}", self.interrupted);
        println!("   Active sensors: {}", self.active_sensors);

        println!("\nTraffic");
        println!("   Candidate spawn points: {}", self.traffic.candidates);
        println!("   Spawned: {}", self.traffic.spawned);
        println!("   Skipped: {}", self.traffic.skipped);

        println!("\nWriters");
        for writer in &self.recording.writers {
            println!(
                "   {} ({:?}): written={} failed={} dropped={}{}",
                writer.sensor_id,
                writer.kind,
                writer.metrics.write_count,
                writer.metrics.failure_count,
                writer.metrics.dropped_count,
                if writer.drained { "" } else { " [drain timed out]" }
            );
            println!("      write time (ms): {}", writer.metrics.write_ms);
        }
        println!(
            "   Total: written={} failed={} dropped={} ({:.1} frames/s)",
            self.recording.total_written(),
            self.recording.total_failed(),
            self.recording.total_dropped(),
            self.write_rate()
        );

        println!("\nCrash");
        match self.final_speed_mps {
            Some(speed) => println!("   Final speed: {speed:.2} m/s"),
            None => println!("   Skipped"),
        }
        match &self.recording.gif_path {
            Some(path) => println!(
                "   GIF: {} ({} frames)",
                path.display(),
                self.recording.gif_frames
            ),
            None => println!("   GIF: none"),
        }

        println!();
    }
}
