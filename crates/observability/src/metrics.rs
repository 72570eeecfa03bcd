//! Recorder 指标收集模块
//!
//! 写入任务、交通生成与碰撞结果的运行指标。

use metrics::{counter, gauge, histogram};

/// 记录一帧写入成功及耗时
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_written;
///
/// let started = Instant::now();
/// writer.write(&packet).await?;
/// record_frame_written("rgb", started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_frame_written(writer: &str, latency_ms: f64) {
    counter!(
        "carla_recorder_frames_written_total",
        "writer" => writer.to_string()
    )
    .increment(1);

    histogram!(
        "carla_recorder_write_latency_ms",
        "writer" => writer.to_string()
    )
    .record(latency_ms);
}

/// 记录写入失败
pub fn record_write_failure(writer: &str) {
    counter!(
        "carla_recorder_write_failures_total",
        "writer" => writer.to_string()
    )
    .increment(1);
}

/// 记录因队列已满而丢弃的帧
pub fn record_frame_dropped(writer: &str) {
    counter!(
        "carla_recorder_frames_dropped_total",
        "writer" => writer.to_string()
    )
    .increment(1);
}

/// 记录写入队列深度
pub fn record_queue_depth(writer: &str, depth: usize) {
    gauge!(
        "carla_recorder_queue_depth",
        "writer" => writer.to_string()
    )
    .set(depth as f64);
}

/// 记录背景交通生成结果
pub fn record_traffic_spawned(spawned: usize, skipped: usize) {
    gauge!("carla_recorder_traffic_vehicles").set(spawned as f64);
    if skipped > 0 {
        counter!("carla_recorder_traffic_spawn_skipped_total").increment(skipped as u64);
    }
}

/// 记录碰撞后的最终速度 (m/s)
pub fn record_final_speed(speed_mps: f64) {
    gauge!("carla_recorder_final_speed_mps").set(speed_mps);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_empty_stats() {
        let stats = RunningStats::default();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.std_dev(), 0.0);
        assert_eq!(format!("{}", StatsSummary::from(&stats)), "N/A");
    }

    #[test]
    fn test_summary_display() {
        let mut stats = RunningStats::default();
        stats.push(2.0);
        stats.push(4.0);

        let output = format!("{}", StatsSummary::from(&stats));
        assert!(output.contains("min=2.000"));
        assert!(output.contains("mean=3.000"));
        assert!(output.contains("(n=2)"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // No global recorder installed: calls must not panic
        record_frame_written("rgb", 1.5);
        record_write_failure("rgb");
        record_frame_dropped("rgb");
        record_queue_depth("rgb", 3);
        record_traffic_spawned(10, 2);
        record_final_speed(12.5);
    }
}
