//! WriterHandle - one writer behind a bounded queue and its own worker task

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{FrameWriter, SensorDataCallback, SensorPacket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::WriterMetrics;

/// Cloneable sending side of a writer queue
///
/// Safe to call from the simulator's delivery threads: it never blocks and
/// never needs a runtime handle.
#[derive(Clone)]
pub struct FrameSender {
    name: Arc<str>,
    tx: mpsc::Sender<SensorPacket>,
    metrics: Arc<WriterMetrics>,
}

impl FrameSender {
    /// Enqueue a frame (non-blocking)
    ///
    /// Returns true if queued, false if the queue is full or closed (frame dropped)
    pub fn try_send(&self, packet: SensorPacket) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(p)) => {
                self.metrics.inc_dropped_count();
                observability::record_frame_dropped(&self.name);
                warn!(writer = %self.name, frame = p.frame, "Queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(p)) => {
                self.metrics.inc_dropped_count();
                debug!(writer = %self.name, frame = p.frame, "Writer closed, frame discarded");
                false
            }
        }
    }

    /// Wrap this sender as a sensor callback
    pub fn callback(&self) -> SensorDataCallback {
        let sender = self.clone();
        Arc::new(move |packet| {
            sender.try_send(packet);
        })
    }
}

/// Handle to a running writer worker
pub struct WriterHandle {
    /// Writer name
    name: String,
    /// Sending side, cloned into sensor callbacks
    sender: FrameSender,
    /// Signals the worker to stop accepting frames and drain
    shutdown_tx: oneshot::Sender<()>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl WriterHandle {
    /// Create a new WriterHandle and spawn the worker task
    pub fn spawn<W: FrameWriter + Send + 'static>(writer: W, queue_capacity: usize) -> Self {
        let name = writer.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let metrics = Arc::new(WriterMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            writer_worker(writer, rx, shutdown_rx, worker_metrics, worker_name).await;
        });

        Self {
            sender: FrameSender {
                name: Arc::from(name.as_str()),
                tx,
                metrics,
            },
            name,
            shutdown_tx,
            worker_handle,
        }
    }

    /// Get writer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<WriterMetrics> {
        &self.sender.metrics
    }

    /// A sender for this writer's queue
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Enqueue a frame (non-blocking)
    pub fn try_send(&self, packet: SensorPacket) -> bool {
        self.sender.try_send(packet)
    }

    /// Stop accepting frames, write what is queued, then flush and close
    ///
    /// Waits at most `drain_timeout`; past that the worker is aborted and
    /// `false` is returned.
    #[instrument(name = "writer_handle_shutdown", skip(self), fields(writer = %self.name))]
    pub async fn shutdown(self, drain_timeout: Duration) -> bool {
        // Receiver may already be gone if the worker panicked
        let _ = self.shutdown_tx.send(());

        let mut worker = self.worker_handle;
        match tokio::time::timeout(drain_timeout, &mut worker).await {
            Ok(Ok(())) => {
                debug!(writer = %self.name, "WriterHandle shutdown complete");
                true
            }
            Ok(Err(e)) => {
                error!(writer = %self.name, error = ?e, "Worker task panicked");
                false
            }
            Err(_) => {
                warn!(
                    writer = %self.name,
                    pending = self.sender.metrics.queue_len(),
                    "Drain timed out, aborting writer"
                );
                worker.abort();
                false
            }
        }
    }
}

async fn write_one<W: FrameWriter>(
    writer: &mut W,
    packet: SensorPacket,
    metrics: &WriterMetrics,
    name: &str,
) {
    let started = Instant::now();
    match writer.write(&packet).await {
        Ok(()) => {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            metrics.record_write(elapsed_ms);
            observability::record_frame_written(name, elapsed_ms);
        }
        Err(e) => {
            metrics.inc_failure_count();
            observability::record_write_failure(name);
            error!(
                writer = %name,
                frame = packet.frame,
                error = %e,
                "Write failed"
            );
            // Continue processing - don't crash on single failure
        }
    }
}

/// Worker task that consumes frames and writes them
#[instrument(
    name = "writer_worker_loop",
    skip(writer, rx, shutdown_rx, metrics),
    fields(writer = %name)
)]
async fn writer_worker<W: FrameWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<SensorPacket>,
    mut shutdown_rx: oneshot::Receiver<()>,
    metrics: Arc<WriterMetrics>,
    name: String,
) {
    debug!(writer = %name, "Writer worker started");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                rx.close();
                break;
            }
            packet = rx.recv() => match packet {
                Some(packet) => {
                    metrics.set_queue_len(rx.len());
                    observability::record_queue_depth(&name, rx.len());
                    write_one(&mut writer, packet, &metrics, &name).await;
                }
                None => break,
            },
        }
    }

    // Frames queued before shutdown are still written
    let mut drained = 0usize;
    while let Some(packet) = rx.recv().await {
        drained += 1;
        write_one(&mut writer, packet, &metrics, &name).await;
    }
    metrics.set_queue_len(0);

    // Cleanup
    if let Err(e) = writer.flush().await {
        error!(writer = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = writer.close().await {
        error!(writer = %name, error = %e, "Close failed on shutdown");
    }

    debug!(writer = %name, drained, "Writer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, RadarData, SensorKind, SensorPayload};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tokio::time::sleep;

    /// Mock writer for testing
    struct MockWriter {
        name: String,
        write_count: Arc<AtomicU64>,
        closed: Arc<AtomicBool>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockWriter {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                write_count: Arc::new(AtomicU64::new(0)),
                closed: Arc::new(AtomicBool::new(false)),
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl FrameWriter for MockWriter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _packet: &SensorPacket) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::writer(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn packet(frame: u64) -> SensorPacket {
        SensorPacket {
            sensor_id: "radar".to_string(),
            kind: SensorKind::Radar,
            timestamp: frame as f64,
            frame,
            payload: SensorPayload::Radar(RadarData::default()),
        }
    }

    #[tokio::test]
    async fn test_writer_handle_basic() {
        let writer = MockWriter::new("test");
        let write_count = Arc::clone(&writer.write_count);
        let closed = Arc::clone(&writer.closed);

        let handle = WriterHandle::spawn(writer, 10);

        for i in 0..5 {
            assert!(handle.try_send(packet(i)));
        }

        assert!(handle.shutdown(Duration::from_secs(5)).await);
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_writer_handle_queue_full() {
        let mut writer = MockWriter::new("slow");
        writer.delay_ms = 100; // Slow writer
        let write_count = Arc::clone(&writer.write_count);

        // Small queue capacity
        let handle = WriterHandle::spawn(writer, 2);

        // Send more than queue can hold
        let accepted = (0..10).filter(|i| handle.try_send(packet(*i))).count() as u64;

        // Some should have been dropped
        let dropped = handle.metrics().dropped_count();
        assert!(dropped > 0);
        assert_eq!(accepted + dropped, 10);

        let metrics = Arc::clone(handle.metrics());
        assert!(handle.shutdown(Duration::from_secs(5)).await);
        // Everything accepted was written during the drain
        assert_eq!(write_count.load(Ordering::Relaxed), accepted);
        assert_eq!(metrics.write_count(), accepted);
    }

    #[tokio::test]
    async fn test_sender_usable_from_plain_thread() {
        let writer = MockWriter::new("threaded");
        let write_count = Arc::clone(&writer.write_count);
        let handle = WriterHandle::spawn(writer, 64);

        let callback = handle.sender().callback();
        std::thread::spawn(move || {
            for i in 0..20 {
                callback(packet(i));
            }
        })
        .join()
        .unwrap();

        assert!(handle.shutdown(Duration::from_secs(5)).await);
        assert_eq!(write_count.load(Ordering::Relaxed), 20);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_discarded() {
        let handle = WriterHandle::spawn(MockWriter::new("late"), 4);
        let sender = handle.sender();

        assert!(handle.shutdown(Duration::from_secs(5)).await);
        assert!(!sender.try_send(packet(99)));
    }

    #[tokio::test]
    async fn test_writer_handle_failure_isolation() {
        let mut writer = MockWriter::new("failing");
        writer.should_fail = true;

        let handle = WriterHandle::spawn(writer, 10);

        for i in 0..3 {
            handle.try_send(packet(i));
        }

        // Give worker time to process
        sleep(Duration::from_millis(50)).await;

        // Should have recorded failures
        assert_eq!(handle.metrics().failure_count(), 3);

        handle.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_drain_timeout_aborts() {
        let mut writer = MockWriter::new("stuck");
        writer.delay_ms = 10_000;
        let handle = WriterHandle::spawn(writer, 4);
        handle.try_send(packet(1));
        sleep(Duration::from_millis(20)).await;

        assert!(!handle.shutdown(Duration::from_millis(50)).await);
    }
}
