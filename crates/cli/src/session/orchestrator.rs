//! Session orchestrator - coordinates spawner, sensors, recorder and crash.
//!
//! Generic over `CarlaClient`, so the same flow runs against the real
//! server and the in-process mock.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use actor_factory::{CarlaClient, SessionSpawner, SpawnedSession};
use anyhow::{Context, Result};
use contracts::{SensorSource, SessionBlueprint};
use recorder::{write_final_velocity, Recorder};
use tracing::{debug, info, instrument, warn};

use super::{run_crash, SessionStats};

/// A connected session, ready to record
pub struct Session<C: CarlaClient> {
    blueprint: SessionBlueprint,
    spawner: SessionSpawner<C>,
    map: String,
}

impl<C: CarlaClient> Session<C> {
    /// Connect to the server and apply the weather
    #[instrument(
        name = "session_connect",
        skip(client, blueprint),
        fields(host = %blueprint.server.host, port = blueprint.server.port)
    )]
    pub async fn connect(mut client: C, blueprint: SessionBlueprint) -> Result<Self> {
        let server = &blueprint.server;
        let map = client
            .connect(
                &server.host,
                server.port,
                Duration::from_secs_f64(server.timeout_sec),
            )
            .await
            .with_context(|| {
                format!("Failed to connect to CARLA at {}:{}", server.host, server.port)
            })?;
        info!(map = %map, "Connected to CARLA server");

        client
            .set_weather(&blueprint.weather)
            .await
            .context("Failed to apply weather")?;

        let spawner = SessionSpawner::new(client, blueprint.seed);
        Ok(Self {
            blueprint,
            spawner,
            map,
        })
    }

    pub fn blueprint(&self) -> &SessionBlueprint {
        &self.blueprint
    }

    /// Underlying client
    pub fn client(&self) -> &C {
        self.spawner.client()
    }

    /// Record the session to completion
    ///
    /// `stop` cuts the recording phase or the crash hold short; the crash
    /// and velocity log are then skipped. A stop that arrives while writers
    /// drain is logged and the drain continues. Teardown always runs, and
    /// every spawned actor is destroyed before this returns.
    #[instrument(name = "session_run", skip_all, fields(map = %self.map))]
    pub async fn run(&self, stop: impl Future<Output = ()>) -> Result<SessionStats> {
        let started = Instant::now();
        tokio::pin!(stop);
        let blueprint = &self.blueprint;

        let recorder = Recorder::start(blueprint).context("Failed to prepare output")?;

        let spawned = match self.spawner.spawn_session(blueprint).await {
            Ok(spawned) => spawned,
            Err(e) => {
                finish_recorder(recorder, blueprint).await;
                return Err(e).context("Failed to spawn session actors");
            }
        };
        observability::record_traffic_spawned(spawned.traffic.spawned, spawned.traffic.skipped);

        let sources = self.listen_all(&spawned, &recorder);

        let mut stats = SessionStats {
            map: self.map.clone(),
            traffic: spawned.traffic,
            active_sensors: sources.len(),
            ..Default::default()
        };

        let recorded = self
            .record(&spawned, &recorder, stop.as_mut(), &mut stats)
            .await;

        // Teardown: sensors stop before writers drain, actors go last
        for source in &sources {
            source.stop();
        }
        drop(sources);
        debug!("Sensors stopped");

        let finish = recorder.finish(
            Duration::from_secs_f64(blueprint.recording.drain_timeout_sec),
            &blueprint.output.gif,
        );
        tokio::pin!(finish);
        let finished = tokio::select! {
            finished = &mut finish => finished,
            _ = stop.as_mut(), if !stats.interrupted => {
                warn!("Shutdown already in progress, waiting for writers to drain");
                finish.await
            }
        };

        if let Err(e) = self.spawner.teardown(&spawned.graph).await {
            warn!(error = %e, "Error during actor teardown");
        }

        recorded?;
        stats.recording = finished.context("Failed to finalize recording")?;
        stats.duration = started.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            frames_written = stats.recording.total_written(),
            frames_dropped = stats.recording.total_dropped(),
            "Session complete"
        );
        Ok(stats)
    }

    /// Attach each spawned sensor to its writer queue
    fn listen_all(
        &self,
        spawned: &SpawnedSession,
        recorder: &Recorder,
    ) -> Vec<Box<dyn SensorSource>> {
        let mut sources = Vec::with_capacity(spawned.graph.sensors.len());
        for sensor in &spawned.graph.sensors {
            let Some(callback) = recorder.callback_for(&sensor.sensor_id) else {
                warn!(sensor_id = %sensor.sensor_id, "No writer for sensor");
                continue;
            };
            match self.client().get_sensor_source(
                sensor.actor_id,
                sensor.sensor_id.clone(),
                sensor.kind,
            ) {
                Some(source) => {
                    source.listen(callback);
                    sources.push(source);
                }
                None => warn!(sensor_id = %sensor.sensor_id, "Failed to get sensor source"),
            }
        }
        info!(active_sensors = sources.len(), "Sensors listening");
        sources
    }

    /// Sleep for the recording duration, then run the crash if enabled
    ///
    /// `stop` is only polled until it fires once; `stats.interrupted`
    /// records that it did.
    async fn record<F: Future<Output = ()>>(
        &self,
        spawned: &SpawnedSession,
        recorder: &Recorder,
        mut stop: Pin<&mut F>,
        stats: &mut SessionStats,
    ) -> Result<()> {
        let blueprint = &self.blueprint;
        let duration = Duration::from_secs_f64(blueprint.recording.duration_sec);
        info!(duration_secs = duration.as_secs_f64(), "Recording");

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = stop.as_mut() => {
                warn!("Received shutdown signal, stopping recording");
                stats.interrupted = true;
            }
        }

        if !blueprint.crash.enabled || stats.interrupted {
            return Ok(());
        }
        let Some(ego_id) = spawned.graph.ego else {
            return Ok(());
        };

        let outcome = tokio::select! {
            outcome = run_crash(self.client(), ego_id, &blueprint.crash) => {
                outcome.context("Crash sequence failed")?
            }
            _ = stop.as_mut() => {
                warn!("Received shutdown signal, abandoning crash sequence");
                stats.interrupted = true;
                return Ok(());
            }
        };
        observability::record_final_speed(outcome.speed_mps);

        let path = write_final_velocity(
            recorder.layout(),
            &blueprint.output.velocity_file,
            outcome.speed_mps,
        )
        .context("Failed to write final velocity")?;
        stats.final_speed_mps = Some(outcome.speed_mps);
        stats.velocity_file = Some(path);
        Ok(())
    }
}

async fn finish_recorder(recorder: Recorder, blueprint: &SessionBlueprint) {
    let drain = Duration::from_secs_f64(blueprint.recording.drain_timeout_sec);
    if let Err(e) = recorder.finish(drain, &blueprint.output.gif).await {
        warn!(error = %e, "Error while closing writers");
    }
}
