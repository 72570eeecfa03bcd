//! Crash sequence: take the ego off autopilot and floor it.

use std::time::Duration;

use actor_factory::{CarlaClient, Result, VehicleControl};
use contracts::{ActorId, CrashConfig, Vector3};
use tracing::{info, instrument};

/// Ego state once the crash hold has elapsed
#[derive(Debug, Clone, Copy)]
pub struct CrashOutcome {
    pub velocity: Vector3,
    /// |velocity| in m/s
    pub speed_mps: f64,
}

/// Disable autopilot, apply the configured control, hold, then read velocity
///
/// The hold is a fixed wall-clock wait; nothing checks that a collision
/// actually happened.
#[instrument(name = "crash_sequence", skip(client, config), fields(ego = ego_id))]
pub async fn run_crash<C: CarlaClient>(
    client: &C,
    ego_id: ActorId,
    config: &CrashConfig,
) -> Result<CrashOutcome> {
    client.set_autopilot(ego_id, false).await?;
    client
        .apply_control(
            ego_id,
            VehicleControl {
                throttle: config.throttle,
                steer: config.steer,
                brake: 0.0,
            },
        )
        .await?;
    info!(
        throttle = config.throttle,
        steer = config.steer,
        hold_sec = config.hold_sec,
        "Crash control applied"
    );

    tokio::time::sleep(Duration::from_secs_f64(config.hold_sec)).await;

    let velocity = client.velocity(ego_id).await?;
    let speed_mps = velocity.length();
    info!(speed_mps = format!("{speed_mps:.2}"), "Crash sequence finished");

    Ok(CrashOutcome {
        velocity,
        speed_mps,
    })
}
