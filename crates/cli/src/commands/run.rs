//! `run` command implementation.

use anyhow::{Context, Result};
use carla_recorder::Session;
use contracts::SessionBlueprint;
use tracing::info;

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        host = %blueprint.server.host,
        port = blueprint.server.port,
        duration_sec = blueprint.recording.duration_sec,
        sensors = blueprint.sensors.len(),
        output = %blueprint.output.root.display(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if !args.mock {
        #[cfg(feature = "real-carla")]
        return run_with_client(actor_factory::RealCarlaClient::new(), blueprint).await;

        #[cfg(not(feature = "real-carla"))]
        tracing::warn!("Built without the real-carla feature, falling back to mock mode");
    }

    info!("Running in MOCK mode (no CARLA server required)");
    run_with_client(actor_factory::MockCarlaClient::new(), blueprint).await
}

async fn run_with_client<C: actor_factory::CarlaClient>(
    client: C,
    blueprint: SessionBlueprint,
) -> Result<()> {
    let session = Session::connect(client, blueprint).await?;

    info!("Starting session...");
    let stats = session
        .run(setup_shutdown_signal())
        .await
        .context("Session execution failed")?;

    stats.print_summary();
    info!("CARLA Recorder finished");
    Ok(())
}

/// Load the blueprint and apply CLI overrides
fn load_blueprint(args: &RunArgs) -> Result<SessionBlueprint> {
    let source = &args.source;
    if let Some(path) = &source.config {
        info!(config = %path.display(), "Loading configuration");
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
    } else {
        info!(profile = ?source.profile, "Using built-in profile");
    }

    let mut blueprint =
        config_loader::ConfigLoader::load_or_profile(source.config.as_deref(), source.profile.into())
            .context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding CARLA host from CLI");
        blueprint.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding CARLA port from CLI");
        blueprint.server.port = port;
    }
    if let Some(duration) = args.duration {
        blueprint.recording.duration_sec = duration;
    }
    if let Some(ref output) = args.output {
        blueprint.output.root = output.clone();
    }
    if args.seed.is_some() {
        blueprint.seed = args.seed;
    }
    if args.no_crash {
        blueprint.crash.enabled = false;
    }

    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;
    Ok(blueprint)
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed, that signal source never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SessionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!(
        "CARLA: {}:{} (timeout {}s)",
        blueprint.server.host, blueprint.server.port, blueprint.server.timeout_sec
    );
    println!(
        "Ego: {} at spawn point {} ({})",
        blueprint.ego.blueprint,
        blueprint.ego.spawn_index,
        if blueprint.ego.traffic_manager.enabled {
            "traffic manager"
        } else {
            "plain autopilot"
        }
    );
    println!(
        "Traffic: up to {} x {} within {} m",
        blueprint.traffic.max_vehicles, blueprint.traffic.blueprint_filter, blueprint.traffic.radius_m
    );
    println!("\nSensors ({}):", blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        println!("  - {} ({})", sensor.id, sensor.kind.blueprint());
    }
    println!("\nRecording: {}s", blueprint.recording.duration_sec);
    println!(
        "Crash: {}",
        if blueprint.crash.enabled { "enabled" } else { "disabled" }
    );
    println!("Output: {}", blueprint.output.root.display());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["carla-recorder", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let args = run_args(&[
            "--host",
            "carla.local",
            "--port",
            "3000",
            "--duration",
            "5",
            "--no-crash",
            "--seed",
            "11",
        ]);
        let bp = load_blueprint(&args).unwrap();
        assert_eq!(bp.server.host, "carla.local");
        assert_eq!(bp.server.port, 3000);
        assert_eq!(bp.recording.duration_sec, 5.0);
        assert!(!bp.crash.enabled);
        assert_eq!(bp.seed, Some(11));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = run_args(&["--duration", "0"]);
        assert!(load_blueprint(&args).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = run_args(&["--config", "/nonexistent/session.toml"]);
        let err = load_blueprint(&args).unwrap_err().to_string();
        assert!(err.contains("not found"), "got: {err}");
    }
}
