//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::SessionBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    weather: String,
    ego: EgoInfo,
    traffic: TrafficInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensors: Vec<SensorInfo>,
    sensor_count: usize,
    recording: RecordingInfo,
}

#[derive(Serialize)]
struct ServerInfo {
    host: String,
    port: u16,
    timeout_sec: f64,
}

#[derive(Serialize)]
struct EgoInfo {
    blueprint: String,
    spawn_index: usize,
    traffic_manager: bool,
}

#[derive(Serialize)]
struct TrafficInfo {
    blueprint_filter: String,
    radius_m: f64,
    max_vehicles: usize,
}

#[derive(Serialize)]
struct SensorInfo {
    id: String,
    blueprint: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct RecordingInfo {
    duration_sec: f64,
    queue_capacity: usize,
    crash: bool,
    gif: bool,
    output_root: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let source = &args.source;
    info!(config = ?source.config, profile = ?source.profile, "Loading configuration info");

    if let Some(path) = &source.config {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
    }

    let blueprint =
        config_loader::ConfigLoader::load_or_profile(source.config.as_deref(), source.profile.into())
            .context("Failed to load configuration")?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else if args.toml {
        let toml = config_loader::ConfigLoader::to_toml(&blueprint)
            .context("Failed to serialize configuration")?;
        println!("{}", toml);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &SessionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sensors = if args.sensors {
        blueprint
            .sensors
            .iter()
            .map(|s| SensorInfo {
                id: s.id.clone(),
                blueprint: s.kind.blueprint().to_string(),
                attributes: s.attributes.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            host: blueprint.server.host.clone(),
            port: blueprint.server.port,
            timeout_sec: blueprint.server.timeout_sec,
        },
        weather: format!("{:?}", blueprint.weather),
        ego: EgoInfo {
            blueprint: blueprint.ego.blueprint.clone(),
            spawn_index: blueprint.ego.spawn_index,
            traffic_manager: blueprint.ego.traffic_manager.enabled,
        },
        traffic: TrafficInfo {
            blueprint_filter: blueprint.traffic.blueprint_filter.clone(),
            radius_m: blueprint.traffic.radius_m,
            max_vehicles: blueprint.traffic.max_vehicles,
        },
        sensors,
        sensor_count: blueprint.sensors.len(),
        recording: RecordingInfo {
            duration_sec: blueprint.recording.duration_sec,
            queue_capacity: blueprint.recording.queue_capacity,
            crash: blueprint.crash.enabled,
            gif: blueprint.needs_gif_frames(),
            output_root: blueprint.output.root.display().to_string(),
        },
    }
}

fn print_config_info(blueprint: &SessionBlueprint, args: &InfoArgs) {
    println!("=== CARLA Recorder Configuration ===\n");

    println!("Server");
    println!("   Version: {:?}", blueprint.version);
    println!(
        "   CARLA Server: {}:{} (timeout {}s)",
        blueprint.server.host, blueprint.server.port, blueprint.server.timeout_sec
    );
    let w = &blueprint.weather;
    println!(
        "   Weather: cloudiness={} precipitation={} fog={} sun_altitude={}",
        w.cloudiness, w.precipitation, w.fog_density, w.sun_altitude_angle
    );

    println!("\nEgo");
    println!("   Blueprint: {}", blueprint.ego.blueprint);
    println!("   Spawn index: {}", blueprint.ego.spawn_index);
    let tm = &blueprint.ego.traffic_manager;
    if tm.enabled {
        println!(
            "   Traffic manager: distance={}m speed_diff={}% ignore_lights={}% lane_change={}",
            tm.global_distance_to_leading_vehicle,
            tm.percentage_speed_difference,
            tm.ignore_lights_percentage,
            tm.auto_lane_change
        );
    } else {
        println!("   Autopilot: plain");
    }

    println!("\nTraffic");
    println!(
        "   Up to {} x {} within {} m",
        blueprint.traffic.max_vehicles, blueprint.traffic.blueprint_filter, blueprint.traffic.radius_m
    );

    println!("\nSensors ({})", blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        println!("   {} ({})", sensor.id, sensor.kind.blueprint());
        if args.sensors {
            for (key, value) in &sensor.attributes {
                println!("      {key} = {value}");
            }
        }
    }

    println!("\nRecording");
    println!("   Duration: {}s", blueprint.recording.duration_sec);
    println!("   Queue capacity: {}", blueprint.recording.queue_capacity);
    if blueprint.crash.enabled {
        println!(
            "   Crash: throttle={} steer={} hold={}s",
            blueprint.crash.throttle, blueprint.crash.steer, blueprint.crash.hold_sec
        );
    } else {
        println!("   Crash: disabled");
    }
    if blueprint.needs_gif_frames() {
        println!(
            "   GIF: last {} frames, {} ms each -> {}",
            blueprint.output.gif.frame_count,
            blueprint.output.gif.frame_delay_ms,
            blueprint.output.gif.file_name
        );
    }
    println!("   Output: {}", blueprint.output.root.display());

    println!();
}
