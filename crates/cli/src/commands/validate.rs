//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SensorKind, SessionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    host: String,
    port: u16,
    sensor_count: usize,
    duration_sec: f64,
    crash: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    host: blueprint.server.host.clone(),
                    port: blueprint.server.port,
                    sensor_count: blueprint.sensors.len(),
                    duration_sec: blueprint.recording.duration_sec,
                    crash: blueprint.crash.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SessionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sensors.is_empty() {
        warnings.push("No sensors configured - nothing will be recorded".to_string());
    }

    if blueprint.output.gif.enabled && blueprint.sensor_of_kind(SensorKind::Rgb).is_none() {
        warnings.push("output.gif is enabled but there is no RGB camera".to_string());
    }

    if blueprint.traffic.max_vehicles == 0 {
        warnings.push("traffic.max_vehicles is 0 - no background traffic".to_string());
    }

    let gif_span_sec =
        blueprint.output.gif.frame_count as f64 * f64::from(blueprint.output.gif.frame_delay_ms)
            / 1000.0;
    if blueprint.output.gif.enabled && blueprint.recording.duration_sec < gif_span_sec {
        warnings.push(format!(
            "recording ({}s) is shorter than the GIF clip ({gif_span_sec}s)",
            blueprint.recording.duration_sec
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  CARLA: {}:{}", summary.host, summary.port);
            println!("  Sensors: {}", summary.sensor_count);
            println!("  Duration: {}s", summary.duration_sec);
            println!("  Crash: {}", summary.crash);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args_for(path: &std::path::Path) -> ValidateArgs {
        ValidateArgs {
            config: path.to_path_buf(),
            json: true,
        }
    }

    #[test]
    fn test_valid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[recording]\nduration_sec = 10.0").unwrap();

        let result = validate_config(&args_for(file.path()));
        assert!(result.valid, "error: {:?}", result.error);
        assert_eq!(result.summary.unwrap().duration_sec, 10.0);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[crash]\nthrottle = 2.0").unwrap();

        let result = validate_config(&args_for(file.path()));
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_missing_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("missing.toml");
        let result = validate_config(&args_for(&path));
        assert!(!result.valid);
    }

    #[test]
    fn test_short_recording_warns() {
        let mut bp = SessionBlueprint::full();
        bp.recording.duration_sec = 1.0;
        let warnings = collect_warnings(&bp);
        assert!(warnings.iter().any(|w| w.contains("shorter than the GIF")));
    }
}
