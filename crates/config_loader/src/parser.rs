//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。缺省字段使用会话默认值。

use contracts::{ContractError, SessionBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<SessionBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<SessionBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<SessionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SensorKind;

    #[test]
    fn test_parse_toml_overrides() {
        let content = r#"
seed = 7

[server]
host = "10.0.0.5"
port = 3000

[recording]
duration_sec = 12.5

[[sensors]]
id = "front_rgb"
kind = "rgb"
[sensors.attributes]
image_size_x = "320"
image_size_y = "240"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.server.host, "10.0.0.5");
        assert_eq!(bp.server.port, 3000);
        assert_eq!(bp.server.timeout_sec, 10.0);
        assert_eq!(bp.recording.duration_sec, 12.5);
        assert_eq!(bp.seed, Some(7));
        assert_eq!(bp.sensors.len(), 1);
        assert_eq!(bp.sensors[0].kind, SensorKind::Rgb);
        assert_eq!(bp.sensors[0].transform.location.z, 2.4);
        assert_eq!(bp.sensors[0].attribute_u32("image_size_x"), Some(320));
    }

    #[test]
    fn test_parse_empty_toml_is_full_session() {
        let bp = parse_toml("").unwrap();
        assert_eq!(bp.sensors.len(), 5);
        assert!(bp.crash.enabled);
        assert_eq!(bp.output.gif.frame_count, 30);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "ego": { "blueprint": "vehicle.audi.tt", "traffic_manager": { "enabled": false } },
            "crash": { "enabled": false }
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.ego.blueprint, "vehicle.audi.tt");
        assert!(!bp.ego.traffic_manager.enabled);
        assert_eq!(bp.ego.traffic_manager.percentage_speed_difference, -30.0);
        assert!(!bp.crash.enabled);
        assert_eq!(bp.crash.throttle, 1.0);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_sensor_kind_rejected() {
        let content = r#"
[[sensors]]
id = "x"
kind = "lidar"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
