//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive，见 contracts::SessionBlueprint)
//! - sensor id 唯一
//! - 相机分辨率为正整数
//! - 每种传感器至多一个 (输出路径按类型命名)

use std::collections::HashSet;

use contracts::{ContractError, SessionBlueprint};
use validator::Validate;

/// 校验 SessionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sensor_ids(blueprint)?;
    validate_image_sizes(blueprint)?;
    validate_sensor_kinds(blueprint)?;
    Ok(())
}

/// 基于 derive 的字段范围校验
fn validate_fields(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|key| key.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验 sensor id 唯一性
fn validate_sensor_ids(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sensor in &blueprint.sensors {
        if !seen.insert(sensor.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("sensors[id={}]", sensor.id),
                "duplicate sensor id",
            ));
        }
    }
    Ok(())
}

/// 校验相机分辨率
fn validate_image_sizes(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    for sensor in blueprint.sensors.iter().filter(|s| s.kind.is_camera()) {
        for key in ["image_size_x", "image_size_y"] {
            if let Some(raw) = sensor.attributes.get(key) {
                match raw.parse::<u32>() {
                    Ok(size) if size > 0 => {}
                    _ => {
                        return Err(ContractError::config_validation(
                            format!("sensors[{}].attributes.{}", sensor.id, key),
                            format!("{key} must be a positive integer, got '{raw}'"),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// 每种传感器至多一个
fn validate_sensor_kinds(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sensor in &blueprint.sensors {
        if !seen.insert(sensor.kind) {
            return Err(ContractError::config_validation(
                format!("sensors[{}].kind", sensor.id),
                format!("more than one {} sensor", sensor.kind.blueprint()),
            ));
        }
    }
    Ok(())
}
