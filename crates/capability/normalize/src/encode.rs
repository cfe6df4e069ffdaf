use crate::NormalizeError;
use crate::resolve::EntityMap;
use domain::{DeviceIdentity, EncodedRecord, EntityDescriptor, MeasurementEvent, StateValue};

/// 行记录中的标识转义：仅把空格替换为 `\ `。
///
/// 逗号与等号不转义，与既有数据的写入格式保持一致。
pub fn escape_identifier(value: &str) -> String {
    value.replace(' ', "\\ ")
}

/// 状态值的字段文本。
///
/// - 浮点：最短往返十进制，整数值补 `.0`；非有限值为 `nan` / `inf` / `-inf`
/// - 布尔：`True` / `False`
/// - 文本：双引号包裹，`\` 与 `"` 转义
pub fn format_state_value(value: &StateValue) -> String {
    match value {
        StateValue::Float(v) if v.is_nan() => "nan".to_string(),
        StateValue::Float(v) if v.is_infinite() => {
            let text = if v.is_sign_negative() { "-inf" } else { "inf" };
            text.to_string()
        }
        StateValue::Float(v) => {
            let text = v.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{text}.0")
            }
        }
        StateValue::Bool(true) => "True".to_string(),
        StateValue::Bool(false) => "False".to_string(),
        StateValue::Text(v) => {
            let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
    }
}

/// 编码一行记录：
/// `<sensor>,device=<device>,unit_of_measurement=<unit>,unique_id=<id>  state=<value>`
pub fn encode_record(
    identity: &DeviceIdentity,
    entity: &EntityDescriptor,
    value: &StateValue,
) -> EncodedRecord {
    EncodedRecord::new(format!(
        "{},device={},unit_of_measurement={},unique_id={}  state={}",
        escape_identifier(&entity.name),
        escape_identifier(&identity.name),
        escape_identifier(&entity.unit_of_measurement),
        escape_identifier(&entity.unique_id),
        format_state_value(value),
    ))
}

/// 解析事件 key 并编码；未知 key 返回错误，不产出记录。
pub fn encode_event(
    identity: &DeviceIdentity,
    entities: &EntityMap,
    event: &MeasurementEvent,
) -> Result<EncodedRecord, NormalizeError> {
    let entity = entities.resolve(event.key)?;
    Ok(encode_record(identity, entity, &event.value))
}
