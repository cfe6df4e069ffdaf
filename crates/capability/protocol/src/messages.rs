//! 请求构造与响应解码：api.proto 消息 ↔ 领域类型

use crate::api::{
    BinarySensorStateResponse, ConnectRequest, ConnectResponse, DeviceInfoResponse,
    GetTimeResponse, HelloRequest, HelloResponse, ListEntitiesEntityResponse,
    ListEntitiesSensorResponse, SensorStateResponse, SwitchStateResponse,
    TextSensorStateResponse, message_type::*,
};
use crate::error::ProtocolError;
use domain::{DeviceIdentity, EntityDescriptor, EntityKind, StateValue};
use prost::Message;

pub(crate) const CLIENT_INFO: &str = "esphome-relay";
pub(crate) const API_VERSION_MAJOR: u32 = 1;
pub(crate) const API_VERSION_MINOR: u32 = 9;

/// 一次状态上报
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub key: u32,
    pub value: StateValue,
    /// 设备尚无有效读数
    pub missing: bool,
}

pub(crate) fn hello_request() -> Vec<u8> {
    HelloRequest {
        client_info: CLIENT_INFO.to_string(),
        api_version_major: API_VERSION_MAJOR,
        api_version_minor: API_VERSION_MINOR,
    }
    .encode_to_vec()
}

/// HelloResponse 中的设备名
pub(crate) fn decode_hello_response(payload: &[u8]) -> Result<Option<String>, ProtocolError> {
    let hello = HelloResponse::decode(payload)?;
    Ok(non_empty(hello.name))
}

pub(crate) fn connect_request(password: &str) -> Vec<u8> {
    ConnectRequest {
        password: password.to_string(),
    }
    .encode_to_vec()
}

/// 返回 `invalid_password`
pub(crate) fn decode_connect_response(payload: &[u8]) -> Result<bool, ProtocolError> {
    Ok(ConnectResponse::decode(payload)?.invalid_password)
}

pub(crate) fn get_time_response(epoch_seconds: u32) -> Vec<u8> {
    GetTimeResponse { epoch_seconds }.encode_to_vec()
}

pub(crate) fn decode_device_info(payload: &[u8]) -> Result<DeviceIdentity, ProtocolError> {
    let info = DeviceInfoResponse::decode(payload)?;
    Ok(DeviceIdentity {
        name: info.name,
        model: non_empty(info.model),
        mac_address: non_empty(info.mac_address),
        firmware_version: non_empty(info.esphome_version),
    })
}

/// 实体列表消息的类别；非实体列表消息返回 None。
pub(crate) fn entity_kind(message_type: u32) -> Option<EntityKind> {
    match message_type {
        LIST_ENTITIES_SENSOR_RESPONSE => Some(EntityKind::Sensor),
        LIST_ENTITIES_BINARY_SENSOR_RESPONSE => Some(EntityKind::BinarySensor),
        LIST_ENTITIES_SWITCH_RESPONSE => Some(EntityKind::Switch),
        LIST_ENTITIES_TEXT_SENSOR_RESPONSE => Some(EntityKind::TextSensor),
        LIST_ENTITIES_COVER_RESPONSE | LIST_ENTITIES_FAN_RESPONSE | LIST_ENTITIES_LIGHT_RESPONSE => {
            Some(EntityKind::Other)
        }
        _ => None,
    }
}

/// 只有传感器带单位，其余类别单位为空。
pub(crate) fn decode_entity(
    kind: EntityKind,
    payload: &[u8],
) -> Result<EntityDescriptor, ProtocolError> {
    if kind == EntityKind::Sensor {
        let sensor = ListEntitiesSensorResponse::decode(payload)?;
        return Ok(EntityDescriptor {
            key: sensor.key,
            kind,
            object_id: sensor.object_id,
            name: sensor.name,
            unit_of_measurement: sensor.unit_of_measurement,
            unique_id: sensor.unique_id,
        });
    }
    let entity = ListEntitiesEntityResponse::decode(payload)?;
    Ok(EntityDescriptor {
        key: entity.key,
        kind,
        object_id: entity.object_id,
        name: entity.name,
        unit_of_measurement: String::new(),
        unique_id: entity.unique_id,
    })
}

/// 解码状态消息；不关心的状态类型返回 None。
pub(crate) fn decode_state(
    message_type: u32,
    payload: &[u8],
) -> Result<Option<StateUpdate>, ProtocolError> {
    let update = match message_type {
        SENSOR_STATE_RESPONSE => {
            let state = SensorStateResponse::decode(payload)?;
            StateUpdate {
                key: state.key,
                value: StateValue::Float(widen_f32(state.state)),
                missing: state.missing_state,
            }
        }
        BINARY_SENSOR_STATE_RESPONSE => {
            let state = BinarySensorStateResponse::decode(payload)?;
            StateUpdate {
                key: state.key,
                value: StateValue::Bool(state.state),
                missing: state.missing_state,
            }
        }
        SWITCH_STATE_RESPONSE => {
            let state = SwitchStateResponse::decode(payload)?;
            StateUpdate {
                key: state.key,
                value: StateValue::Bool(state.state),
                missing: false,
            }
        }
        TEXT_SENSOR_STATE_RESPONSE => {
            let state = TextSensorStateResponse::decode(payload)?;
            StateUpdate {
                key: state.key,
                value: StateValue::Text(state.state),
                missing: state.missing_state,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(update))
}

/// f32 → f64，保留 f32 的最短十进制表示（21.3f32 → 21.3）。
pub(crate) fn widen_f32(value: f32) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::from(value))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
