//! ESPHome 原生 API 消息定义（api.proto 中本服务用到的子集）
//!
//! 空消息（PingRequest、DeviceInfoRequest、ListEntitiesRequest 等）payload 为空，不单独定义。

/// 消息类型号（api.proto 中的 `option (id)`）
pub mod message_type {
    pub const HELLO_REQUEST: u32 = 1;
    pub const HELLO_RESPONSE: u32 = 2;
    pub const CONNECT_REQUEST: u32 = 3;
    pub const CONNECT_RESPONSE: u32 = 4;
    pub const DISCONNECT_REQUEST: u32 = 5;
    pub const DISCONNECT_RESPONSE: u32 = 6;
    pub const PING_REQUEST: u32 = 7;
    pub const PING_RESPONSE: u32 = 8;
    pub const DEVICE_INFO_REQUEST: u32 = 9;
    pub const DEVICE_INFO_RESPONSE: u32 = 10;
    pub const LIST_ENTITIES_REQUEST: u32 = 11;
    pub const LIST_ENTITIES_BINARY_SENSOR_RESPONSE: u32 = 12;
    pub const LIST_ENTITIES_COVER_RESPONSE: u32 = 13;
    pub const LIST_ENTITIES_FAN_RESPONSE: u32 = 14;
    pub const LIST_ENTITIES_LIGHT_RESPONSE: u32 = 15;
    pub const LIST_ENTITIES_SENSOR_RESPONSE: u32 = 16;
    pub const LIST_ENTITIES_SWITCH_RESPONSE: u32 = 17;
    pub const LIST_ENTITIES_TEXT_SENSOR_RESPONSE: u32 = 18;
    pub const LIST_ENTITIES_DONE_RESPONSE: u32 = 19;
    pub const SUBSCRIBE_STATES_REQUEST: u32 = 20;
    pub const BINARY_SENSOR_STATE_RESPONSE: u32 = 21;
    pub const SENSOR_STATE_RESPONSE: u32 = 25;
    pub const SWITCH_STATE_RESPONSE: u32 = 26;
    pub const TEXT_SENSOR_STATE_RESPONSE: u32 = 27;
    pub const GET_TIME_REQUEST: u32 = 36;
    pub const GET_TIME_RESPONSE: u32 = 37;
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub client_info: String,
    #[prost(uint32, tag = "2")]
    pub api_version_major: u32,
    #[prost(uint32, tag = "3")]
    pub api_version_minor: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloResponse {
    #[prost(uint32, tag = "1")]
    pub api_version_major: u32,
    #[prost(uint32, tag = "2")]
    pub api_version_minor: u32,
    #[prost(string, tag = "3")]
    pub server_info: String,
    #[prost(string, tag = "4")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectRequest {
    #[prost(string, tag = "1")]
    pub password: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectResponse {
    #[prost(bool, tag = "1")]
    pub invalid_password: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceInfoResponse {
    #[prost(bool, tag = "1")]
    pub uses_password: bool,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub mac_address: String,
    #[prost(string, tag = "4")]
    pub esphome_version: String,
    #[prost(string, tag = "5")]
    pub compilation_time: String,
    #[prost(string, tag = "6")]
    pub model: String,
}

/// 所有 ListEntities*Response 共有的前四个字段。
///
/// 二值传感器、开关、文本传感器、cover、fan、light 只关心这些字段。
#[derive(Clone, PartialEq, prost::Message)]
pub struct ListEntitiesEntityResponse {
    #[prost(string, tag = "1")]
    pub object_id: String,
    #[prost(fixed32, tag = "2")]
    pub key: u32,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub unique_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListEntitiesSensorResponse {
    #[prost(string, tag = "1")]
    pub object_id: String,
    #[prost(fixed32, tag = "2")]
    pub key: u32,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub unique_id: String,
    #[prost(string, tag = "5")]
    pub icon: String,
    #[prost(string, tag = "6")]
    pub unit_of_measurement: String,
    #[prost(int32, tag = "7")]
    pub accuracy_decimals: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorStateResponse {
    #[prost(fixed32, tag = "1")]
    pub key: u32,
    #[prost(float, tag = "2")]
    pub state: f32,
    #[prost(bool, tag = "3")]
    pub missing_state: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BinarySensorStateResponse {
    #[prost(fixed32, tag = "1")]
    pub key: u32,
    #[prost(bool, tag = "2")]
    pub state: bool,
    #[prost(bool, tag = "3")]
    pub missing_state: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SwitchStateResponse {
    #[prost(fixed32, tag = "1")]
    pub key: u32,
    #[prost(bool, tag = "2")]
    pub state: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TextSensorStateResponse {
    #[prost(fixed32, tag = "1")]
    pub key: u32,
    #[prost(string, tag = "2")]
    pub state: String,
    #[prost(bool, tag = "3")]
    pub missing_state: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetTimeResponse {
    #[prost(fixed32, tag = "1")]
    pub epoch_seconds: u32,
}
