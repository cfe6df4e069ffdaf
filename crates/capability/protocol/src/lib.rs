//! # ESPHome 原生 API 客户端
//!
//! 明文传输，每帧结构：
//!
//! ```text
//! 0x00 | varint(payload_len) | varint(message_type) | protobuf payload
//! ```
//!
//! ## 会话流程
//!
//! ```text
//! HelloRequest ──> HelloResponse
//! ConnectRequest(password) ──> ConnectResponse
//! DeviceInfoRequest ──> DeviceInfoResponse
//! ListEntitiesRequest ──> ListEntities*Response ... ListEntitiesDoneResponse
//! SubscribeStatesRequest ──> *StateResponse ...（持续）
//! ```
//!
//! 订阅期间设备可能发来 Ping / GetTime / Disconnect 请求，会话内部应答。

pub mod api;
mod client;
mod error;
mod frame;
mod messages;

pub use api::message_type;
pub use client::EsphomeClient;
pub use error::ProtocolError;
pub use frame::{Frame, MAX_FRAME_LEN, decode_frame, encode_frame};
pub use messages::StateUpdate;
