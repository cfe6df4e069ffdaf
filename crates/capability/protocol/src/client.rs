//! 设备会话
//!
//! ```rust,ignore
//! let mut client = EsphomeClient::connect_tcp(&endpoint).await?;
//! client.login(&endpoint.password).await?;
//! let identity = client.device_info().await?;
//! let entities = client.list_entities().await?;
//! client.subscribe_states().await?;
//! loop {
//!     let update = client.next_state().await?;
//! }
//! ```

use crate::error::ProtocolError;
use crate::frame::{Frame, decode_frame, encode_frame};
use crate::api::message_type::*;
use crate::messages::{self, StateUpdate};
use bytes::BytesMut;
use domain::{DeviceEndpoint, DeviceIdentity, EntityDescriptor};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// ESPHome 原生 API 会话（明文传输）
pub struct EsphomeClient<S> {
    stream: S,
    buffer: BytesMut,
    server_name: Option<String>,
}

impl EsphomeClient<TcpStream> {
    /// 建立 TCP 连接（不做握手）
    pub async fn connect_tcp(endpoint: &DeviceEndpoint) -> Result<Self, ProtocolError> {
        let address = endpoint.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|err| ProtocolError::Connection(format!("{address}: {err}")))?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> EsphomeClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(1024),
            server_name: None,
        }
    }

    /// Hello 握手中设备报告的名称
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Hello + Connect 握手；口令错误返回 `InvalidPassword`。
    pub async fn login(&mut self, password: &str) -> Result<(), ProtocolError> {
        self.send(HELLO_REQUEST, &messages::hello_request()).await?;
        let hello = self.expect(HELLO_RESPONSE).await?;
        self.server_name = messages::decode_hello_response(&hello.payload)?;

        self.send(CONNECT_REQUEST, &messages::connect_request(password))
            .await?;
        let connect = self.expect(CONNECT_RESPONSE).await?;
        if messages::decode_connect_response(&connect.payload)? {
            return Err(ProtocolError::InvalidPassword);
        }
        Ok(())
    }

    pub async fn device_info(&mut self) -> Result<DeviceIdentity, ProtocolError> {
        self.send(DEVICE_INFO_REQUEST, &[]).await?;
        let frame = self.expect(DEVICE_INFO_RESPONSE).await?;
        messages::decode_device_info(&frame.payload)
    }

    /// 读取实体列表直到 ListEntitiesDoneResponse。
    pub async fn list_entities(&mut self) -> Result<Vec<EntityDescriptor>, ProtocolError> {
        self.send(LIST_ENTITIES_REQUEST, &[]).await?;
        let mut entities = Vec::new();
        loop {
            let Some(frame) = self.next_message().await? else {
                continue;
            };
            if frame.message_type == LIST_ENTITIES_DONE_RESPONSE {
                return Ok(entities);
            }
            match messages::entity_kind(frame.message_type) {
                Some(kind) => entities.push(messages::decode_entity(kind, &frame.payload)?),
                None => debug!(
                    target: "relay.protocol",
                    message_type = frame.message_type,
                    "entity_listing_skipped"
                ),
            }
        }
    }

    /// 发送订阅请求；之后用 `next_state` 读取状态。
    pub async fn subscribe_states(&mut self) -> Result<(), ProtocolError> {
        self.send(SUBSCRIBE_STATES_REQUEST, &[]).await
    }

    /// 下一条状态上报；设备断开时返回 `Disconnected`。
    pub async fn next_state(&mut self) -> Result<StateUpdate, ProtocolError> {
        loop {
            let Some(frame) = self.next_message().await? else {
                continue;
            };
            if let Some(update) = messages::decode_state(frame.message_type, &frame.payload)? {
                return Ok(update);
            }
            debug!(
                target: "relay.protocol",
                message_type = frame.message_type,
                "message_ignored"
            );
        }
    }

    async fn expect(&mut self, message_type: u32) -> Result<Frame, ProtocolError> {
        loop {
            let Some(frame) = self.next_message().await? else {
                continue;
            };
            if frame.message_type == message_type {
                return Ok(frame);
            }
            debug!(
                target: "relay.protocol",
                expected = message_type,
                received = frame.message_type,
                "message_ignored"
            );
        }
    }

    /// 读取下一帧并处理设备侧请求（Ping / GetTime / Disconnect）；
    /// 已内部处理的帧返回 `Ok(None)`。
    async fn next_message(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let frame = self.read_frame().await?;
        match frame.message_type {
            PING_REQUEST => {
                self.send(PING_RESPONSE, &[]).await?;
                Ok(None)
            }
            GET_TIME_REQUEST => {
                self.send(GET_TIME_RESPONSE, &messages::get_time_response(epoch_seconds()))
                    .await?;
                Ok(None)
            }
            DISCONNECT_REQUEST => {
                self.send(DISCONNECT_RESPONSE, &[]).await?;
                Err(ProtocolError::Disconnected)
            }
            _ => Ok(Some(frame)),
        }
    }

    async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buffer)? {
                return Ok(frame);
            }
            let read = self.stream.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(ProtocolError::Disconnected);
            }
        }
    }

    async fn send(&mut self, message_type: u32, payload: &[u8]) -> Result<(), ProtocolError> {
        self.stream
            .write_all(&encode_frame(message_type, payload))
            .await?;
        self.stream.flush().await?;
        Ok(())
    }
}

fn epoch_seconds() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}
