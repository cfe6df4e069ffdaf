//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 口令被设备拒绝
    #[error("invalid password")]
    InvalidPassword,

    /// 帧格式错误
    #[error("frame error: {0}")]
    Frame(String),

    /// protobuf 消息解码错误
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// 设备关闭了会话
    #[error("device disconnected")]
    Disconnected,
}
