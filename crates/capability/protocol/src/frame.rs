//! 明文帧编解码

use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};

/// 明文帧前导字节；加密（noise）帧以 0x01 开头。
pub const PREAMBLE: u8 = 0x00;

/// 单帧 payload 上限，超过即为帧错误。
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const MAX_VARINT_LEN: usize = 10;

/// 一帧消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_type: u32,
    pub payload: Bytes,
}

/// 编码一帧
pub fn encode_frame(message_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.push(PREAMBLE);
    write_varint(&mut out, payload.len() as u64);
    write_varint(&mut out, u64::from(message_type));
    out.extend_from_slice(payload);
    out
}

/// 从缓冲区拆出一帧；数据不足时返回 `Ok(None)` 且不消费缓冲区。
pub fn decode_frame(buffer: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let Some(&first) = buffer.first() else {
        return Ok(None);
    };
    if first != PREAMBLE {
        return Err(ProtocolError::Frame(format!(
            "unexpected preamble 0x{first:02x} (encrypted api is not supported)"
        )));
    }
    let mut offset = 1;
    let Some((length, used)) = read_varint(&buffer[offset..])? else {
        return Ok(None);
    };
    offset += used;
    let Some((message_type, used)) = read_varint(&buffer[offset..])? else {
        return Ok(None);
    };
    offset += used;
    let length = usize::try_from(length)
        .ok()
        .filter(|length| *length <= MAX_FRAME_LEN)
        .ok_or_else(|| ProtocolError::Frame(format!("frame too large: {length}")))?;
    let message_type = u32::try_from(message_type)
        .map_err(|_| ProtocolError::Frame(format!("invalid message type: {message_type}")))?;
    let end = offset
        .checked_add(length)
        .ok_or_else(|| ProtocolError::Frame(format!("frame too large: {length}")))?;
    if buffer.len() < end {
        return Ok(None);
    }
    buffer.advance(offset);
    let payload = buffer.split_to(length).freeze();
    Ok(Some(Frame {
        message_type,
        payload,
    }))
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// 读取 varint；数据不足返回 `Ok(None)`，超过 10 字节为错误。
fn read_varint(data: &[u8]) -> Result<Option<(u64, usize)>, ProtocolError> {
    let mut value = 0u64;
    for (index, byte) in data.iter().enumerate() {
        if index >= MAX_VARINT_LEN {
            return Err(ProtocolError::Frame("varint too long".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
    }
    if data.len() >= MAX_VARINT_LEN {
        return Err(ProtocolError::Frame("varint too long".to_string()));
    }
    Ok(None)
}
