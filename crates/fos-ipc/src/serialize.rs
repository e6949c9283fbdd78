//! IPC Serialization
//!
//! Compact binary encoding for routed messages.
//! Little-endian fixed-width integers, LEB128 lengths, XOR-checksummed frames.

use thiserror::Error;

/// Largest payload a single frame may carry
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Frame header: 4-byte length + 1-byte checksum
const FRAME_HEADER_LEN: usize = 5;

/// IPC serialization trait
pub trait IpcSerialize: Sized {
    /// Append the encoded value to `buf`
    fn ipc_serialize(&self, buf: &mut Vec<u8>);

    /// Decode a value, advancing the reader past it
    fn ipc_deserialize(reader: &mut WireReader<'_>) -> Result<Self, IpcError>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.ipc_serialize(&mut buf);
        buf
    }

    /// Decode a whole buffer; leftover bytes are an error
    fn from_bytes(buf: &[u8]) -> Result<Self, IpcError> {
        let mut reader = WireReader::new(buf);
        let value = Self::ipc_deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(IpcError::TrailingBytes(reader.remaining()));
        }
        Ok(value)
    }
}

/// IPC serialization errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("buffer too short")]
    BufferTooShort,

    #[error("invalid format")]
    InvalidFormat,

    #[error("unknown message type: {0}")]
    UnknownMessageType(u16),

    #[error("invalid UTF-8")]
    InvalidUtf8,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Write variable-length integer (LEB128)
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn write_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(value as u8);
}

pub fn write_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write length-prefixed bytes
pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Write length-prefixed UTF-8 string
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

/// Cursor over an encoded buffer
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IpcError> {
        if self.remaining() < len {
            return Err(IpcError::BufferTooShort);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], IpcError> {
        let slice = self.take(N)?;
        slice.try_into().map_err(|_| IpcError::BufferTooShort)
    }

    pub fn read_u8(&mut self) -> Result<u8, IpcError> {
        Ok(self.take(1)?[0])
    }

    /// Only 0 and 1 are valid encodings
    pub fn read_bool(&mut self) -> Result<bool, IpcError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(IpcError::InvalidFormat),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, IpcError> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, IpcError> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, IpcError> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, IpcError> {
        self.take_array().map(i64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, IpcError> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, IpcError> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Read variable-length integer (LEB128)
    pub fn read_varint(&mut self) -> Result<u64, IpcError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        loop {
            if shift >= 64 {
                return Err(IpcError::InvalidFormat);
            }
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
    }

    /// Read length-prefixed bytes
    pub fn read_bytes(&mut self) -> Result<&'a [u8], IpcError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| IpcError::InvalidFormat)?;
        self.take(len)
    }

    /// Read length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<&'a str, IpcError> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| IpcError::InvalidUtf8)
    }
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Message frame with header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    /// Checksum (simple XOR)
    pub checksum: u8,
    /// Payload
    pub payload: Vec<u8>,
}

impl MessageFrame {
    /// Create from payload
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            checksum: checksum(&payload),
            payload,
        }
    }

    /// Frame an encodable message
    pub fn encode<T: IpcSerialize>(message: &T) -> Self {
        Self::new(message.to_bytes())
    }

    /// Decode the payload as a message
    pub fn decode<T: IpcSerialize>(&self) -> Result<T, IpcError> {
        T::from_bytes(&self.payload)
    }

    /// Serialize to bytes (for wire transmission)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        write_u32(&mut buf, self.payload.len() as u32);
        buf.push(self.checksum);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Deserialize one frame from the start of `buf`, returning bytes consumed
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize), IpcError> {
        let mut reader = WireReader::new(buf);
        let length = reader.read_u32()? as usize;
        if length > MAX_FRAME_LEN {
            return Err(IpcError::FrameTooLarge(length));
        }
        let expected = reader.read_u8()?;
        let payload = reader.take(length)?.to_vec();

        if checksum(&payload) != expected {
            return Err(IpcError::ChecksumMismatch);
        }

        Ok((
            Self {
                checksum: expected,
                payload,
            },
            reader.position(),
        ))
    }
}

/// Reassembles frames from a byte stream delivered in arbitrary chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete frame.
    ///
    /// A corrupt frame is discarded before the error is returned so the
    /// stream can continue with the frame after it. An oversize length
    /// cannot be skipped safely, so the whole buffer is dropped.
    pub fn next_frame(&mut self) -> Result<Option<MessageFrame>, IpcError> {
        if self.buffer.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let length = WireReader::new(&self.buffer).read_u32()? as usize;
        if length > MAX_FRAME_LEN {
            self.buffer.clear();
            return Err(IpcError::FrameTooLarge(length));
        }
        if self.buffer.len() < FRAME_HEADER_LEN + length {
            return Ok(None);
        }

        let result = MessageFrame::from_bytes(&self.buffer);
        self.buffer.drain(..FRAME_HEADER_LEN + length);
        result.map(|(frame, _)| Some(frame))
    }
}
