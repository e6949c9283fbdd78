//! fOS IPC
//!
//! Transport plumbing shared by components whose peer lives in another
//! process or privileged context.
//! - Routing identifiers that scope messages to an owning frame
//! - Compact binary wire codec (no serde on the hot path)
//! - Checksummed frames and a streaming frame decoder
//! - Unix socket channel

mod channel;
mod routing;
mod serialize;

pub use channel::{ChannelState, IpcChannel};
#[cfg(unix)]
pub use channel::IpcListener;
pub use routing::RoutingId;
pub use serialize::{
    FrameDecoder, IpcError, IpcSerialize, MAX_FRAME_LEN, MessageFrame, WireReader, write_bool,
    write_bytes, write_f32, write_f64, write_i32, write_i64, write_string, write_u8, write_u16,
    write_u32, write_varint,
};
