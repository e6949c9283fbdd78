//! Remote Player Protocol
//!
//! The complete vocabulary exchanged with the remote player. Every message
//! travels inside a [`Routed`] envelope that names the routing scope and the
//! player it belongs to.
//!
//! Wire layout of an envelope (little-endian):
//!
//! ```text
//! tag: u16 | routing_id: u32 | player_id: u32 | fields...
//! ```
//!
//! Times are signed microseconds (`i64`), rectangles four `f32`, strings
//! LEB128-length-prefixed UTF-8.

use fos_ipc::{
    IpcError, IpcSerialize, RoutingId, WireReader, write_bool, write_f32, write_f64, write_i32,
    write_i64, write_string, write_u8, write_u16, write_u32,
};

use crate::geometry::RectF;
use crate::registry::PlayerId;
use crate::types::{MediaTime, MediaTypeMask, NetworkState, PlayerKind, ReadyState};

/// Payload of [`HostMessage::Init`]
#[derive(Debug, Clone, PartialEq)]
pub struct InitConfig {
    pub kind: PlayerKind,
    pub url: String,
    pub mime_type: String,
    pub demuxer_client_id: i32,
    pub has_encrypted_listener_or_cdm: bool,
    pub is_audio: bool,
    pub node_id: i32,
}

/// Commands sent to the remote player
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Create and bind the remote player
    Init(InitConfig),
    /// Destroy the remote player
    Teardown,
    Play,
    /// `is_user_action` only tells the remote side why (explicit pause vs.
    /// power saving)
    Pause { is_user_action: bool },
    Suspend,
    Resume,
    Activate,
    Deactivate,
    Seek(MediaTime),
    SetVolume(f64),
    SetRate(f64),
    SetGeometry(RectF),
    EnteredFullscreen,
    ExitedFullscreen,
}

/// Notifications received from the remote player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMessage {
    DurationChanged(MediaTime),
    TimeUpdate(MediaTime),
    /// Authoritative pause state
    PauseStateChanged(bool),
    SeekComplete,
    /// Buffered share of the duration, 0-100
    BufferUpdate(i32),
    /// Playback reached an end or loop boundary
    TimeChanged,
    PlayerDestroyed,
    ReadyStateChange(ReadyState),
    NetworkStateChange(NetworkState),
    MediaDataChanged {
        width: i32,
        height: i32,
        media: MediaTypeMask,
    },
    /// Seek initiated on the remote side (e.g. native controls)
    SeekRequest(MediaTime),
    PlayerSuspend { is_preempted: bool },
    PlayerResumed { is_preempted: bool },
}

/// Message addressed to one player in one routing scope
#[derive(Debug, Clone, PartialEq)]
pub struct Routed<M> {
    pub routing_id: RoutingId,
    pub player_id: PlayerId,
    pub message: M,
}

impl<M> Routed<M> {
    pub fn new(routing_id: RoutingId, player_id: PlayerId, message: M) -> Self {
        Self {
            routing_id,
            player_id,
            message,
        }
    }
}

/// Tagged body of a routed message
pub trait WireMessage: Sized {
    fn tag(&self) -> u16;

    fn write_fields(&self, buf: &mut Vec<u8>);

    fn read_fields(tag: u16, reader: &mut WireReader<'_>) -> Result<Self, IpcError>;
}

impl<M: WireMessage> IpcSerialize for Routed<M> {
    fn ipc_serialize(&self, buf: &mut Vec<u8>) {
        write_u16(buf, self.message.tag());
        write_u32(buf, self.routing_id.as_raw());
        write_u32(buf, self.player_id.as_raw());
        self.message.write_fields(buf);
    }

    fn ipc_deserialize(reader: &mut WireReader<'_>) -> Result<Self, IpcError> {
        let tag = reader.read_u16()?;
        let routing_id = RoutingId::new(reader.read_u32()?);
        let player_id = PlayerId(reader.read_u32()?);
        let message = M::read_fields(tag, reader)?;
        Ok(Self {
            routing_id,
            player_id,
            message,
        })
    }
}

fn write_time(buf: &mut Vec<u8>, time: MediaTime) {
    write_i64(buf, time.as_micros());
}

fn read_time(reader: &mut WireReader<'_>) -> Result<MediaTime, IpcError> {
    reader.read_i64().map(MediaTime::from_micros)
}

fn write_rect(buf: &mut Vec<u8>, rect: &RectF) {
    write_f32(buf, rect.x);
    write_f32(buf, rect.y);
    write_f32(buf, rect.width);
    write_f32(buf, rect.height);
}

fn read_rect(reader: &mut WireReader<'_>) -> Result<RectF, IpcError> {
    Ok(RectF::new(
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
    ))
}

impl InitConfig {
    fn write(&self, buf: &mut Vec<u8>) {
        write_u8(buf, self.kind as u8);
        write_string(buf, &self.url);
        write_string(buf, &self.mime_type);
        write_i32(buf, self.demuxer_client_id);
        write_bool(buf, self.has_encrypted_listener_or_cdm);
        write_bool(buf, self.is_audio);
        write_i32(buf, self.node_id);
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, IpcError> {
        let kind = PlayerKind::from_u8(reader.read_u8()?).ok_or(IpcError::InvalidFormat)?;
        Ok(Self {
            kind,
            url: reader.read_string()?.to_string(),
            mime_type: reader.read_string()?.to_string(),
            demuxer_client_id: reader.read_i32()?,
            has_encrypted_listener_or_cdm: reader.read_bool()?,
            is_audio: reader.read_bool()?,
            node_id: reader.read_i32()?,
        })
    }
}

impl WireMessage for HostMessage {
    fn tag(&self) -> u16 {
        match self {
            Self::Init(_) => 1,
            Self::Teardown => 2,
            Self::Play => 3,
            Self::Pause { .. } => 4,
            Self::Suspend => 5,
            Self::Resume => 6,
            Self::Activate => 7,
            Self::Deactivate => 8,
            Self::Seek(_) => 9,
            Self::SetVolume(_) => 10,
            Self::SetRate(_) => 11,
            Self::SetGeometry(_) => 12,
            Self::EnteredFullscreen => 13,
            Self::ExitedFullscreen => 14,
        }
    }

    fn write_fields(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Init(config) => config.write(buf),
            Self::Pause { is_user_action } => write_bool(buf, *is_user_action),
            Self::Seek(time) => write_time(buf, *time),
            Self::SetVolume(value) | Self::SetRate(value) => write_f64(buf, *value),
            Self::SetGeometry(rect) => write_rect(buf, rect),
            Self::Teardown
            | Self::Play
            | Self::Suspend
            | Self::Resume
            | Self::Activate
            | Self::Deactivate
            | Self::EnteredFullscreen
            | Self::ExitedFullscreen => {}
        }
    }

    fn read_fields(tag: u16, reader: &mut WireReader<'_>) -> Result<Self, IpcError> {
        Ok(match tag {
            1 => Self::Init(InitConfig::read(reader)?),
            2 => Self::Teardown,
            3 => Self::Play,
            4 => Self::Pause {
                is_user_action: reader.read_bool()?,
            },
            5 => Self::Suspend,
            6 => Self::Resume,
            7 => Self::Activate,
            8 => Self::Deactivate,
            9 => Self::Seek(read_time(reader)?),
            10 => Self::SetVolume(reader.read_f64()?),
            11 => Self::SetRate(reader.read_f64()?),
            12 => Self::SetGeometry(read_rect(reader)?),
            13 => Self::EnteredFullscreen,
            14 => Self::ExitedFullscreen,
            other => return Err(IpcError::UnknownMessageType(other)),
        })
    }
}

impl WireMessage for PlayerMessage {
    fn tag(&self) -> u16 {
        match self {
            Self::DurationChanged(_) => 101,
            Self::TimeUpdate(_) => 102,
            Self::PauseStateChanged(_) => 103,
            Self::SeekComplete => 104,
            Self::BufferUpdate(_) => 105,
            Self::TimeChanged => 106,
            Self::PlayerDestroyed => 107,
            Self::ReadyStateChange(_) => 108,
            Self::NetworkStateChange(_) => 109,
            Self::MediaDataChanged { .. } => 110,
            Self::SeekRequest(_) => 111,
            Self::PlayerSuspend { .. } => 112,
            Self::PlayerResumed { .. } => 113,
        }
    }

    fn write_fields(&self, buf: &mut Vec<u8>) {
        match self {
            Self::DurationChanged(time) | Self::TimeUpdate(time) | Self::SeekRequest(time) => {
                write_time(buf, *time)
            }
            Self::PauseStateChanged(paused) => write_bool(buf, *paused),
            Self::BufferUpdate(percentage) => write_i32(buf, *percentage),
            Self::ReadyStateChange(state) => write_u8(buf, *state as u8),
            Self::NetworkStateChange(state) => write_u8(buf, *state as u8),
            Self::MediaDataChanged {
                width,
                height,
                media,
            } => {
                write_i32(buf, *width);
                write_i32(buf, *height);
                write_i32(buf, media.0);
            }
            Self::PlayerSuspend { is_preempted } | Self::PlayerResumed { is_preempted } => {
                write_bool(buf, *is_preempted)
            }
            Self::SeekComplete | Self::TimeChanged | Self::PlayerDestroyed => {}
        }
    }

    fn read_fields(tag: u16, reader: &mut WireReader<'_>) -> Result<Self, IpcError> {
        Ok(match tag {
            101 => Self::DurationChanged(read_time(reader)?),
            102 => Self::TimeUpdate(read_time(reader)?),
            103 => Self::PauseStateChanged(reader.read_bool()?),
            104 => Self::SeekComplete,
            105 => Self::BufferUpdate(reader.read_i32()?),
            106 => Self::TimeChanged,
            107 => Self::PlayerDestroyed,
            108 => Self::ReadyStateChange(
                ReadyState::from_u8(reader.read_u8()?).ok_or(IpcError::InvalidFormat)?,
            ),
            109 => Self::NetworkStateChange(
                NetworkState::from_u8(reader.read_u8()?).ok_or(IpcError::InvalidFormat)?,
            ),
            110 => Self::MediaDataChanged {
                width: reader.read_i32()?,
                height: reader.read_i32()?,
                media: MediaTypeMask(reader.read_i32()?),
            },
            111 => Self::SeekRequest(read_time(reader)?),
            112 => Self::PlayerSuspend {
                is_preempted: reader.read_bool()?,
            },
            113 => Self::PlayerResumed {
                is_preempted: reader.read_bool()?,
            },
            other => return Err(IpcError::UnknownMessageType(other)),
        })
    }
}

/// Receiving end of [`PlayerMessage`]s: what a local player must handle to
/// mirror a remote one
pub trait RemotePlayer {
    fn player_id(&self) -> PlayerId;

    fn on_duration_changed(&mut self, duration: MediaTime);
    fn on_time_update(&mut self, time: MediaTime);
    fn on_pause_state_changed(&mut self, paused: bool);
    fn on_seek_complete(&mut self);
    fn on_buffer_update(&mut self, percentage: i32);
    fn on_time_changed(&mut self);
    fn on_player_destroyed(&mut self);
    fn on_ready_state_changed(&mut self, state: ReadyState);
    fn on_network_state_changed(&mut self, state: NetworkState);
    fn on_media_data_changed(&mut self, width: i32, height: i32, media: MediaTypeMask);
    fn on_seek_request(&mut self, time: MediaTime);
    fn on_player_suspended(&mut self, is_preempted: bool);
    fn on_player_resumed(&mut self, is_preempted: bool);
}

/// Route one notification to its handler
pub fn dispatch<P: RemotePlayer + ?Sized>(player: &mut P, message: PlayerMessage) {
    match message {
        PlayerMessage::DurationChanged(duration) => player.on_duration_changed(duration),
        PlayerMessage::TimeUpdate(time) => player.on_time_update(time),
        PlayerMessage::PauseStateChanged(paused) => player.on_pause_state_changed(paused),
        PlayerMessage::SeekComplete => player.on_seek_complete(),
        PlayerMessage::BufferUpdate(percentage) => player.on_buffer_update(percentage),
        PlayerMessage::TimeChanged => player.on_time_changed(),
        PlayerMessage::PlayerDestroyed => player.on_player_destroyed(),
        PlayerMessage::ReadyStateChange(state) => player.on_ready_state_changed(state),
        PlayerMessage::NetworkStateChange(state) => player.on_network_state_changed(state),
        PlayerMessage::MediaDataChanged {
            width,
            height,
            media,
        } => player.on_media_data_changed(width, height, media),
        PlayerMessage::SeekRequest(time) => player.on_seek_request(time),
        PlayerMessage::PlayerSuspend { is_preempted } => player.on_player_suspended(is_preempted),
        PlayerMessage::PlayerResumed { is_preempted } => player.on_player_resumed(is_preempted),
    }
}
