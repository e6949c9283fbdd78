//! fOS Media
//!
//! Remote media playback for the fOS browser engine. Decoding and rendering
//! happen in a remote player; this crate keeps a local proxy in sync with it.
//!
//! Features:
//! - Playback proxy (play gating, optimistic pause/play, seek coalescing)
//! - Per-frame player manager and id registry
//! - Tagged message protocol with a binary wire encoding
//! - Video geometry tracking
//! - Queue and Unix socket transports

pub mod config;
pub mod error;
pub mod geometry;
pub mod manager;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod timer;
pub mod transport;
pub mod types;

pub use config::{ManagerConfig, ProxyConfig};
pub use error::{MediaError, TransportError};
pub use geometry::{
    GeometryTracker, LayerGeometry, LayerId, LayerTree, PointF, Rect, RectF, Size, SizeF,
    compute_layer_rect,
};
pub use manager::PlayerManager;
pub use protocol::{HostMessage, InitConfig, PlayerMessage, RemotePlayer, Routed, dispatch};
pub use proxy::{LoadGate, MediaPlayerClient, PlaybackDelegate, RemotePlaybackProxy, VideoCompositor};
pub use registry::{IdAllocator, PlayerId, PlayerRegistry};
pub use timer::RepeatingTimer;
pub use transport::{ChannelTransport, MediaTransport, QueueTransport};
pub use types::{
    LoadTiming, LoadType, MediaContentType, MediaTime, MediaTypeMask, NetworkState, PlayerKind,
    ReadyState, TimeRanges,
};
