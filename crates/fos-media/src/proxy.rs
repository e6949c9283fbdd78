//! Remote Playback Proxy
//!
//! Local stand-in for a player that decodes and renders somewhere else.
//! Client calls become commands sent through the [`PlayerManager`];
//! notifications coming back update the mirrored state and are forwarded
//! to the client.
//!
//! State moves along three independent axes:
//! - network/ready state, written only by notifications
//! - pause/seek state, written optimistically by client calls and then
//!   confirmed or overridden by notifications
//! - draw readiness, flipped once the rendering surface reports a usable
//!   rectangle
//!
//! Nothing here blocks. Waiting on the remote side is represented by stored
//! flags (`pending_play`, `pending_seek`) that a later notification resolves.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Instant;

use url::Url;

use crate::config::ProxyConfig;
use crate::error::MediaError;
use crate::geometry::{GeometryTracker, LayerId, LayerTree, Rect, RectF, Size};
use crate::manager::PlayerManager;
use crate::protocol::{HostMessage, InitConfig, RemotePlayer};
use crate::registry::PlayerId;
use crate::types::{
    LoadTiming, LoadType, MediaContentType, MediaTime, MediaTypeMask, NetworkState, PlayerKind,
    ReadyState, TimeRanges,
};

/// Upward interface to the element that owns the player.
///
/// Every call is a notification; the element reacts on its own schedule and
/// must not call back into the proxy synchronously.
pub trait MediaPlayerClient {
    fn ready_state_changed(&mut self) {}
    fn network_state_changed(&mut self) {}
    fn duration_changed(&mut self) {}
    /// Playback position jumped (seek finished, end or loop reached)
    fn time_changed(&mut self) {}
    fn request_play(&mut self) {}
    fn request_pause(&mut self) {}
    fn request_seek(&mut self, _seconds: f64) {}
    fn size_changed(&mut self) {}
    fn repaint(&mut self) {}
    /// Install or remove the layer the video is composited into
    fn set_video_layer(&mut self, _layer: Option<LayerId>) {}
}

/// Observer used for power and resource arbitration across players
pub trait PlaybackDelegate {
    fn did_play(
        &mut self,
        player_id: PlayerId,
        has_video: bool,
        has_audio: bool,
        content_type: MediaContentType,
    );
    fn did_pause(&mut self, player_id: PlayerId);
    fn player_gone(&mut self, player_id: PlayerId);
}

/// Decides whether a load may start now. A deferred load is completed later
/// with [`RemotePlaybackProxy::run_deferred_load`].
pub trait LoadGate {
    fn should_defer(&mut self, player_id: PlayerId) -> bool;
}

/// Compositor side of the video surface
pub trait VideoCompositor: LayerTree {
    fn create_video_layer(&mut self) -> LayerId;
    fn set_layer_opaque(&mut self, layer: LayerId, opaque: bool);
    /// Transparent frame the remote renderer shows through
    fn paint_hole_frame(&mut self, size: Size);
    fn paint_black_frame(&mut self, size: Size);
}

pub struct RemotePlaybackProxy {
    player_id: PlayerId,
    manager: Rc<PlayerManager>,
    config: ProxyConfig,

    client: Box<dyn MediaPlayerClient>,
    compositor: Box<dyn VideoCompositor>,
    delegate: Option<Box<dyn PlaybackDelegate>>,
    load_gate: Option<Box<dyn LoadGate>>,

    player_kind: PlayerKind,
    deferred_init: Option<InitConfig>,

    // Declared intent
    is_paused: bool,
    playback_rate: f64,
    volume: f64,
    volume_multiplier: f64,

    // Mirrored remote state
    network_state: NetworkState,
    ready_state: ReadyState,
    duration: MediaTime,
    current_time: MediaTime,
    buffered_end: f64,
    did_loading_progress: bool,

    // Seek coordination
    is_seeking: bool,
    seek_time: MediaTime,
    pending_seek: bool,
    pending_seek_time: MediaTime,

    // Draw readiness
    is_draw_ready: bool,
    pending_play: bool,

    is_fullscreen: bool,
    has_video: bool,
    has_audio: bool,
    video_size: Size,
    natural_size: Size,
    opaque: bool,
    video_layer: Option<LayerId>,
    tracker: GeometryTracker,
    /// Latest time the owner's event loop passed in
    last_tick: Option<Instant>,
}

impl RemotePlaybackProxy {
    /// Create a proxy and register it with `manager`. The id is assigned
    /// before any command can be sent.
    pub fn new(
        manager: Rc<PlayerManager>,
        config: ProxyConfig,
        client: Box<dyn MediaPlayerClient>,
        compositor: Box<dyn VideoCompositor>,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let weak: Weak<RefCell<dyn RemotePlayer>> = weak.clone();
            let player_id = manager.register_player(weak);
            let tracker = GeometryTracker::new(config.geometry_update_interval());

            RefCell::new(Self {
                player_id,
                manager,
                config,
                client,
                compositor,
                delegate: None,
                load_gate: None,
                player_kind: PlayerKind::None,
                deferred_init: None,
                is_paused: true,
                playback_rate: 1.0,
                volume: 1.0,
                volume_multiplier: 1.0,
                network_state: NetworkState::Empty,
                ready_state: ReadyState::HaveNothing,
                duration: MediaTime::ZERO,
                current_time: MediaTime::ZERO,
                buffered_end: 0.0,
                did_loading_progress: false,
                is_seeking: false,
                seek_time: MediaTime::ZERO,
                pending_seek: false,
                pending_seek_time: MediaTime::ZERO,
                is_draw_ready: false,
                pending_play: false,
                is_fullscreen: false,
                has_video: false,
                has_audio: false,
                video_size: Size::default(),
                natural_size: Size::default(),
                opaque: false,
                video_layer: None,
                tracker,
                last_tick: None,
            })
        })
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn PlaybackDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn set_load_gate(&mut self, gate: Box<dyn LoadGate>) {
        self.load_gate = Some(gate);
    }

    fn send(&self, message: HostMessage) {
        self.manager.send(self.player_id, message);
    }

    // ---- Loading ----

    /// Start loading `url`. Only plain URL sources are supported.
    ///
    /// The load gate, if any, may defer the `Init` command; the id is
    /// already allocated either way.
    pub fn load(
        &mut self,
        load_type: LoadType,
        url: &str,
        mime_type: &str,
    ) -> Result<LoadTiming, MediaError> {
        if load_type != LoadType::Url {
            tracing::error!("{}: unsupported load type {:?}", self.player_id, load_type);
            return Err(MediaError::NotSupported(format!("load type {:?}", load_type)));
        }

        let init = InitConfig {
            kind: PlayerKind::UrlWithVideoHole,
            url: clean_url(url)?,
            mime_type: mime_type.to_string(),
            demuxer_client_id: 0,
            has_encrypted_listener_or_cdm: false,
            is_audio: mime_type.starts_with("audio/"),
            node_id: self.config.node_id,
        };

        let player_id = self.player_id;
        let defer = self
            .load_gate
            .as_mut()
            .is_some_and(|gate| gate.should_defer(player_id));
        if defer {
            tracing::info!("{}: load deferred", player_id);
            self.deferred_init = Some(init);
            return Ok(LoadTiming::Deferred);
        }

        self.send_init(init);
        Ok(LoadTiming::Immediate)
    }

    /// Complete a load the gate deferred. Returns `false` if none is waiting.
    pub fn run_deferred_load(&mut self) -> bool {
        match self.deferred_init.take() {
            Some(init) => {
                self.send_init(init);
                true
            }
            None => false,
        }
    }

    fn send_init(&mut self, init: InitConfig) {
        tracing::info!("{}: init {} ({})", self.player_id, init.url, init.mime_type);
        self.player_kind = init.kind;
        self.send(HostMessage::Init(init));
    }

    // ---- Playback control ----

    pub fn play(&mut self) {
        if self.has_video && !self.is_draw_ready {
            tracing::debug!("{}: play deferred until the surface is drawable", self.player_id);
            self.pending_play = true;
            return;
        }
        self.pending_play = false;

        self.send(HostMessage::Play);
        // Set before the remote side confirms so a quick pause/play pair
        // keeps its order.
        self.is_paused = false;
        self.report_playing();
    }

    pub fn pause(&mut self, is_user_action: bool) {
        self.pending_play = false;
        self.send(HostMessage::Pause { is_user_action });
        self.is_paused = true;
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.did_pause(self.player_id);
        }
    }

    /// System-initiated pause; ignored unless the player is healthy
    pub fn request_pause(&mut self) {
        match self.network_state {
            NetworkState::Idle | NetworkState::Loading | NetworkState::Loaded => {
                self.pause(false);
                self.client.request_pause();
            }
            state => tracing::debug!("{}: pause request ignored in {:?}", self.player_id, state),
        }
    }

    /// Seek to `seconds`. At most one seek is in flight; requests arriving
    /// meanwhile collapse into a single queued target.
    pub fn seek(&mut self, seconds: f64) {
        let target = MediaTime::from_seconds(seconds);
        if self.is_seeking {
            if target == self.seek_time {
                self.pending_seek = false;
                return;
            }
            self.pending_seek = true;
            self.pending_seek_time = target;
            return;
        }

        self.is_seeking = true;
        self.seek_time = target;
        self.send(HostMessage::Seek(target));
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
        self.send(HostMessage::SetRate(rate));
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        self.send(HostMessage::SetVolume(volume * self.volume_multiplier));
    }

    /// Pause if needed and let the remote side release its decoder.
    ///
    /// Fails without side effects when no load has established a player yet.
    pub fn suspend_and_release_resources(&mut self) -> Result<(), MediaError> {
        if self.player_kind == PlayerKind::None {
            tracing::error!("{}: suspend requested before any load", self.player_id);
            return Err(MediaError::InvalidState(
                "suspend before a player was loaded".into(),
            ));
        }

        if !self.is_paused {
            self.set_pause_state(true);
        }
        self.send(HostMessage::Suspend);
        Ok(())
    }

    pub fn resume(&mut self) {
        self.send(HostMessage::Resume);
    }

    pub fn activate(&mut self) {
        self.send(HostMessage::Activate);
    }

    pub fn deactivate(&mut self) {
        self.send(HostMessage::Deactivate);
    }

    pub fn entered_fullscreen(&mut self) {
        if self.is_fullscreen {
            return;
        }
        self.is_fullscreen = true;

        self.send(HostMessage::EnteredFullscreen);
        if self.has_video {
            self.compositor.paint_hole_frame(self.video_size);
        }
    }

    pub fn exited_fullscreen(&mut self) {
        if !self.is_fullscreen {
            return;
        }
        self.is_fullscreen = false;

        if self.has_video {
            self.compositor.paint_black_frame(self.video_size);
        }
        self.send(HostMessage::ExitedFullscreen);
        self.client.repaint();
    }

    // ---- Delegate observer ----

    pub fn on_frame_hidden(&mut self) -> Result<(), MediaError> {
        self.suspend_and_release_resources()
    }

    pub fn on_frame_shown(&mut self) {
        self.resume();
    }

    pub fn on_delegate_play(&mut self) {
        self.client.request_play();
    }

    pub fn on_delegate_pause(&mut self) {
        self.client.request_pause();
    }

    pub fn on_seek_forward(&mut self, seconds: f64) {
        if seconds < 0.0 {
            tracing::warn!("{}: negative seek step {}", self.player_id, seconds);
            return;
        }
        let target = self.current_time() + seconds;
        self.client.request_seek(target);
    }

    pub fn on_seek_backward(&mut self, seconds: f64) {
        if seconds < 0.0 {
            tracing::warn!("{}: negative seek step {}", self.player_id, seconds);
            return;
        }
        let target = self.current_time() - seconds;
        self.client.request_seek(target);
    }

    pub fn on_volume_multiplier_update(&mut self, multiplier: f64) {
        self.volume_multiplier = multiplier;
        self.set_volume(self.volume);
    }

    // ---- Compositor ----

    /// The rendering surface has a usable rectangle. Sends it right away and
    /// releases a play that was waiting for it.
    pub fn on_drawable_content_rect_changed(&mut self, rect: Rect) {
        tracing::debug!("{}: drawable rect {:?}", self.player_id, rect);
        self.is_draw_ready = true;

        self.tracker.stop();
        let rect = rect.to_rect_f();
        self.tracker.record_reported(rect);
        self.send(HostMessage::SetGeometry(rect));

        if self.pending_play {
            self.play();
        }
    }

    pub fn on_natural_size_changed(&mut self, size: Size) {
        self.natural_size = size;
        self.client.size_changed();
    }

    pub fn on_opacity_changed(&mut self, opaque: bool) {
        self.opaque = opaque;
        if let Some(layer) = self.video_layer {
            self.compositor.set_layer_opaque(layer, opaque);
        }
    }

    // ---- Geometry ----

    /// Layout pass: send the video rectangle if it moved
    pub fn on_layout(&mut self, now: Instant) {
        self.last_tick = Some(now);
        if let Some(rect) = self.tracker.on_layout(now, &*self.compositor) {
            self.send(HostMessage::SetGeometry(rect));
        }
    }

    /// Drive the re-sampling timer; call at or after [`Self::next_timer_deadline`]
    pub fn on_geometry_timer(&mut self, now: Instant) {
        self.last_tick = Some(now);
        if let Some(rect) = self.tracker.on_timer(now, &*self.compositor) {
            self.send(HostMessage::SetGeometry(rect));
        }
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    pub fn is_sampling_geometry(&self) -> bool {
        self.tracker.is_sampling()
    }

    pub fn last_reported_rect(&self) -> RectF {
        self.tracker.last_reported()
    }

    // ---- State ----

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn player_kind(&self) -> PlayerKind {
        self.player_kind
    }

    pub fn paused(&self) -> bool {
        self.is_paused
    }

    pub fn seeking(&self) -> bool {
        self.is_seeking
    }

    pub fn has_pending_seek(&self) -> bool {
        self.pending_seek
    }

    pub fn has_pending_play(&self) -> bool {
        self.pending_play
    }

    pub fn is_draw_ready(&self) -> bool {
        self.is_draw_ready
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration.as_seconds()
    }

    /// Position in seconds. While seeking this is the target the player is
    /// heading for, the queued one if any.
    pub fn current_time(&self) -> f64 {
        if self.is_seeking {
            let target = if self.pending_seek {
                self.pending_seek_time
            } else {
                self.seek_time
            };
            return target.as_seconds();
        }
        self.current_time.as_seconds()
    }

    pub fn network_state(&self) -> NetworkState {
        self.network_state
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn buffered(&self) -> TimeRanges {
        TimeRanges::single(0.0, self.buffered_end)
    }

    pub fn seekable(&self) -> TimeRanges {
        if self.ready_state < ReadyState::HaveMetadata {
            return TimeRanges::new();
        }
        TimeRanges::single(0.0, self.duration())
    }

    /// True once after each buffer update
    pub fn did_loading_progress(&mut self) -> bool {
        std::mem::take(&mut self.did_loading_progress)
    }

    pub fn has_video(&self) -> bool {
        self.has_video
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    pub fn video_layer(&self) -> Option<LayerId> {
        self.video_layer
    }

    pub fn content_type(&self) -> MediaContentType {
        MediaContentType::from_duration(self.duration, self.config.one_shot_max_duration())
    }

    fn report_playing(&mut self) {
        let content_type = self.content_type();
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.did_play(self.player_id, self.has_video, self.has_audio, content_type);
        }
    }

    fn report_paused(&mut self) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.did_pause(self.player_id);
        }
    }

    /// Adopt a pause state that did not come from the client
    fn set_pause_state(&mut self, paused: bool) {
        if self.is_paused == paused {
            return;
        }
        self.is_paused = paused;

        if paused {
            self.client.request_pause();
            self.report_paused();
        } else {
            self.client.request_play();
            self.report_playing();
        }
    }
}

/// Normalise a media URL before it is sent to the remote player
fn clean_url(raw: &str) -> Result<String, MediaError> {
    let mut url = Url::parse(raw)?;
    match url.scheme() {
        "app" => {
            tracing::error!("Unsupported media URL {}", raw);
            return Err(MediaError::NotSupported(format!("URL scheme of {}", raw)));
        }
        "file" => {
            url.set_query(None);
            url.set_fragment(None);
        }
        _ => {}
    }
    Ok(url.into())
}

impl RemotePlayer for RemotePlaybackProxy {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }

    fn on_duration_changed(&mut self, duration: MediaTime) {
        self.duration = duration;
        self.client.duration_changed();
    }

    fn on_time_update(&mut self, time: MediaTime) {
        self.current_time = time;
    }

    fn on_pause_state_changed(&mut self, paused: bool) {
        self.set_pause_state(paused);
    }

    fn on_seek_complete(&mut self) {
        tracing::debug!(
            "{}: seek to {}s complete",
            self.player_id,
            self.seek_time.as_seconds()
        );
        self.is_seeking = false;
        self.seek_time = MediaTime::ZERO;

        if std::mem::take(&mut self.pending_seek) {
            let next = self.pending_seek_time;
            self.seek(next.as_seconds());
        }

        if self.has_video {
            self.compositor.paint_hole_frame(self.video_size);
        }
        self.client.time_changed();
    }

    fn on_buffer_update(&mut self, percentage: i32) {
        self.buffered_end = self.duration() * f64::from(percentage) / 100.0;
        self.did_loading_progress = true;
    }

    fn on_time_changed(&mut self) {
        self.client.time_changed();
    }

    fn on_player_destroyed(&mut self) {
        tracing::debug!("{}: remote player destroyed", self.player_id);
    }

    fn on_ready_state_changed(&mut self, state: ReadyState) {
        self.ready_state = state;
        self.client.ready_state_changed();
    }

    fn on_network_state_changed(&mut self, state: NetworkState) {
        if state.is_error() {
            tracing::warn!("{}: network state {:?}", self.player_id, state);
        }
        self.network_state = state;
        self.client.network_state_changed();
    }

    fn on_media_data_changed(&mut self, width: i32, height: i32, media: MediaTypeMask) {
        self.video_size = Size::new(width, height);
        self.natural_size = self.video_size;
        self.has_audio = media.has_audio();
        self.has_video = media.has_video();

        if self.has_video && self.video_layer.is_none() {
            let layer = self.compositor.create_video_layer();
            self.compositor.set_layer_opaque(layer, self.opaque);
            self.video_layer = Some(layer);
            self.tracker.attach_layer(layer);
            self.client.set_video_layer(Some(layer));
        }

        if self.has_video {
            self.compositor.paint_hole_frame(self.video_size);
        }
        // Notifications carry no time; sampling is armed relative to the
        // owner's clock as of its last layout or timer call.
        let now = self.last_tick.unwrap_or_else(Instant::now);
        self.tracker.start(now);

        if self.pending_play && !self.has_video {
            self.play();
        }
    }

    fn on_seek_request(&mut self, time: MediaTime) {
        self.client.request_seek(time.as_seconds());
    }

    fn on_player_suspended(&mut self, is_preempted: bool) {
        if !self.is_paused && is_preempted {
            self.set_pause_state(true);
        }
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.player_gone(self.player_id);
        }
    }

    fn on_player_resumed(&mut self, is_preempted: bool) {
        tracing::debug!("{}: resumed (preempted: {})", self.player_id, is_preempted);
        if self.is_paused {
            self.report_paused();
        } else {
            self.report_playing();
        }
    }
}

impl Drop for RemotePlaybackProxy {
    fn drop(&mut self) {
        tracing::info!("{}: teardown", self.player_id);
        self.send(HostMessage::Teardown);
        self.manager.unregister_player(self.player_id);

        self.tracker.stop();
        if self.video_layer.take().is_some() {
            self.client.set_video_layer(None);
        }
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.player_gone(self.player_id);
        }
    }
}

impl std::fmt::Debug for RemotePlaybackProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePlaybackProxy")
            .field("player_id", &self.player_id)
            .field("player_kind", &self.player_kind)
            .field("is_paused", &self.is_paused)
            .field("is_seeking", &self.is_seeking)
            .field("network_state", &self.network_state)
            .field("ready_state", &self.ready_state)
            .finish_non_exhaustive()
    }
}
