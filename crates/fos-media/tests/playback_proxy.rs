//! Playback proxy tests - proxy, manager and transport together
//!
//! The remote player is played by a `QueueTransport`: commands are taken
//! from its outbound queue, notifications are delivered into its inbound
//! queue and routed through `PlayerManager::process_incoming`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use fos_ipc::RoutingId;
use fos_media::{
    HostMessage, IdAllocator, LayerGeometry, LayerId, LayerTree, LoadGate, LoadTiming, LoadType,
    MediaContentType, MediaError, MediaPlayerClient, MediaTime, MediaTypeMask, NetworkState,
    PlaybackDelegate, PlayerId, PlayerManager, PlayerMessage, PointF, ProxyConfig, QueueTransport,
    ReadyState, Rect, RectF, RemotePlaybackProxy, Routed, Size, SizeF, VideoCompositor,
};

const ROUTE: RoutingId = RoutingId(3);

type Log = Rc<RefCell<Vec<String>>>;

struct RecordingClient(Log);

impl MediaPlayerClient for RecordingClient {
    fn ready_state_changed(&mut self) {
        self.0.borrow_mut().push("client ready_state_changed".into());
    }
    fn network_state_changed(&mut self) {
        self.0.borrow_mut().push("client network_state_changed".into());
    }
    fn duration_changed(&mut self) {
        self.0.borrow_mut().push("client duration_changed".into());
    }
    fn time_changed(&mut self) {
        self.0.borrow_mut().push("client time_changed".into());
    }
    fn request_play(&mut self) {
        self.0.borrow_mut().push("client request_play".into());
    }
    fn request_pause(&mut self) {
        self.0.borrow_mut().push("client request_pause".into());
    }
    fn request_seek(&mut self, seconds: f64) {
        self.0.borrow_mut().push(format!("client request_seek {}", seconds));
    }
    fn size_changed(&mut self) {
        self.0.borrow_mut().push("client size_changed".into());
    }
    fn repaint(&mut self) {
        self.0.borrow_mut().push("client repaint".into());
    }
    fn set_video_layer(&mut self, layer: Option<LayerId>) {
        self.0
            .borrow_mut()
            .push(format!("client set_video_layer {:?}", layer.map(|l| l.0)));
    }
}

struct FakeCompositor {
    log: Log,
    chain: Rc<RefCell<Vec<LayerGeometry>>>,
}

impl LayerTree for FakeCompositor {
    fn containment_chain(&self, layer: LayerId) -> Vec<LayerGeometry> {
        if layer == LayerId(7) {
            self.chain.borrow().clone()
        } else {
            Vec::new()
        }
    }

    fn page_scale_factor(&self) -> f32 {
        1.0
    }
}

impl VideoCompositor for FakeCompositor {
    fn create_video_layer(&mut self) -> LayerId {
        self.log.borrow_mut().push("compositor create_video_layer".into());
        LayerId(7)
    }
    fn set_layer_opaque(&mut self, _layer: LayerId, opaque: bool) {
        self.log
            .borrow_mut()
            .push(format!("compositor opaque {}", opaque));
    }
    fn paint_hole_frame(&mut self, size: Size) {
        self.log
            .borrow_mut()
            .push(format!("compositor hole {}x{}", size.width, size.height));
    }
    fn paint_black_frame(&mut self, size: Size) {
        self.log
            .borrow_mut()
            .push(format!("compositor black {}x{}", size.width, size.height));
    }
}

struct RecordingDelegate(Log);

impl PlaybackDelegate for RecordingDelegate {
    fn did_play(
        &mut self,
        _player_id: PlayerId,
        has_video: bool,
        has_audio: bool,
        content_type: MediaContentType,
    ) {
        self.0.borrow_mut().push(format!(
            "delegate did_play video={} audio={} {:?}",
            has_video, has_audio, content_type
        ));
    }
    fn did_pause(&mut self, _player_id: PlayerId) {
        self.0.borrow_mut().push("delegate did_pause".into());
    }
    fn player_gone(&mut self, _player_id: PlayerId) {
        self.0.borrow_mut().push("delegate player_gone".into());
    }
}

struct DeferAll;

impl LoadGate for DeferAll {
    fn should_defer(&mut self, _player_id: PlayerId) -> bool {
        true
    }
}

struct Harness {
    remote: QueueTransport,
    manager: Rc<PlayerManager>,
    proxy: Rc<RefCell<RemotePlaybackProxy>>,
    log: Log,
    chain: Rc<RefCell<Vec<LayerGeometry>>>,
}

impl Harness {
    fn new() -> Self {
        let remote = QueueTransport::new();
        let manager = Rc::new(PlayerManager::with_allocator(
            ROUTE,
            IdAllocator::new(0x0042),
            Box::new(remote.clone()),
        ));
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let chain = Rc::new(RefCell::new(vec![
            LayerGeometry {
                bounds: SizeF::new(640.0, 360.0),
                position: PointF::new(0.0, 50.0),
                scroll_offset: PointF::default(),
            },
            LayerGeometry {
                bounds: SizeF::new(1280.0, 720.0),
                position: PointF::new(8.0, 8.0),
                scroll_offset: PointF::default(),
            },
        ]));

        let proxy = RemotePlaybackProxy::new(
            manager.clone(),
            ProxyConfig::default(),
            Box::new(RecordingClient(log.clone())),
            Box::new(FakeCompositor {
                log: log.clone(),
                chain: chain.clone(),
            }),
        );
        proxy
            .borrow_mut()
            .set_delegate(Box::new(RecordingDelegate(log.clone())));

        Self {
            remote,
            manager,
            proxy,
            log,
            chain,
        }
    }

    fn id(&self) -> PlayerId {
        self.proxy.borrow().player_id()
    }

    /// Deliver one notification the way the remote side would
    fn notify(&self, message: PlayerMessage) -> usize {
        self.remote.deliver(Routed::new(ROUTE, self.id(), message));
        self.manager.process_incoming()
    }

    fn commands(&self) -> Vec<HostMessage> {
        self.remote
            .take_sent()
            .into_iter()
            .map(|routed| {
                assert_eq!(routed.routing_id, ROUTE);
                routed.message
            })
            .collect()
    }

    fn take_log(&self) -> Vec<String> {
        self.log.borrow_mut().drain(..).collect()
    }

    fn with_video(&self) {
        self.notify(PlayerMessage::MediaDataChanged {
            width: 640,
            height: 360,
            media: MediaTypeMask::VIDEO | MediaTypeMask::AUDIO,
        });
        self.take_log();
        self.commands();
    }
}

fn seek_to(seconds: f64) -> HostMessage {
    HostMessage::Seek(MediaTime::from_seconds(seconds))
}

// ============================================================================
// SEEK COALESCING
// ============================================================================

#[test]
fn test_rapid_seeks_issue_one_at_a_time() {
    let h = Harness::new();

    h.proxy.borrow_mut().seek(2.0);
    h.proxy.borrow_mut().seek(5.0);
    assert_eq!(h.commands(), vec![seek_to(2.0)]);
    assert!(h.proxy.borrow().has_pending_seek());

    assert_eq!(h.notify(PlayerMessage::SeekComplete), 1);
    assert_eq!(h.commands(), vec![seek_to(5.0)]);
    assert!(h.proxy.borrow().seeking());
    assert!(!h.proxy.borrow().has_pending_seek());

    h.notify(PlayerMessage::SeekComplete);
    assert!(h.commands().is_empty());
    assert!(!h.proxy.borrow().seeking());
}

#[test]
fn test_seek_to_inflight_target_clears_pending() {
    let h = Harness::new();

    h.proxy.borrow_mut().seek(3.0);
    h.proxy.borrow_mut().seek(3.0);
    assert_eq!(h.commands(), vec![seek_to(3.0)]);

    h.proxy.borrow_mut().seek(8.0);
    h.proxy.borrow_mut().seek(3.0);
    assert!(!h.proxy.borrow().has_pending_seek());
    assert!(h.commands().is_empty());

    h.notify(PlayerMessage::SeekComplete);
    assert!(h.commands().is_empty());
}

#[test]
fn test_seek_complete_repaints_and_reports_time() {
    let h = Harness::new();
    h.with_video();

    h.proxy.borrow_mut().seek(1.0);
    h.notify(PlayerMessage::SeekComplete);
    assert_eq!(
        h.take_log(),
        vec!["compositor hole 640x360", "client time_changed"]
    );
}

// ============================================================================
// PLAY / PAUSE
// ============================================================================

#[test]
fn test_play_waits_for_drawable_surface() {
    let h = Harness::new();
    h.with_video();

    h.proxy.borrow_mut().play();
    assert!(h.commands().is_empty());
    assert!(h.proxy.borrow().has_pending_play());
    assert!(h.proxy.borrow().paused());

    h.proxy
        .borrow_mut()
        .on_drawable_content_rect_changed(Rect::new(8, 58, 640, 360));
    assert_eq!(
        h.commands(),
        vec![
            HostMessage::SetGeometry(RectF::new(8.0, 58.0, 640.0, 360.0)),
            HostMessage::Play,
        ]
    );
    assert!(!h.proxy.borrow().has_pending_play());
    assert!(!h.proxy.borrow().paused());

    h.proxy
        .borrow_mut()
        .on_drawable_content_rect_changed(Rect::new(8, 58, 640, 360));
    assert_eq!(
        h.commands(),
        vec![HostMessage::SetGeometry(RectF::new(8.0, 58.0, 640.0, 360.0))]
    );
}

#[test]
fn test_audio_only_plays_immediately() {
    let h = Harness::new();
    h.proxy.borrow_mut().play();
    assert_eq!(h.commands(), vec![HostMessage::Play]);
}

#[test]
fn test_losing_video_releases_deferred_play() {
    let h = Harness::new();
    h.with_video();
    h.proxy.borrow_mut().play();
    assert!(h.commands().is_empty());

    h.notify(PlayerMessage::MediaDataChanged {
        width: 0,
        height: 0,
        media: MediaTypeMask::AUDIO,
    });
    assert_eq!(h.commands(), vec![HostMessage::Play]);
    assert!(!h.proxy.borrow().has_pending_play());
}

#[test]
fn test_pause_then_play_keeps_order() {
    let h = Harness::new();

    h.proxy.borrow_mut().pause(true);
    h.proxy.borrow_mut().play();
    assert!(!h.proxy.borrow().paused());
    assert_eq!(
        h.commands(),
        vec![
            HostMessage::Pause {
                is_user_action: true
            },
            HostMessage::Play,
        ]
    );
    assert_eq!(
        h.take_log(),
        vec![
            "delegate did_pause",
            "delegate did_play video=false audio=false Persistent",
        ]
    );
}

#[test]
fn test_remote_pause_state_wins() {
    let h = Harness::new();

    h.notify(PlayerMessage::PauseStateChanged(true));
    assert!(h.take_log().is_empty());

    h.notify(PlayerMessage::DurationChanged(MediaTime::from_seconds(3.0)));
    h.notify(PlayerMessage::PauseStateChanged(false));
    assert!(!h.proxy.borrow().paused());
    assert_eq!(
        h.take_log(),
        vec![
            "client duration_changed",
            "client request_play",
            "delegate did_play video=false audio=false OneShot",
        ]
    );
    assert!(h.commands().is_empty());
}

#[test]
fn test_rate_and_activation_are_forwarded() {
    let h = Harness::new();
    {
        let mut proxy = h.proxy.borrow_mut();
        proxy.set_rate(1.5);
        proxy.activate();
        proxy.deactivate();
    }

    assert_eq!(
        h.commands(),
        vec![
            HostMessage::SetRate(1.5),
            HostMessage::Activate,
            HostMessage::Deactivate,
        ]
    );
    assert!(h.take_log().is_empty());
    assert_eq!(h.proxy.borrow().playback_rate(), 1.5);
}

// ============================================================================
// STATE NOTIFICATIONS
// ============================================================================

#[test]
fn test_state_notifications_reach_client() {
    let h = Harness::new();
    h.notify(PlayerMessage::ReadyStateChange(ReadyState::HaveEnoughData));
    h.notify(PlayerMessage::NetworkStateChange(NetworkState::Loaded));

    assert_eq!(
        h.take_log(),
        vec!["client ready_state_changed", "client network_state_changed"]
    );
    let proxy = h.proxy.borrow();
    assert_eq!(proxy.ready_state(), ReadyState::HaveEnoughData);
    assert_eq!(proxy.network_state(), NetworkState::Loaded);
    assert!(h.commands().is_empty());
}

#[test]
fn test_time_changed_reaches_client() {
    let h = Harness::new();
    h.notify(PlayerMessage::TimeChanged);
    assert_eq!(h.take_log(), vec!["client time_changed"]);
    assert!(h.commands().is_empty());
}

#[test]
fn test_player_destroyed_changes_nothing() {
    let h = Harness::new();
    h.with_video();

    assert_eq!(h.notify(PlayerMessage::PlayerDestroyed), 1);
    assert!(h.take_log().is_empty());
    assert!(h.commands().is_empty());

    let proxy = h.proxy.borrow();
    assert!(proxy.paused());
    assert!(proxy.has_video());
    assert_eq!(proxy.video_layer(), Some(LayerId(7)));
    assert_eq!(h.manager.player_count(), 1);
}

// ============================================================================
// BUFFERING
// ============================================================================

#[test]
fn test_buffer_update_progress_is_edge_triggered() {
    let h = Harness::new();
    h.notify(PlayerMessage::DurationChanged(MediaTime::from_seconds(10.0)));
    h.notify(PlayerMessage::BufferUpdate(50));

    let mut proxy = h.proxy.borrow_mut();
    assert_eq!(proxy.buffered().end(0), Some(5.0));
    assert!(proxy.did_loading_progress());
    assert!(!proxy.did_loading_progress());
}

// ============================================================================
// SUSPEND / RESUME
// ============================================================================

#[test]
fn test_suspend_pauses_first() {
    let h = Harness::new();
    h.proxy
        .borrow_mut()
        .load(LoadType::Url, "https://example.com/v.mp4", "video/mp4")
        .unwrap();
    h.proxy.borrow_mut().play();
    h.commands();
    h.take_log();

    h.proxy.borrow_mut().suspend_and_release_resources().unwrap();
    assert!(h.proxy.borrow().paused());
    assert_eq!(h.commands(), vec![HostMessage::Suspend]);
    assert_eq!(
        h.take_log(),
        vec!["client request_pause", "delegate did_pause"]
    );

    h.proxy.borrow_mut().resume();
    assert_eq!(h.commands(), vec![HostMessage::Resume]);
}

#[test]
fn test_frame_hidden_before_load_is_rejected() {
    let h = Harness::new();
    let err = h.proxy.borrow_mut().on_frame_hidden().unwrap_err();
    assert!(matches!(err, MediaError::InvalidState(_)));
    assert!(h.commands().is_empty());
}

#[test]
fn test_preempted_suspend_forces_pause() {
    let h = Harness::new();
    h.proxy.borrow_mut().play();
    h.take_log();

    h.notify(PlayerMessage::PlayerSuspend {
        is_preempted: false,
    });
    assert!(!h.proxy.borrow().paused());
    assert_eq!(h.take_log(), vec!["delegate player_gone"]);

    h.notify(PlayerMessage::PlayerSuspend { is_preempted: true });
    assert!(h.proxy.borrow().paused());
    assert_eq!(
        h.take_log(),
        vec![
            "client request_pause",
            "delegate did_pause",
            "delegate player_gone",
        ]
    );

    h.notify(PlayerMessage::PlayerResumed { is_preempted: true });
    assert_eq!(h.take_log(), vec!["delegate did_pause"]);
}

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_deferred_load() {
    let h = Harness::new();
    h.proxy.borrow_mut().set_load_gate(Box::new(DeferAll));

    let timing = h
        .proxy
        .borrow_mut()
        .load(LoadType::Url, "file:///videos/clip.webm?autoplay=1", "video/webm")
        .unwrap();
    assert_eq!(timing, LoadTiming::Deferred);
    assert!(h.commands().is_empty());

    assert!(h.proxy.borrow_mut().run_deferred_load());
    match h.commands().as_slice() {
        [HostMessage::Init(init)] => {
            assert_eq!(init.url, "file:///videos/clip.webm");
            assert!(!init.is_audio);
        }
        other => panic!("unexpected commands {:?}", other),
    }
    assert!(!h.proxy.borrow_mut().run_deferred_load());
}

// ============================================================================
// VIDEO SURFACE & GEOMETRY
// ============================================================================

#[test]
fn test_first_video_creates_layer_once() {
    let h = Harness::new();
    let media = MediaTypeMask::VIDEO;
    h.notify(PlayerMessage::MediaDataChanged {
        width: 320,
        height: 240,
        media,
    });
    h.notify(PlayerMessage::MediaDataChanged {
        width: 640,
        height: 480,
        media,
    });

    assert_eq!(
        h.take_log(),
        vec![
            "compositor create_video_layer",
            "compositor opaque false",
            "client set_video_layer Some(7)",
            "compositor hole 320x240",
            "compositor hole 640x480",
        ]
    );
    let proxy = h.proxy.borrow();
    assert_eq!(proxy.video_layer(), Some(LayerId(7)));
    assert_eq!(proxy.natural_size(), Size::new(640, 480));
    assert!(proxy.is_sampling_geometry());
}

#[test]
fn test_layout_sends_changed_geometry_once() {
    let h = Harness::new();
    h.with_video();
    let now = Instant::now();

    h.proxy.borrow_mut().on_layout(now);
    assert_eq!(
        h.commands(),
        vec![HostMessage::SetGeometry(RectF::new(8.0, 58.0, 640.0, 360.0))]
    );

    h.proxy.borrow_mut().on_layout(now);
    assert!(h.commands().is_empty());
}

#[test]
fn test_geometry_sampling_settles() {
    let h = Harness::new();
    h.with_video();
    let now = Instant::now();
    h.proxy.borrow_mut().on_layout(now);
    h.commands();

    // Scroll while sampling
    h.chain.borrow_mut()[1].scroll_offset = PointF::new(0.0, 20.0);
    let deadline = h.proxy.borrow().next_timer_deadline().unwrap();
    h.proxy.borrow_mut().on_geometry_timer(deadline);
    assert_eq!(
        h.commands(),
        vec![HostMessage::SetGeometry(RectF::new(8.0, 38.0, 640.0, 360.0))]
    );

    let deadline = h.proxy.borrow().next_timer_deadline().unwrap();
    h.proxy.borrow_mut().on_geometry_timer(deadline);
    assert!(h.commands().is_empty());
    assert!(!h.proxy.borrow().is_sampling_geometry());
}

#[test]
fn test_sampling_starts_from_last_reported_clock() {
    let h = Harness::new();
    let t0 = Instant::now() + Duration::from_secs(3600);

    // No layer yet, so nothing is sampled, but the clock is taken
    h.proxy.borrow_mut().on_layout(t0);
    assert!(h.commands().is_empty());

    h.with_video();
    assert_eq!(
        h.proxy.borrow().next_timer_deadline(),
        Some(t0 + Duration::from_millis(50))
    );
}

#[test]
fn test_opacity_applies_to_existing_layer() {
    let h = Harness::new();
    h.proxy.borrow_mut().on_opacity_changed(true);
    assert!(h.take_log().is_empty());

    // A layer created later picks up the stored opacity
    h.notify(PlayerMessage::MediaDataChanged {
        width: 640,
        height: 360,
        media: MediaTypeMask::VIDEO,
    });
    assert_eq!(
        h.take_log(),
        vec![
            "compositor create_video_layer",
            "compositor opaque true",
            "client set_video_layer Some(7)",
            "compositor hole 640x360",
        ]
    );

    h.proxy.borrow_mut().on_opacity_changed(false);
    assert_eq!(h.take_log(), vec!["compositor opaque false"]);
    assert!(h.commands().is_empty());
}

#[test]
fn test_natural_size_change_reaches_client() {
    let h = Harness::new();
    h.with_video();

    h.proxy.borrow_mut().on_natural_size_changed(Size::new(800, 450));
    assert_eq!(h.take_log(), vec!["client size_changed"]);
    assert_eq!(h.proxy.borrow().natural_size(), Size::new(800, 450));
}

#[test]
fn test_fullscreen_transitions_are_idempotent() {
    let h = Harness::new();
    h.with_video();

    h.proxy.borrow_mut().entered_fullscreen();
    h.proxy.borrow_mut().entered_fullscreen();
    assert_eq!(h.commands(), vec![HostMessage::EnteredFullscreen]);
    assert_eq!(h.take_log(), vec!["compositor hole 640x360"]);

    h.proxy.borrow_mut().exited_fullscreen();
    h.proxy.borrow_mut().exited_fullscreen();
    assert_eq!(h.commands(), vec![HostMessage::ExitedFullscreen]);
    assert_eq!(
        h.take_log(),
        vec!["compositor black 640x360", "client repaint"]
    );
}

// ============================================================================
// DELEGATE OBSERVER
// ============================================================================

#[test]
fn test_seek_forward_and_backward_are_relative() {
    let h = Harness::new();
    h.notify(PlayerMessage::TimeUpdate(MediaTime::from_seconds(30.0)));

    h.proxy.borrow_mut().on_seek_forward(10.0);
    h.proxy.borrow_mut().on_seek_backward(5.0);
    h.notify(PlayerMessage::SeekRequest(MediaTime::from_seconds(12.5)));
    assert_eq!(
        h.take_log(),
        vec![
            "client request_seek 40",
            "client request_seek 25",
            "client request_seek 12.5",
        ]
    );
}

#[test]
fn test_delegate_play_pause_go_through_client() {
    let h = Harness::new();
    h.proxy.borrow_mut().on_delegate_play();
    h.proxy.borrow_mut().on_delegate_pause();

    assert_eq!(
        h.take_log(),
        vec!["client request_play", "client request_pause"]
    );
    assert!(h.commands().is_empty());
    assert!(h.proxy.borrow().paused());
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_teardown_makes_late_notifications_inert() {
    let h = Harness::new();
    let id = h.id();
    let Harness {
        remote,
        manager,
        proxy,
        log,
        ..
    } = h;

    drop(proxy);
    assert_eq!(
        remote.take_sent(),
        vec![Routed::new(ROUTE, id, HostMessage::Teardown)]
    );
    assert_eq!(*log.borrow(), vec!["delegate player_gone"]);
    assert!(manager.player(id).is_none());

    remote.deliver(Routed::new(ROUTE, id, PlayerMessage::SeekComplete));
    assert_eq!(manager.process_incoming(), 0);
}

#[test]
fn test_players_get_distinct_ids() {
    let remote = QueueTransport::new();
    let manager = Rc::new(PlayerManager::with_allocator(
        ROUTE,
        IdAllocator::new(1),
        Box::new(remote.clone()),
    ));

    let mut ids = Vec::new();
    for _ in 0..16 {
        let proxy = RemotePlaybackProxy::new(
            manager.clone(),
            ProxyConfig::default(),
            Box::new(RecordingClient(Rc::default())),
            Box::new(FakeCompositor {
                log: Rc::default(),
                chain: Rc::default(),
            }),
        );
        let id = proxy.borrow().player_id();
        assert!(!ids.contains(&id));
        ids.push(id);
    }

    for id in ids {
        assert!(manager.player(id).is_none());
    }
    assert_eq!(manager.player_count(), 0);
}

#[test]
fn test_notifications_for_other_route_are_ignored() {
    let h = Harness::new();
    h.remote.deliver(Routed::new(
        RoutingId(4),
        h.id(),
        PlayerMessage::DurationChanged(MediaTime::from_seconds(9.0)),
    ));
    assert_eq!(h.manager.process_incoming(), 0);
    assert_eq!(h.proxy.borrow().duration(), 0.0);
}
