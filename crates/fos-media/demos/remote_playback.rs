//! Example: drive a playback proxy against a simulated remote player
//!
//! The two sides talk over a Unix socket pair. Run with
//! `RUST_LOG=debug` to see every command and notification.

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    demo::run()
}

#[cfg(not(unix))]
fn main() {
    eprintln!("remote_playback needs Unix domain sockets");
}

#[cfg(unix)]
mod demo {
    use std::rc::Rc;
    use std::time::Instant;

    use fos_ipc::{FrameDecoder, IpcChannel, MessageFrame, RoutingId};
    use fos_media::{
        ChannelTransport, HostMessage, LayerGeometry, LayerId, LayerTree, LoadType, ManagerConfig,
        MediaPlayerClient, MediaTime, MediaTypeMask, NetworkState, PlayerManager, PlayerMessage,
        PointF, ProxyConfig, ReadyState, Rect, RemotePlaybackProxy, Routed, Size, SizeF,
        VideoCompositor,
    };
    use tracing_subscriber::EnvFilter;

    struct LoggingClient;

    impl MediaPlayerClient for LoggingClient {
        fn ready_state_changed(&mut self) {
            tracing::info!("client: ready state changed");
        }
        fn duration_changed(&mut self) {
            tracing::info!("client: duration changed");
        }
        fn time_changed(&mut self) {
            tracing::info!("client: time changed");
        }
        fn set_video_layer(&mut self, layer: Option<LayerId>) {
            tracing::info!("client: video layer {:?}", layer);
        }
    }

    /// Video sits 100px down a page that is not scrolled
    struct StaticCompositor;

    impl LayerTree for StaticCompositor {
        fn containment_chain(&self, _layer: LayerId) -> Vec<LayerGeometry> {
            vec![
                LayerGeometry {
                    bounds: SizeF::new(1280.0, 720.0),
                    position: PointF::new(0.0, 100.0),
                    scroll_offset: PointF::default(),
                },
                LayerGeometry {
                    bounds: SizeF::new(1920.0, 1080.0),
                    ..Default::default()
                },
            ]
        }

        fn page_scale_factor(&self) -> f32 {
            1.0
        }
    }

    impl VideoCompositor for StaticCompositor {
        fn create_video_layer(&mut self) -> LayerId {
            LayerId(1)
        }
        fn set_layer_opaque(&mut self, _layer: LayerId, _opaque: bool) {}
        fn paint_hole_frame(&mut self, size: Size) {
            tracing::debug!("compositor: hole frame {}x{}", size.width, size.height);
        }
        fn paint_black_frame(&mut self, _size: Size) {}
    }

    /// Answers commands the way a real remote player would, minus the media
    struct SimulatedPlayer {
        channel: IpcChannel,
        decoder: FrameDecoder,
    }

    impl SimulatedPlayer {
        fn reply(&mut self, to: &Routed<HostMessage>, message: PlayerMessage) -> anyhow::Result<()> {
            let routed = Routed::new(to.routing_id, to.player_id, message);
            self.channel.send(&MessageFrame::encode(&routed).to_bytes())?;
            Ok(())
        }

        /// Handle every command received so far
        fn pump(&mut self) -> anyhow::Result<()> {
            let mut bytes = Vec::new();
            self.channel.read_available(&mut bytes)?;
            self.decoder.push(&bytes);

            while let Some(frame) = self.decoder.next_frame()? {
                let command: Routed<HostMessage> = frame.decode()?;
                match &command.message {
                    HostMessage::Init(init) => {
                        tracing::info!("remote: init {}", init.url);
                        self.reply(&command, PlayerMessage::NetworkStateChange(NetworkState::Loading))?;
                        self.reply(
                            &command,
                            PlayerMessage::DurationChanged(MediaTime::from_seconds(120.0)),
                        )?;
                        self.reply(&command, PlayerMessage::ReadyStateChange(ReadyState::HaveMetadata))?;
                        self.reply(
                            &command,
                            PlayerMessage::MediaDataChanged {
                                width: 1280,
                                height: 720,
                                media: MediaTypeMask::VIDEO | MediaTypeMask::AUDIO,
                            },
                        )?;
                        self.reply(&command, PlayerMessage::BufferUpdate(25))?;
                    }
                    HostMessage::Play => self.reply(&command, PlayerMessage::PauseStateChanged(false))?,
                    HostMessage::Pause { .. } => {
                        self.reply(&command, PlayerMessage::PauseStateChanged(true))?
                    }
                    HostMessage::Seek(target) => {
                        self.reply(&command, PlayerMessage::TimeUpdate(*target))?;
                        self.reply(&command, PlayerMessage::SeekComplete)?;
                    }
                    HostMessage::Teardown => tracing::info!("remote: teardown"),
                    other => tracing::info!("remote: {:?}", other),
                }
            }
            Ok(())
        }
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();

        let config = ProxyConfig::from_json(r#"{ "geometry_update_interval_ms": 40 }"#)?;
        let (local, remote) = IpcChannel::pair()?;
        let mut remote = SimulatedPlayer {
            channel: remote,
            decoder: FrameDecoder::new(),
        };

        let manager = Rc::new(PlayerManager::new(
            ManagerConfig::for_route(RoutingId::new(1)),
            Box::new(ChannelTransport::new(local)),
        ));
        let proxy = RemotePlaybackProxy::new(
            manager.clone(),
            config,
            Box::new(LoggingClient),
            Box::new(StaticCompositor),
        );

        let mut exchange = || -> anyhow::Result<usize> {
            remote.pump()?;
            Ok(manager.process_incoming())
        };

        proxy
            .borrow_mut()
            .load(LoadType::Url, "https://media.example.com/trailer.mp4", "video/mp4")?;
        exchange()?;

        // Video is known now, so play waits for the surface.
        proxy.borrow_mut().play();
        proxy.borrow_mut().on_layout(Instant::now());
        proxy
            .borrow_mut()
            .on_drawable_content_rect_changed(Rect::new(0, 100, 1280, 720));
        exchange()?;

        // Scrubbing: only the first and the last target reach the player.
        for target in [10.0, 20.0, 30.0, 45.0] {
            proxy.borrow_mut().seek(target);
        }
        while proxy.borrow().seeking() {
            if exchange()? == 0 {
                break;
            }
        }

        {
            let mut proxy = proxy.borrow_mut();
            tracing::info!(
                "{}: paused={} time={}s duration={}s buffered to {:?}s progress={}",
                proxy.player_id(),
                proxy.paused(),
                proxy.current_time(),
                proxy.duration(),
                proxy.buffered().end(0),
                proxy.did_loading_progress()
            );
            proxy.pause(true);
        }
        exchange()?;

        drop(proxy);
        exchange()?;
        tracing::info!("{} players left", manager.player_count());
        Ok(())
    }
}
