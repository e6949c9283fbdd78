//! Player Manager
//!
//! One manager per routing scope (frame). It owns the registry and the
//! transport, stamps outgoing commands with the route and player id, and
//! routes incoming notifications to the player they name.
//!
//! Everything runs on the frame's single event sequence, so interior
//! mutability via `RefCell` is enough; the manager is deliberately not
//! `Send`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fos_ipc::{IpcError, IpcSerialize, RoutingId};

use crate::config::ManagerConfig;
use crate::protocol::{HostMessage, PlayerMessage, RemotePlayer, Routed, dispatch};
use crate::registry::{IdAllocator, PlayerId, PlayerRegistry};
use crate::transport::MediaTransport;

pub struct PlayerManager {
    routing_id: RoutingId,
    registry: RefCell<PlayerRegistry>,
    transport: RefCell<Box<dyn MediaTransport>>,
}

impl PlayerManager {
    pub fn new(config: ManagerConfig, transport: Box<dyn MediaTransport>) -> Self {
        Self::with_allocator(
            config.routing_id,
            IdAllocator::new(config.owner_discriminator),
            transport,
        )
    }

    /// Manager with explicit id allocation state
    pub fn with_allocator(
        routing_id: RoutingId,
        allocator: IdAllocator,
        transport: Box<dyn MediaTransport>,
    ) -> Self {
        Self {
            routing_id,
            registry: RefCell::new(PlayerRegistry::with_allocator(allocator)),
            transport: RefCell::new(transport),
        }
    }

    pub fn routing_id(&self) -> RoutingId {
        self.routing_id
    }

    pub fn register_player(&self, player: Weak<RefCell<dyn RemotePlayer>>) -> PlayerId {
        self.registry.borrow_mut().register(player)
    }

    pub fn unregister_player(&self, id: PlayerId) {
        self.registry.borrow_mut().unregister(id);
    }

    pub fn player(&self, id: PlayerId) -> Option<Rc<RefCell<dyn RemotePlayer>>> {
        self.registry.borrow().lookup(id)
    }

    pub fn player_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Send a command for `player_id`. Failures are logged, never returned:
    /// local state does not depend on delivery.
    pub fn send(&self, player_id: PlayerId, message: HostMessage) {
        tracing::debug!("{} -> {:?}", player_id, message);
        let routed = Routed::new(self.routing_id, player_id, message);
        if let Err(e) = self.transport.borrow_mut().send(routed) {
            tracing::warn!("Command for {} not delivered: {}", player_id, e);
        }
    }

    /// Apply one notification. Returns `false` when it was dropped because
    /// it belongs to another route or its player is gone.
    pub fn on_message_received(&self, routed: Routed<PlayerMessage>) -> bool {
        if routed.routing_id != self.routing_id {
            tracing::debug!(
                "Ignoring {:?} for {} on {}",
                routed.message,
                routed.routing_id,
                self.routing_id
            );
            return false;
        }

        let Some(player) = self.player(routed.player_id) else {
            tracing::debug!(
                "Dropping {:?} for unknown {}",
                routed.message,
                routed.player_id
            );
            return false;
        };

        tracing::debug!("{} <- {:?}", routed.player_id, routed.message);
        match player.try_borrow_mut() {
            Ok(mut player) => {
                dispatch(&mut *player, routed.message);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "Re-entrant notification for {} dropped",
                    routed.player_id
                );
                false
            }
        }
    }

    /// Decode an encoded envelope and apply it
    pub fn on_frame_received(&self, payload: &[u8]) -> Result<bool, IpcError> {
        let routed = Routed::<PlayerMessage>::from_bytes(payload)?;
        Ok(self.on_message_received(routed))
    }

    /// Pull everything the transport has received and apply it in order.
    /// Returns how many notifications reached a player.
    pub fn process_incoming(&self) -> usize {
        let incoming = self.transport.borrow_mut().poll_incoming();
        match incoming {
            Ok(messages) => messages
                .into_iter()
                .map(|routed| self.on_message_received(routed))
                .filter(|handled| *handled)
                .count(),
            Err(e) => {
                tracing::warn!("Polling {} failed: {}", self.routing_id, e);
                0
            }
        }
    }
}

impl std::fmt::Debug for PlayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerManager")
            .field("routing_id", &self.routing_id)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
