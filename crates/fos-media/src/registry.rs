//! Player Registry
//!
//! Maps player ids to the local players of one routing scope. Entries hold
//! weak references: the registry never keeps a player alive, it only lets
//! late notifications find it while it still exists.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::protocol::RemotePlayer;

/// Player identifier.
///
/// The upper 16 bits carry the owning context's discriminator so ids stay
/// distinguishable across contexts; the lower 16 bits are a wrapping
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub fn new(owner: u16, counter: u16) -> Self {
        Self(((owner as u32) << 16) | counter as u32)
    }

    pub fn owner(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn counter(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({:#010x})", self.0)
    }
}

/// Id allocation state, owned by the registry rather than hidden in a static
#[derive(Debug, Clone)]
pub struct IdAllocator {
    owner: u16,
    counter: u16,
}

impl IdAllocator {
    pub fn new(owner: u16) -> Self {
        Self::with_counter(owner, 0)
    }

    /// Resume from a known counter value; the next id uses `counter + 1`
    pub fn with_counter(owner: u16, counter: u16) -> Self {
        Self { owner, counter }
    }

    pub fn owner(&self) -> u16 {
        self.owner
    }

    pub fn next_id(&mut self) -> PlayerId {
        self.counter = self.counter.wrapping_add(1);
        PlayerId::new(self.owner, self.counter)
    }
}

/// Id → player map for one routing scope
pub struct PlayerRegistry<P: ?Sized = dyn RemotePlayer> {
    allocator: IdAllocator,
    players: HashMap<PlayerId, Weak<RefCell<P>>>,
}

impl<P: ?Sized> PlayerRegistry<P> {
    pub fn new(owner: u16) -> Self {
        Self::with_allocator(IdAllocator::new(owner))
    }

    pub fn with_allocator(allocator: IdAllocator) -> Self {
        Self {
            allocator,
            players: HashMap::new(),
        }
    }

    /// Store `player` under a fresh id. Never fails.
    ///
    /// After the counter wraps, ids whose entry is still live are skipped,
    /// so two live players never share an id. Ids of players that are gone
    /// are reused.
    pub fn register(&mut self, player: Weak<RefCell<P>>) -> PlayerId {
        let mut id = self.allocator.next_id();
        for _ in 0..=u16::MAX {
            if !self.is_live(id) {
                break;
            }
            id = self.allocator.next_id();
        }

        self.players.insert(id, player);
        tracing::info!("Registered {} ({} live)", id, self.players.len());
        id
    }

    /// Remove the entry. Unknown ids are ignored.
    pub fn unregister(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_some() {
            tracing::info!("Unregistered {}", id);
        }
    }

    /// Resolve a live player. `None` is the normal answer for notifications
    /// that arrive after teardown.
    pub fn lookup(&self, id: PlayerId) -> Option<Rc<RefCell<P>>> {
        self.players.get(&id).and_then(Weak::upgrade)
    }

    fn is_live(&self, id: PlayerId) -> bool {
        self.players
            .get(&id)
            .is_some_and(|player| player.strong_count() > 0)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl<P: ?Sized> fmt::Debug for PlayerRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("allocator", &self.allocator)
            .field("players", &self.players.keys().collect::<Vec<_>>())
            .finish()
    }
}
