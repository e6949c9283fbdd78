//! Routing Identifiers

use std::fmt;

/// Addressing scope (owning document/frame) a message is routed under.
///
/// Player ids are only meaningful together with the route they were
/// allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingId(pub u32);

impl RoutingId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RoutingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({})", self.0)
    }
}
