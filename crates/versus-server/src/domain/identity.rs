//! Client identity.

use std::fmt;

use uuid::Uuid;

/// Identifies one connected participant for the lifetime of its connection.
///
/// A reconnecting participant is a new client with a new id; ids are never
/// reused, which keeps a late unregister for an old connection from removing
/// the participant that took its seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first UUID group is plenty to tell two players apart in logs.
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}
