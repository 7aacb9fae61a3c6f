use dashmap::DashMap;

/// In-memory connection liveness, keyed by user id.
///
/// Tracks a connection count per user rather than a boolean so that a
/// disconnect from a stale device cannot flip a user offline while another
/// device is still connected. This state is advisory and legitimately
/// resets to empty on restart; it is never a system of record.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    connections: DashMap<i64, usize>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection. Returns true if this flipped the user
    /// from offline to online (first connection).
    pub fn connect(&self, user_id: i64) -> bool {
        let mut count = self.connections.entry(user_id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Records a closed connection. Returns true if this flipped the user
    /// from online to offline (last connection).
    pub fn disconnect(&self, user_id: i64) -> bool {
        let went_offline = match self.connections.get_mut(&user_id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if went_offline {
            self.connections.remove_if(&user_id, |_, count| *count == 0);
        }
        went_offline
    }

    #[must_use]
    pub fn is_online(&self, user_id: i64) -> bool {
        self.connections.get(&user_id).is_some_and(|count| *count > 0)
    }

    /// Snapshot of currently online user ids, for bootstrapping a freshly
    /// connected client's presence view.
    #[must_use]
    pub fn online_users(&self) -> Vec<i64> {
        self.connections.iter().filter(|e| *e.value() > 0).map(|e| *e.key()).collect()
    }
}
