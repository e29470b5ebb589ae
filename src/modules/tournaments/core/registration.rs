use serde::{Deserialize, Serialize};

/// A player's slot in a tournament. Created only by a committed admission and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub tournament_id: String,
    pub player_id: String,
    /// Epoch milliseconds.
    pub registered_at: i64,
}

impl Registration {
    pub fn key(&self) -> (&str, &str) {
        (&self.tournament_id, &self.player_id)
    }
}
