use serde::{Deserialize, Serialize};

/// Committed state of a tournament as the admission protocol sees it.
///
/// `version` is the optimistic lock token: it is bumped by exactly one for every
/// committed registration and by nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tournament {
    pub tournament_id: String,
    pub max_players: u32,
    pub version: i64,
}

impl Tournament {
    pub fn new(tournament_id: impl Into<String>, max_players: u32) -> Self {
        Self {
            tournament_id: tournament_id.into(),
            max_players,
            version: 0,
        }
    }

    pub fn is_full(&self, registered: u64) -> bool {
        registered >= u64::from(self.max_players)
    }
}
