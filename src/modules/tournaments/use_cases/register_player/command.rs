#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPlayer {
    pub tournament_id: String,
    pub player_id: String,
}

impl RegisterPlayer {
    pub fn new(tournament_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            tournament_id: tournament_id.into(),
            player_id: player_id.into(),
        }
    }
}
