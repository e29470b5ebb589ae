#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecideError {
    #[error("tournament not found")]
    NotFound,

    #[error("tournament is full ({max_players} players)")]
    Full { max_players: u32 },

    #[error("player already registered")]
    AlreadyRegistered,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    /// Claim a slot by moving the tournament from `expected_version` to the next one.
    Admit { expected_version: i64 },
    Rejected { reason: DecideError },
}
