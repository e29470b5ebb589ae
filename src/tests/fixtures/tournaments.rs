// Shared test fixtures for tournaments and registrations.

use crate::modules::tournaments::core::registration::Registration;
use crate::modules::tournaments::core::tournament::Tournament;
use std::fs;

pub const FIXED_REGISTERED_AT: i64 = 1_700_000_000_000;

pub struct TournamentBuilder {
    inner: Tournament,
}

impl Default for TournamentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl TournamentBuilder {
    pub fn new() -> Self {
        let json_str = fs::read_to_string("./src/tests/fixtures/json/tournament.json").unwrap();
        Self {
            inner: serde_json::from_str(&json_str).unwrap(),
        }
    }

    pub fn tournament_id(mut self, v: impl Into<String>) -> Self {
        self.inner.tournament_id = v.into();
        self
    }

    pub fn max_players(mut self, v: u32) -> Self {
        self.inner.max_players = v;
        self
    }

    pub fn version(mut self, v: i64) -> Self {
        self.inner.version = v;
        self
    }

    pub fn build(self) -> Tournament {
        self.inner
    }
}

pub fn registration_for(tournament_id: &str, player_id: &str) -> Registration {
    Registration {
        tournament_id: tournament_id.to_string(),
        player_id: player_id.to_string(),
        registered_at: FIXED_REGISTERED_AT,
    }
}

#[cfg(test)]
mod tournament_builder_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_delegates_to_new_and_parses_json() {
        let built = TournamentBuilder::default().build();
        assert_eq!(built, Tournament::new("t-fixed-0001", 10));
    }

    #[rstest]
    fn setters_override_all_fields_and_build_returns_inner() {
        let custom = TournamentBuilder::new()
            .tournament_id("t-123")
            .max_players(3)
            .version(7)
            .build();
        assert_eq!(custom.tournament_id, "t-123");
        assert_eq!(custom.max_players, 3);
        assert_eq!(custom.version, 7);
    }
}
