use crate::modules::tournaments::core::tournament::Tournament;
use crate::modules::tournaments::use_cases::register_player::decision::{DecideError, Decision};

/// Snapshot of what one admission attempt read inside its transaction.
#[derive(Debug, Clone)]
pub struct AdmissionSnapshot {
    pub tournament: Option<Tournament>,
    pub already_registered: bool,
    pub registered: u64,
}

pub fn decide_admission(snapshot: &AdmissionSnapshot) -> Decision {
    let Some(tournament) = &snapshot.tournament else {
        return Decision::Rejected {
            reason: DecideError::NotFound,
        };
    };
    if snapshot.already_registered {
        return Decision::Rejected {
            reason: DecideError::AlreadyRegistered,
        };
    }
    if tournament.is_full(snapshot.registered) {
        return Decision::Rejected {
            reason: DecideError::Full {
                max_players: tournament.max_players,
            },
        };
    }
    Decision::Admit {
        expected_version: tournament.version,
    }
}
