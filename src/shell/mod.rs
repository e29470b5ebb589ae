// Composition root for the tournament registrar.
//
// - Read config from environment.
// - Instantiate the configured store backend.
// - Wire the store into the register-player handler and drive it.

pub mod config;
pub mod simulation;
