pub mod tournaments;
