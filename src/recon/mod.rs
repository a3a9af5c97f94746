//! Reconciliation between the analytics store and the record store

pub mod classify;
pub mod engine;
pub mod scorecard;

pub use classify::{DivergentPartner, MainProcess};
pub use engine::{MainProcessOutcome, ReconEngine, ReconError, WriteFailure, WriteReport};
pub use scorecard::{extract_scorecard, ScoreGrid, Scorecard, ScorecardError};
