//! Command implementations

pub mod completions;
pub mod find;
pub mod rfq;
pub mod update;
