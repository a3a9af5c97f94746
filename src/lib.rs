//! mpsync - manufacturing partner data toolkit
//!
//! Reconciles partner records between the analytics store and the
//! record store, searches partners by capability and product, and
//! manages RFQ item classification.

pub mod cli;
pub mod core;
pub mod finder;
pub mod items;
pub mod recon;
