//! RFQ items and classification

pub mod manager;

pub use manager::{
    ItemClassification, ItemManager, ItemQuote, ManufacturingProduct, PriceMatrix, RfqInfo,
};
