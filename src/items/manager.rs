//! RFQ item browsing and classification
//!
//! Quoted items live in the analytics store, one row per item-partner
//! quote. The manager loads them once (the result set routinely blows
//! past the page size, so the fetch is ordered by the quote id),
//! answers per-RFQ questions, and appends classified items to the
//! shared pricing sheet.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::query::QueryText;
use crate::core::sink::{SheetSink, SinkBatch, SinkError};
use crate::core::source::{
    fetch_analytics, fetch_records, AnalyticsSource, RecordStore, SourceError, SourceRow,
};

/// One quoted item: an item on an RFQ, priced by one partner.
#[derive(Debug, Clone)]
pub struct ItemQuote {
    pub rfq_id: i64,
    pub item_id: i64,
    pub mp_id: String,
    pub mp_name: String,
    pub unit_price: Option<f64>,
    pub rfq_name: Option<String>,
    pub customer_name: Option<String>,
    pub main_process: Option<String>,
    pub pod: Option<String>,
}

impl ItemQuote {
    fn from_source(row: &SourceRow) -> Result<Self, SourceError> {
        let int = |column: &str| -> Result<i64, SourceError> {
            row.require(column)?
                .as_f64()
                .map(|f| f as i64)
                .ok_or(SourceError::MissingColumn {
                    column: column.to_string(),
                })
        };
        let text = |column: &str| row.get(column).as_str().map(str::to_string);
        Ok(Self {
            rfq_id: int("rfq_id")?,
            item_id: int("item_id")?,
            mp_id: row.require_text("mp_id")?,
            mp_name: row.require_text("mp_name")?,
            unit_price: row.get("unit_price").as_f64(),
            rfq_name: text("rfq_name"),
            customer_name: text("customer_name"),
            main_process: text("main_process"),
            pod: text("pod"),
        })
    }
}

/// A manufacturing product, used as the classification vocabulary:
/// its name is the subcategory, grouped under a category.
#[derive(Debug, Clone)]
pub struct ManufacturingProduct {
    pub subcategory: String,
    pub category: Option<String>,
}

/// Header metadata for one RFQ.
#[derive(Debug, Clone, PartialEq)]
pub struct RfqInfo {
    pub rfq_name: Option<String>,
    pub customer_name: Option<String>,
    pub main_process: Option<String>,
    pub pod: Option<String>,
}

/// Item-by-partner price matrix for one RFQ.
#[derive(Debug)]
pub struct PriceMatrix {
    /// Partner names, sorted.
    pub mp_names: Vec<String>,
    pub rows: Vec<PriceRow>,
}

#[derive(Debug)]
pub struct PriceRow {
    pub item_id: i64,
    /// One slot per partner column; zero prices count as no quote.
    pub prices: Vec<Option<f64>>,
}

/// A user's classification for one item.
#[derive(Debug, Clone)]
pub struct ItemClassification {
    pub item_id: i64,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

pub struct ItemManager {
    items: Vec<ItemQuote>,
    products: Vec<ManufacturingProduct>,
}

impl ItemManager {
    pub fn load(
        analytics: &dyn AnalyticsSource,
        records: &dyn RecordStore,
        queries_dir: &Path,
    ) -> Result<Self, SourceError> {
        let items_query = QueryText::File(queries_dir.join("items_quotations.sql"));
        let items = fetch_analytics(analytics, &items_query, Some("item_quote_id"))?
            .iter()
            .map(ItemQuote::from_source)
            .collect::<Result<_, _>>()?;

        let products_query = QueryText::File(queries_dir.join("manufacturing_products.sql"));
        let mut products = Vec::new();
        for row in fetch_records(records, &products_query)? {
            products.push(ManufacturingProduct {
                subcategory: row.require_text("subcategory")?,
                category: row.get("category").as_str().map(str::to_string),
            });
        }

        Ok(Self { items, products })
    }

    #[cfg(test)]
    pub fn from_parts(items: Vec<ItemQuote>, products: Vec<ManufacturingProduct>) -> Self {
        Self { items, products }
    }

    fn rfq_items(&self, rfq_id: i64) -> impl Iterator<Item = &ItemQuote> {
        self.items.iter().filter(move |i| i.rfq_id == rfq_id)
    }

    /// Header info for an RFQ, or None when the RFQ has no quotes.
    pub fn rfq_info(&self, rfq_id: i64) -> Option<RfqInfo> {
        self.rfq_items(rfq_id).next().map(|item| RfqInfo {
            rfq_name: item.rfq_name.clone(),
            customer_name: item.customer_name.clone(),
            main_process: item.main_process.clone(),
            pod: item.pod.clone(),
        })
    }

    /// The price matrix for an RFQ. A zero price means the partner did
    /// not actually quote the item; items no partner priced are
    /// dropped. The first quote wins when a partner priced an item
    /// twice.
    pub fn price_matrix(&self, rfq_id: i64) -> Option<PriceMatrix> {
        let items: Vec<&ItemQuote> = self.rfq_items(rfq_id).collect();
        if items.is_empty() {
            return None;
        }

        let mp_names: Vec<String> = items
            .iter()
            .map(|i| i.mp_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let item_ids: Vec<i64> = items
            .iter()
            .map(|i| i.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows = Vec::new();
        for item_id in item_ids {
            let mut prices: Vec<Option<f64>> = vec![None; mp_names.len()];
            for quote in items.iter().filter(|i| i.item_id == item_id) {
                let col = mp_names
                    .iter()
                    .position(|n| *n == quote.mp_name)
                    .unwrap_or_default();
                if prices[col].is_none() {
                    prices[col] = quote.unit_price.filter(|p| *p != 0.0);
                }
            }
            if prices.iter().any(Option::is_some) {
                rows.push(PriceRow { item_id, prices });
            }
        }
        Some(PriceMatrix { mp_names, rows })
    }

    /// Distinct item ids of an RFQ, for the classification worksheet.
    pub fn classification_items(&self, rfq_id: i64) -> Option<Vec<i64>> {
        let ids: Vec<i64> = self
            .rfq_items(rfq_id)
            .map(|i| i.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    }

    /// Available classification categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.products
            .iter()
            .filter_map(|p| p.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Subcategories under one category, sorted.
    pub fn subcategories_of(&self, category: &str) -> Vec<String> {
        self.products
            .iter()
            .filter(|p| p.category.as_deref() == Some(category))
            .map(|p| p.subcategory.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Append classified items of one RFQ to the pricing sheet. Only
    /// fully classified items with a real price are kept, and rows the
    /// sheet already has (same RFQ, item, and partner) are skipped.
    /// Returns the number of rows actually written.
    pub fn add_entries(
        &self,
        sink: &mut dyn SheetSink,
        rfq_id: i64,
        classifications: &[ItemClassification],
    ) -> Result<usize, SinkError> {
        let columns: Vec<String> = [
            "rfq_id",
            "item_id",
            "mp_id",
            "mp_name",
            "unit_price",
            "category",
            "subcategory",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let mut rows = Vec::new();
        for item in self.rfq_items(rfq_id) {
            let Some(class) = classifications.iter().find(|c| c.item_id == item.item_id) else {
                continue;
            };
            let (Some(category), Some(subcategory)) = (&class.category, &class.subcategory) else {
                continue;
            };
            let Some(price) = item.unit_price.filter(|p| *p != 0.0) else {
                continue;
            };
            rows.push(vec![
                item.rfq_id.to_string(),
                item.item_id.to_string(),
                item.mp_id.clone(),
                item.mp_name.clone(),
                price.to_string(),
                category.clone(),
                subcategory.clone(),
            ]);
        }

        let dedup: Vec<String> = ["rfq_id", "item_id", "mp_id"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        sink.append(&SinkBatch { columns, rows }, &dedup)
    }
}
