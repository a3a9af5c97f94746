//! Loaded search views
//!
//! The finder front-loads everything a search session needs: states,
//! manufacturing partners with their locations, raw-materials partners
//! with recent activity, the product catalogue, and the partner-product
//! listings. Searches then run entirely in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::core::query::QueryText;
use crate::core::source::{
    fetch_analytics, fetch_records, AnalyticsSource, RecordStore, SourceError, SourceRow,
};
use crate::finder::model::{
    ManufacturingPartner, Product, RawMaterialPartner, StateInfo,
};
use crate::recon::classify::MainProcess;

/// Days of history that count as "recent activity" for a raw-materials
/// partner.
pub const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// One partner-product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RmListing {
    pub mp_id: String,
    pub product_id: String,
}

/// One partner site: a partner can operate out of several states.
#[derive(Debug, Clone, PartialEq)]
pub struct RmSite {
    pub mp_id: String,
    pub state: String,
    pub region: String,
}

#[derive(Debug)]
pub struct FinderViews {
    pub states: Vec<StateInfo>,
    pub manufacturing: Vec<ManufacturingPartner>,
    pub rm_partners: Vec<RawMaterialPartner>,
    pub rm_sites: Vec<RmSite>,
    pub rm_listings: Vec<RmListing>,
    pub catalogue: Vec<Product>,
}

fn query_file(dir: &Path, name: &str) -> QueryText {
    QueryText::File(PathBuf::from(dir).join(name))
}

impl FinderViews {
    /// Load every view from the two stores. Queries live as versioned
    /// .sql files under `queries_dir`.
    pub fn load(
        records: &dyn RecordStore,
        analytics: &dyn AnalyticsSource,
        queries_dir: &Path,
    ) -> Result<Self, SourceError> {
        let states: Vec<StateInfo> = fetch_records(records, &query_file(queries_dir, "states.sql"))?
            .iter()
            .map(StateInfo::from_source)
            .collect::<Result<_, _>>()?;

        // Addresses: a partner can have more than one site.
        let mut addresses: HashMap<String, Vec<String>> = HashMap::new();
        for row in fetch_records(records, &query_file(queries_dir, "addresses.sql"))? {
            addresses
                .entry(row.require_text("mp_id")?)
                .or_default()
                .push(row.require_text("state_code")?);
        }
        let state_by_code: HashMap<&str, &StateInfo> =
            states.iter().map(|s| (s.code.as_str(), s)).collect();

        // Manufacturing partners: one row per known site, raw-materials
        // accounts excluded.
        let mut manufacturing = Vec::new();
        for row in fetch_records(records, &query_file(queries_dir, "mps_manufacturing.sql"))? {
            let id = row.require_text("Id")?;
            for code in addresses.get(&id).into_iter().flatten() {
                let Some(location) = state_by_code.get(code.as_str()) else {
                    continue;
                };
                let partner = ManufacturingPartner::from_source(&row, location)?;
                if partner.main_process == Some(MainProcess::MaterialSourcing) {
                    break;
                }
                manufacturing.push(partner);
            }
        }

        // Raw-materials partners, with activity counts from the
        // analytics store folded in.
        let mut rm_partners: Vec<RawMaterialPartner> =
            fetch_records(records, &query_file(queries_dir, "mps_names.sql"))?
                .iter()
                .map(RawMaterialPartner::from_source)
                .collect::<Result<_, _>>()?;
        let docs = fetch_analytics(
            analytics,
            &query_file(queries_dir, "docs_on_interval.sql"),
            Some("doc_id"),
        )?;
        let activity = count_recent_docs(&docs, Utc::now(), ACTIVITY_WINDOW_DAYS)?;
        for partner in &mut rm_partners {
            if let Some(counts) = activity.get(&partner.mp_id) {
                partner.quotes = counts.quotes;
                partner.wos = counts.wos;
            }
        }

        let mut rm_sites = Vec::new();
        for partner in &rm_partners {
            for code in addresses.get(&partner.mp_id).into_iter().flatten() {
                if let Some(info) = state_by_code.get(code.as_str()) {
                    rm_sites.push(RmSite {
                        mp_id: partner.mp_id.clone(),
                        state: info.state.clone(),
                        region: info.region.clone(),
                    });
                }
            }
        }

        let mut rm_listings = Vec::new();
        for row in fetch_records(records, &query_file(queries_dir, "mps_products.sql"))? {
            rm_listings.push(RmListing {
                mp_id: row.require_text("mp_id")?,
                product_id: row.require_text("product_id")?,
            });
        }

        let catalogue = fetch_records(records, &query_file(queries_dir, "products_catalogue.sql"))?
            .iter()
            .map(Product::from_source)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            states,
            manufacturing,
            rm_partners,
            rm_sites,
            rm_listings,
            catalogue,
        })
    }

    /// The region a state belongs to, if the state is known.
    pub fn region_of(&self, state: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.state == state)
            .map(|s| s.region.as_str())
    }

    /// Main processes actually present among manufacturing partners.
    pub fn available_main_processes(&self) -> Vec<MainProcess> {
        let mut seen = Vec::new();
        for partner in &self.manufacturing {
            if let Some(process) = partner.main_process {
                if !seen.contains(&process) {
                    seen.push(process);
                }
            }
        }
        seen
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocCounts {
    pub quotes: i64,
    pub wos: i64,
}

/// Count quotes and work orders per partner inside the rolling window.
/// Documents carry a type discriminator and an ISO 8601 date.
pub fn count_recent_docs(
    rows: &[SourceRow],
    now: DateTime<Utc>,
    window_days: i64,
) -> Result<HashMap<String, DocCounts>, SourceError> {
    let mut counts: HashMap<String, DocCounts> = HashMap::new();
    for row in rows {
        let raw_date = row.require_text("doc_date")?;
        let Some(date) = parse_doc_date(&raw_date) else {
            continue;
        };
        if (now - date).num_days().abs() > window_days {
            continue;
        }
        let mp_id = row.require_text("mp_id")?;
        let entry = counts.entry(mp_id).or_default();
        match row.require_text("tipo")?.as_str() {
            "quotes" => entry.quotes += 1,
            "wos" => entry.wos += 1,
            _ => {}
        }
    }
    Ok(counts)
}

fn parse_doc_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
