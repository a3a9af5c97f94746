//! Manufacturing partner search
//!
//! Filters the in-memory manufacturing view by location, activity,
//! capability flags, and optionally a main process. Capability flags
//! combine as OR: a partner matches if it has any of them, and results
//! rank by how many it has.

use std::cmp::Ordering;

use thiserror::Error;

use crate::finder::model::{ManufacturingPartner, ProcessFlag};
use crate::finder::views::FinderViews;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("at least one capability flag is required")]
    NoProcessFilter,
}

/// Secondary sort metrics, applied after the capability match count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMetric {
    WorkOrders,
    Quotes,
    Score,
}

#[derive(Debug)]
pub struct ManufacturingFilter {
    /// Capability flags to match, OR-combined. Must be non-empty.
    pub flags: Vec<ProcessFlag>,
    pub state: String,
    /// Widen the location filter from the state to its whole region.
    pub search_region: bool,
    /// Keep only partners with completed work orders.
    pub only_active: bool,
    /// Keep only partners still in development. Combined with
    /// `only_active`, this relaxes to "any activity at all".
    pub only_developing: bool,
    /// Narrow to partners whose main process corresponds to this flag.
    pub main_process: Option<ProcessFlag>,
    pub sort_by: Vec<SortMetric>,
}

#[derive(Debug)]
pub struct ManufacturingMatch {
    pub partner: ManufacturingPartner,
    /// The subset of the requested flags this partner has, in request
    /// order.
    pub matched: Vec<ProcessFlag>,
}

const DEVELOPING_STATUS: &str = "Developing MP (Quoted)";

pub fn filter_manufacturing(
    views: &FinderViews,
    filter: &ManufacturingFilter,
) -> Result<Vec<ManufacturingMatch>, FilterError> {
    if filter.flags.is_empty() {
        return Err(FilterError::NoProcessFilter);
    }
    let region = views
        .region_of(&filter.state)
        .ok_or_else(|| FilterError::UnknownState(filter.state.clone()))?;

    let mut matches: Vec<ManufacturingMatch> = Vec::new();
    let mut seen_names: Vec<&str> = Vec::new();

    for partner in &views.manufacturing {
        let in_location = if filter.search_region {
            partner.region == region
        } else {
            partner.state == filter.state
        };
        if !in_location {
            continue;
        }

        let status_ok = match (filter.only_active, filter.only_developing) {
            (true, true) => partner.wos > 0.0 || partner.quotes > 0.0,
            (true, false) => partner.wos > 0.0,
            (false, true) => partner.status.as_deref() == Some(DEVELOPING_STATUS),
            (false, false) => true,
        };
        if !status_ok {
            continue;
        }

        if let Some(flag) = filter.main_process {
            if partner.main_process != Some(flag.main_process()) {
                continue;
            }
        }

        let matched: Vec<ProcessFlag> = filter
            .flags
            .iter()
            .copied()
            .filter(|f| partner.has(*f))
            .collect();
        if matched.is_empty() {
            continue;
        }

        // One row per partner name.
        if seen_names.contains(&partner.name.as_str()) {
            continue;
        }
        seen_names.push(partner.name.as_str());
        matches.push(ManufacturingMatch {
            partner: partner.clone(),
            matched,
        });
    }

    matches.sort_by(|a, b| {
        b.matched
            .len()
            .cmp(&a.matched.len())
            .then_with(|| compare_metrics(&b.partner, &a.partner, &filter.sort_by))
    });
    Ok(matches)
}

fn compare_metrics(
    a: &ManufacturingPartner,
    b: &ManufacturingPartner,
    metrics: &[SortMetric],
) -> Ordering {
    for metric in metrics {
        let (x, y) = match metric {
            SortMetric::WorkOrders => (a.wos, b.wos),
            SortMetric::Quotes => (a.quotes, b.quotes),
            SortMetric::Score => (
                a.global_score.unwrap_or(f64::NEG_INFINITY),
                b.global_score.unwrap_or(f64::NEG_INFINITY),
            ),
        };
        match x.partial_cmp(&y).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
