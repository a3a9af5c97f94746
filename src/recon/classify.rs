//! Main-process classification from quote and work-order signals
//!
//! Each partner gets two independent label assignments, one per count
//! signal. Agreement (or a single available signal) makes the label
//! authoritative; disagreement lands the partner in the divergent set
//! for manual review and blocks any automatic write.

use std::collections::{BTreeMap, HashMap};

use crate::core::source::{SourceError, SourceRow};

/// The fixed main-process vocabulary used by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MainProcess {
    Machining,
    LightFabrication,
    HeavyFab,
    MaterialSourcing,
    MetalFormation,
    Other,
    Finishing,
    JoiningWelding,
    Logistics,
    Laboratory,
}

impl MainProcess {
    pub const ALL: [MainProcess; 10] = [
        MainProcess::Machining,
        MainProcess::LightFabrication,
        MainProcess::HeavyFab,
        MainProcess::MaterialSourcing,
        MainProcess::MetalFormation,
        MainProcess::Other,
        MainProcess::Finishing,
        MainProcess::JoiningWelding,
        MainProcess::Logistics,
        MainProcess::Laboratory,
    ];

    /// The label as stored in the record store's picklist.
    pub fn label(&self) -> &'static str {
        match self {
            MainProcess::Machining => "Machining",
            MainProcess::LightFabrication => "Light Fabrication",
            MainProcess::HeavyFab => "Heavy Fab",
            MainProcess::MaterialSourcing => "Material Sourcing",
            MainProcess::MetalFormation => "Metal Formation",
            MainProcess::Other => "Other",
            MainProcess::Finishing => "Finishing",
            MainProcess::JoiningWelding => "Joining and Welding",
            MainProcess::Logistics => "Logistics",
            MainProcess::Laboratory => "Laboratory",
        }
    }

    /// The capability field backing this main process.
    pub fn capability_field(&self) -> &'static str {
        match self {
            MainProcess::Machining => "machining_processes__c",
            MainProcess::LightFabrication => "light_fab_processes__c",
            MainProcess::HeavyFab => "heavy_fab_processes__c",
            MainProcess::MaterialSourcing => "materials_processes__c",
            MainProcess::MetalFormation => "formation_processes__c",
            MainProcess::Other => "other_processes__c",
            MainProcess::Finishing => "finishing_processes__c",
            MainProcess::JoiningWelding => "joining_welding_processes__c",
            MainProcess::Logistics => "logistics_processes__c",
            MainProcess::Laboratory => "laboratory_processes__c",
        }
    }
}

impl std::fmt::Display for MainProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for MainProcess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MainProcess::ALL
            .iter()
            .find(|p| p.label() == s)
            .copied()
            .ok_or_else(|| format!("Unknown main process: {}", s))
    }
}

/// Capability fields on the partner object. Includes the tooling field,
/// which has no owning main process but does carry a general label.
pub const CAPABILITY_FIELDS: [&str; 11] = [
    "other_processes__c",
    "formation_processes__c",
    "materials_processes__c",
    "tooling_processes__c",
    "logistics_processes__c",
    "machining_processes__c",
    "heavy_fab_processes__c",
    "laboratory_processes__c",
    "finishing_processes__c",
    "joining_welding_processes__c",
    "light_fab_processes__c",
];

/// The "general" sub-label to backfill into a capability field when a
/// partner's main process owns it but the field is unset. Not every
/// capability family has one.
pub fn general_label(capability_field: &str) -> Option<&'static str> {
    match capability_field {
        "formation_processes__c" => Some("General Metal Formation"),
        "tooling_processes__c" => Some("General Dies and Molds"),
        "machining_processes__c" => Some("General Machining"),
        "heavy_fab_processes__c" => Some("General Heavy Fabrication"),
        "laboratory_processes__c" => Some("Laboratory"),
        "light_fab_processes__c" => Some("General Light Fabrication"),
        _ => None,
    }
}

/// One analytics row: per-partner, per-process document counts.
#[derive(Debug, Clone)]
pub struct ProcessCountRow {
    pub salesforce_id: String,
    pub mp_name: String,
    pub main_process: Option<MainProcess>,
    pub total_quotes: Option<f64>,
    pub total_wos: Option<f64>,
}

impl ProcessCountRow {
    pub fn from_source(row: &SourceRow) -> Result<Self, SourceError> {
        let main_process = match row.require("main_process")? {
            v if v.is_null() => None,
            v => v.as_str().and_then(|s| s.parse().ok()),
        };
        Ok(Self {
            salesforce_id: row.require_text("salesforce_id")?,
            mp_name: row.require("mp_name")?.to_string(),
            main_process,
            total_quotes: row.require("total_quotes")?.as_f64(),
            total_wos: row.require("total_wos")?.as_f64(),
        })
    }
}

/// Which count column drives a classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Quotes,
    WorkOrders,
}

impl Signal {
    fn count(&self, row: &ProcessCountRow) -> Option<f64> {
        match self {
            Signal::Quotes => row.total_quotes,
            Signal::WorkOrders => row.total_wos,
        }
    }
}

/// A partner whose two signals disagree. Excluded from writes.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergentPartner {
    pub salesforce_id: String,
    pub mp_name: String,
    pub by_quotes: MainProcess,
    pub by_wos: MainProcess,
}

/// Merged classification: authoritative labels plus the divergent set.
#[derive(Debug, Default)]
pub struct Classification {
    pub authoritative: BTreeMap<String, MainProcess>,
    pub divergent: Vec<DivergentPartner>,
}

/// Pivot partner x process over one signal and assign each partner the
/// process with the highest count. Partners with no non-null count for
/// this signal get no assignment. Ties break by lexical order of the
/// process label, smallest first.
pub fn classify_by(rows: &[ProcessCountRow], signal: Signal) -> BTreeMap<String, MainProcess> {
    let mut pivot: HashMap<&str, HashMap<MainProcess, f64>> = HashMap::new();
    for row in rows {
        let (Some(process), Some(count)) = (row.main_process, signal.count(row)) else {
            continue;
        };
        *pivot
            .entry(row.salesforce_id.as_str())
            .or_default()
            .entry(process)
            .or_insert(0.0) += count;
    }

    let mut assigned = BTreeMap::new();
    for (id, counts) in pivot {
        let mut candidates: Vec<(MainProcess, f64)> = counts.into_iter().collect();
        candidates.sort_by(|a, b| a.0.label().cmp(b.0.label()));
        let mut best: Option<(MainProcess, f64)> = None;
        for (process, count) in candidates {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((process, count)),
            }
        }
        if let Some((process, _)) = best {
            assigned.insert(id.to_string(), process);
        }
    }
    assigned
}

/// Merge the two signal assignments. Agreement or a lone signal makes
/// the label authoritative (the quotes label is the one kept when both
/// are present and equal); disagreement produces a divergent entry.
pub fn merge_signals(
    by_quotes: &BTreeMap<String, MainProcess>,
    by_wos: &BTreeMap<String, MainProcess>,
    names: &HashMap<String, String>,
) -> Classification {
    let mut result = Classification::default();

    let mut ids: Vec<&String> = by_quotes.keys().chain(by_wos.keys()).collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        match (by_quotes.get(id), by_wos.get(id)) {
            (Some(q), Some(w)) if q == w => {
                result.authoritative.insert(id.clone(), *q);
            }
            (Some(q), None) => {
                result.authoritative.insert(id.clone(), *q);
            }
            (None, Some(w)) => {
                result.authoritative.insert(id.clone(), *w);
            }
            (Some(q), Some(w)) => {
                result.divergent.push(DivergentPartner {
                    salesforce_id: id.clone(),
                    mp_name: names.get(id).cloned().unwrap_or_default(),
                    by_quotes: *q,
                    by_wos: *w,
                });
            }
            (None, None) => {}
        }
    }
    result
}
