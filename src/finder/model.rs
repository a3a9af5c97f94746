//! Typed records for the partner search views
//!
//! Rows come off the adapter seam as loose column maps and are parsed
//! into these structs once, at load time. Everything downstream works
//! with real fields instead of column-name strings.

use crate::core::source::{SourceError, SourceRow};
use crate::core::value::FieldValue;
use crate::recon::classify::MainProcess;

/// One state row from the lookup object, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct StateInfo {
    pub state: String,
    pub code: String,
    pub region: String,
}

impl StateInfo {
    pub fn from_source(row: &SourceRow) -> Result<Self, SourceError> {
        Ok(Self {
            state: normalize_state(&row.require_text("state")?),
            code: row.require_text("state_code")?,
            region: row.require_text("region")?,
        })
    }
}

/// The record store spells the capital out; everything downstream uses
/// the English name.
fn normalize_state(state: &str) -> String {
    if state == "Ciudad de México" {
        "Mexico City".to_string()
    } else {
        state.to_string()
    }
}

/// Capability flags a manufacturing search can filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessFlag {
    Machining,
    Logistics,
    Formation,
    Tooling,
    HeavyFab,
    Laboratory,
    Finishing,
    JoiningWelding,
    LightFab,
    Other,
}

impl ProcessFlag {
    pub const ALL: [ProcessFlag; 10] = [
        ProcessFlag::Machining,
        ProcessFlag::Logistics,
        ProcessFlag::Formation,
        ProcessFlag::Tooling,
        ProcessFlag::HeavyFab,
        ProcessFlag::Laboratory,
        ProcessFlag::Finishing,
        ProcessFlag::JoiningWelding,
        ProcessFlag::LightFab,
        ProcessFlag::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessFlag::Machining => "machining",
            ProcessFlag::Logistics => "logistics",
            ProcessFlag::Formation => "formation",
            ProcessFlag::Tooling => "tooling",
            ProcessFlag::HeavyFab => "heavy_fab",
            ProcessFlag::Laboratory => "laboratory",
            ProcessFlag::Finishing => "finishing",
            ProcessFlag::JoiningWelding => "joining_welding",
            ProcessFlag::LightFab => "light_fab",
            ProcessFlag::Other => "other",
        }
    }

    /// The main-process label a flag narrows to. Tooling has no main
    /// process of its own and falls back to Other.
    pub fn main_process(&self) -> MainProcess {
        match self {
            ProcessFlag::Machining => MainProcess::Machining,
            ProcessFlag::Logistics => MainProcess::Logistics,
            ProcessFlag::Formation => MainProcess::MetalFormation,
            ProcessFlag::Tooling => MainProcess::Other,
            ProcessFlag::HeavyFab => MainProcess::HeavyFab,
            ProcessFlag::Laboratory => MainProcess::Laboratory,
            ProcessFlag::Finishing => MainProcess::Finishing,
            ProcessFlag::JoiningWelding => MainProcess::JoiningWelding,
            ProcessFlag::LightFab => MainProcess::LightFabrication,
            ProcessFlag::Other => MainProcess::Other,
        }
    }

    /// The capability column in the manufacturing partner query.
    fn column(&self) -> String {
        format!("{}_capability__c", self.as_str())
    }
}

impl std::str::FromStr for ProcessFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessFlag::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown process flag: {}", s))
    }
}

/// A manufacturing partner with location and capability flags resolved.
#[derive(Debug, Clone)]
pub struct ManufacturingPartner {
    pub mp_id: String,
    pub name: String,
    pub main_process: Option<MainProcess>,
    pub status: Option<String>,
    pub wos: f64,
    pub quotes: f64,
    pub nda: Option<String>,
    pub truora: Option<String>,
    pub syntage: Option<String>,
    pub last_wo_date: Option<String>,
    pub global_score: Option<f64>,
    pub state: String,
    pub region: String,
    capabilities: [bool; 10],
}

impl ManufacturingPartner {
    /// Parse a partner row joined with its address; the state lookup
    /// fills in the display name and region.
    pub fn from_source(row: &SourceRow, location: &StateInfo) -> Result<Self, SourceError> {
        let mut capabilities = [false; 10];
        for (i, flag) in ProcessFlag::ALL.iter().enumerate() {
            capabilities[i] = truthy(&row.get(&flag.column()));
        }
        Ok(Self {
            mp_id: row.require_text("Id")?,
            name: row.require_text("Name")?,
            main_process: row
                .get("main_process__c")
                .as_str()
                .and_then(|s| s.parse().ok()),
            status: text(&row.get("Account_Status__c")),
            wos: row.get("Completed_Work_Orders__c").as_f64().unwrap_or(0.0),
            quotes: row
                .get("Number_of_RFQs_MP_has_quoted__c")
                .as_f64()
                .unwrap_or(0.0),
            nda: text(&row.get("NDA_status__c")),
            truora: text(&row.get("truora_test__c")),
            syntage: text(&row.get("syntage_test__c")),
            last_wo_date: text(&row.get("last_wo_date__c")),
            global_score: row.get("global_score__c").as_f64(),
            state: location.state.clone(),
            region: location.region.clone(),
            capabilities,
        })
    }

    pub fn has(&self, flag: ProcessFlag) -> bool {
        let idx = ProcessFlag::ALL.iter().position(|f| *f == flag);
        idx.map(|i| self.capabilities[i]).unwrap_or(false)
    }

    #[cfg(test)]
    pub fn set_capability(&mut self, flag: ProcessFlag, value: bool) {
        if let Some(i) = ProcessFlag::ALL.iter().position(|f| *f == flag) {
            self.capabilities[i] = value;
        }
    }
}

/// A raw-materials partner with its recent activity counts merged in.
#[derive(Debug, Clone)]
pub struct RawMaterialPartner {
    pub mp_id: String,
    pub mp_name: String,
    pub status: Option<String>,
    pub mp_type: Option<String>,
    pub score: Option<f64>,
    /// Quotes inside the rolling activity window, zero when none.
    pub quotes: i64,
    /// Work orders inside the rolling activity window, zero when none.
    pub wos: i64,
}

impl RawMaterialPartner {
    pub fn from_source(row: &SourceRow) -> Result<Self, SourceError> {
        Ok(Self {
            mp_id: row.require_text("mp_id")?,
            mp_name: row.require_text("mp_name")?,
            status: text(&row.get("status")),
            mp_type: text(&row.get("mp_type")),
            score: row.get("score").as_f64(),
            quotes: 0,
            wos: 0,
        })
    }
}

/// One catalogue product.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,
    pub product_name: String,
    pub product_family: Option<String>,
    pub material: Option<String>,
}

impl Product {
    pub fn from_source(row: &SourceRow) -> Result<Self, SourceError> {
        Ok(Self {
            product_id: row.require_text("product_id")?,
            product_name: row.require_text("product_name")?,
            product_family: text(&row.get("product_family")),
            material: text(&row.get("material")),
        })
    }
}

/// A partner contact with at least one way to reach them.
#[derive(Debug, Clone)]
pub struct Contact {
    pub mp_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
}

impl Contact {
    /// True when every reachable field is empty; such rows are dropped.
    pub fn is_unreachable(&self) -> bool {
        self.phone.is_none()
            && self.mobile_phone.is_none()
            && self.email.is_none()
            && self.title.is_none()
    }
}

fn text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Capability cells come back as booleans or as 0/1 depending on the
/// adapter.
fn truthy(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Int(i) => *i != 0,
        FieldValue::Float(f) => *f != 0.0,
        FieldValue::Text(s) => s == "true" || s == "1",
        FieldValue::Null => false,
    }
}
