//! Scorecard sheet parsing
//!
//! Field teams fill in a spreadsheet template per partner visit. The
//! sheet is free-form around two anchors: an "MP ID" cell whose right
//! neighbor holds the record id, and a "KPI" column with a
//! "Calificación" score column beside it. KPI labels map to score
//! fields on the partner record; unrecognized labels are ignored.

use std::path::Path;

use thiserror::Error;

use crate::core::value::FieldValue;

#[derive(Debug, Error)]
pub enum ScorecardError {
    /// The "MP ID" anchor (or the cell to its right) is absent. The
    /// sheet cannot be attributed to a partner; callers skip the file
    /// and keep going.
    #[error("scorecard has no partner id (no 'MP ID' cell with a value beside it)")]
    MissingIdentifier,

    #[error("scorecard has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("failed to read scorecard: {0}")]
    Io(String),
}

/// KPI label on the sheet -> score field on the partner record.
const KPI_FIELDS: [(&str, &str); 15] = [
    (
        "Responsivo en el correo electrónico y Whatsapp (o equivalente)",
        "ssc_responsiveness__c",
    ),
    (
        "Incluye en sus cotizaciones tiempos de entrega competitivos",
        "ssc_delivery_times__c",
    ),
    (
        "Transparencia y consistencia en métodos de trabajo",
        "ssc_transparency__c",
    ),
    (
        "Costo de materiales, mano de obra, Etc. desglosado",
        "ssc_cost_breakdown__c",
    ),
    (
        "Pizarrón con planeación de la producción",
        "ssc_production_planning__c",
    ),
    (
        "Capacidad instalada / disponible actualizada para Prima",
        "ssc_available_capacity__c",
    ),
    ("Participación en RFQs", "ssc_rfq_participation__c"),
    (
        "Actualización de proyectos con evidencias (fotos)",
        "qsc_updates_evidence__c",
    ),
    (
        "Quejas de Cliente (Internas - Prima / Externas - Nuestro Cliente)",
        "qsc_complaints__c",
    ),
    (
        "Instrumentos de medición y registros de inspección",
        "qsc_measuring_instruments__c",
    ),
    (
        "Sistema de Gestión de Calidad Implementado",
        "qsc_quality_systems__c",
    ),
    (
        "Rastreabilidad y Certificados de Calidad de Materia Prima",
        "qsc_materials_trace_cert__c",
    ),
    ("Costo cercano o debajo de target price", "psc_costs__c"),
    (
        "Abierto a negociar o revisar cotizaciones",
        "psc_willingness_negotiation__c",
    ),
    (
        "Documentación Completa para Finanzas",
        "isc_financial_documentation__c",
    ),
];

fn kpi_field(label: &str) -> Option<&'static str> {
    KPI_FIELDS
        .iter()
        .find(|(kpi, _)| *kpi == label.trim())
        .map(|(_, field)| *field)
}

/// The raw sheet as a grid of trimmed cells.
#[derive(Debug)]
pub struct ScoreGrid {
    cells: Vec<Vec<String>>,
}

impl ScoreGrid {
    /// Load a sheet exported as CSV. Rows may have ragged widths.
    pub fn from_csv(path: &Path) -> Result<Self, ScorecardError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ScorecardError::Io(e.to_string()))?;

        let mut cells = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ScorecardError::Io(e.to_string()))?;
            cells.push(record.iter().map(|c| c.trim().to_string()).collect());
        }
        Ok(Self { cells })
    }

    pub fn from_cells(cells: Vec<Vec<String>>) -> Self {
        Self { cells }
    }

    fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// First cell whose content equals `needle`.
    fn find_cell(&self, needle: &str) -> Option<(usize, usize)> {
        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell == needle {
                    return Some((r, c));
                }
            }
        }
        None
    }
}

/// One partner's scorecard, ready to reconcile against the record store.
#[derive(Debug)]
pub struct Scorecard {
    pub salesforce_id: String,
    /// Score field -> value, in sheet order.
    pub scores: Vec<(&'static str, FieldValue)>,
}

fn parse_score(raw: &str) -> FieldValue {
    if raw.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return FieldValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return FieldValue::Float(f);
    }
    FieldValue::Text(raw.to_string())
}

/// Pull the partner id and the mapped KPI scores out of a sheet.
pub fn extract_scorecard(grid: &ScoreGrid) -> Result<Scorecard, ScorecardError> {
    let (id_row, id_col) = grid
        .find_cell("MP ID")
        .ok_or(ScorecardError::MissingIdentifier)?;
    let salesforce_id = match grid.cell(id_row, id_col + 1) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(ScorecardError::MissingIdentifier),
    };

    let (kpi_row, kpi_col) = grid
        .find_cell("KPI")
        .ok_or(ScorecardError::MissingColumn("KPI"))?;
    let score_col = grid.cells[kpi_row]
        .iter()
        .position(|c| c == "Calificación")
        .ok_or(ScorecardError::MissingColumn("Calificación"))?;

    let mut scores = Vec::new();
    for row in kpi_row + 1..grid.cells.len() {
        let Some(label) = grid.cell(row, kpi_col) else {
            continue;
        };
        let Some(field) = kpi_field(label) else {
            continue;
        };
        let raw = grid.cell(row, score_col).unwrap_or("");
        scores.push((field, parse_score(raw)));
    }

    Ok(Scorecard {
        salesforce_id,
        scores,
    })
}
