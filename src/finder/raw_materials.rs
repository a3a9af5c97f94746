//! Raw-materials partner search
//!
//! Answers "who can supply these products near this state": a boolean
//! partner-by-product matrix over the listings view, ranked by how many
//! of the requested products each partner carries. Products nobody
//! carries come back separately so the caller can say so.

use std::collections::HashSet;

use crate::core::source::{RecordStore, SourceError};
use crate::finder::manufacturing::FilterError;
use crate::finder::model::{Contact, RawMaterialPartner};
use crate::finder::views::FinderViews;

#[derive(Debug)]
pub struct RawMaterialsMatch {
    pub partner: RawMaterialPartner,
    pub state: String,
    /// One flag per result column, true when the partner carries it.
    pub offers: Vec<bool>,
}

impl RawMaterialsMatch {
    pub fn total(&self) -> usize {
        self.offers.iter().filter(|o| **o).count()
    }
}

#[derive(Debug)]
pub struct RawMaterialsResult {
    /// Product names that matched at least one partner, sorted.
    pub columns: Vec<String>,
    pub rows: Vec<RawMaterialsMatch>,
    /// Requested products nobody in the area carries, sorted.
    pub missing_products: Vec<String>,
}

pub fn filter_raw_materials(
    views: &FinderViews,
    products: &[String],
    state: &str,
    region_mode: bool,
) -> Result<RawMaterialsResult, FilterError> {
    let region = views
        .region_of(state)
        .ok_or_else(|| FilterError::UnknownState(state.to_string()))?;

    let requested: Vec<&str> = products.iter().map(String::as_str).collect();
    let product_name_of = |product_id: &str| {
        views
            .catalogue
            .iter()
            .find(|p| p.product_id == product_id)
            .map(|p| p.product_name.as_str())
    };

    // (mp_id, product, site state), deduplicated per partner-product.
    let mut hits: Vec<(String, String, String)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for listing in &views.rm_listings {
        let Some(product_name) = product_name_of(&listing.product_id) else {
            continue;
        };
        if !requested.contains(&product_name) {
            continue;
        }
        for site in views.rm_sites.iter().filter(|s| s.mp_id == listing.mp_id) {
            let in_location = if region_mode {
                site.region == region
            } else {
                site.state == state
            };
            if !in_location {
                continue;
            }
            if seen.insert((listing.mp_id.clone(), listing.product_id.clone())) {
                hits.push((
                    listing.mp_id.clone(),
                    product_name.to_string(),
                    site.state.clone(),
                ));
            }
        }
    }

    let mut columns: Vec<String> = hits.iter().map(|(_, p, _)| p.clone()).collect();
    columns.sort();
    columns.dedup();

    let mut rows: Vec<RawMaterialsMatch> = Vec::new();
    for (mp_id, product, site_state) in &hits {
        let Some(partner) = views.rm_partners.iter().find(|p| &p.mp_id == mp_id) else {
            continue;
        };
        let offer_index = columns.iter().position(|c| c == product);
        let row = match rows.iter_mut().find(|r| &r.partner.mp_id == mp_id) {
            Some(existing) => existing,
            None => {
                rows.push(RawMaterialsMatch {
                    partner: partner.clone(),
                    state: site_state.clone(),
                    offers: vec![false; columns.len()],
                });
                rows.last_mut().unwrap()
            }
        };
        if let Some(i) = offer_index {
            row.offers[i] = true;
        }
    }

    rows.sort_by(|a, b| {
        b.total().cmp(&a.total()).then_with(|| {
            if region_mode {
                b.state.cmp(&a.state)
            } else {
                std::cmp::Ordering::Equal
            }
        })
    });

    let mut missing_products: Vec<String> = requested
        .iter()
        .filter(|p| !columns.iter().any(|c| c == *p))
        .map(|p| p.to_string())
        .collect();
    missing_products.sort();

    Ok(RawMaterialsResult {
        columns,
        rows,
        missing_products,
    })
}

/// Pull the contacts for the named partners from the record store,
/// dropping anyone with no phone, email, or title at all.
pub fn fetch_contacts(
    records: &dyn RecordStore,
    views: &FinderViews,
    mp_names: &[String],
) -> Result<Vec<Contact>, SourceError> {
    let chosen: Vec<&RawMaterialPartner> = views
        .rm_partners
        .iter()
        .filter(|p| mp_names.contains(&p.mp_name))
        .collect();
    if chosen.is_empty() {
        return Ok(Vec::new());
    }

    let conditions: Vec<String> = chosen
        .iter()
        .map(|p| format!("AccountId = '{}'", p.mp_id.replace('\'', "''")))
        .collect();
    let sql = format!(
        "select AccountId, LastName, FirstName, Phone, MobilePhone, Email, Title \
         from Contact where {}",
        conditions.join(" or ")
    );

    let mut contacts = Vec::new();
    for row in records.run_query(&sql)? {
        let account_id = row.require_text("AccountId")?;
        let Some(partner) = chosen.iter().find(|p| p.mp_id == account_id) else {
            continue;
        };
        let contact = Contact {
            mp_name: partner.mp_name.clone(),
            first_name: row.get("FirstName").as_str().map(str::to_string),
            last_name: row.get("LastName").as_str().map(str::to_string),
            phone: row.get("Phone").as_str().map(str::to_string),
            mobile_phone: row.get("MobilePhone").as_str().map(str::to_string),
            email: row.get("Email").as_str().map(str::to_string),
            title: row.get("Title").as_str().map(str::to_string),
        };
        if !contact.is_unreachable() {
            contacts.push(contact);
        }
    }
    Ok(contacts)
}
