//! Partner and product search

pub mod audit;
pub mod manufacturing;
pub mod model;
pub mod raw_materials;
pub mod views;

pub use audit::{AuditError, RawMaterialsSearchEntry, SearchLog};
pub use manufacturing::{
    filter_manufacturing, FilterError, ManufacturingFilter, ManufacturingMatch, SortMetric,
};
pub use model::{Contact, ManufacturingPartner, ProcessFlag, Product, RawMaterialPartner, StateInfo};
pub use raw_materials::{fetch_contacts, filter_raw_materials, RawMaterialsResult};
pub use views::{FinderViews, RmListing, RmSite};
