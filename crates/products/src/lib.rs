//! Products domain module.
//!
//! Product registration rules, catalog-only entries and the product lifecycle,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    CatalogEntry, NewProduct, Product, ProductEdit, ProductStatus, UnitOfMeasure,
};
