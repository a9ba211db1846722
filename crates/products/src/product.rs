use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    CategoryId, DomainError, DomainResult, Entity, Money, ProductId, SupplierId, wire_enum,
};

wire_enum! {
    /// Product lifecycle.
    ///
    /// `CatalogOnly` marks a product known through a supplier but never received
    /// into a warehouse; it is excluded from sale listings until a purchase of it
    /// completes.
    pub enum ProductStatus: "product status" {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        CatalogOnly => "CATALOG_ONLY",
    }
}

wire_enum! {
    pub enum UnitOfMeasure: "unit of measure" {
        Unit => "UNIT",
        Box => "BOX",
        Pack => "PACK",
        Kilogram => "KG",
        Litre => "LITRE",
    }
}

/// Product as stored by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub unit: UnitOfMeasure,
    pub category_id: Option<CategoryId>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a regular product registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub unit: UnitOfMeasure,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Input for a supplier catalog registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub supplier_id: SupplierId,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub purchase_price: Money,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Replacement values for the editable fields of a product.
///
/// Status is not part of an edit; it moves through registration, receipts and
/// `set_status` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEdit {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub unit: UnitOfMeasure,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

impl Product {
    /// Register a sellable product (`ACTIVE`).
    pub fn register(draft: NewProduct, at: DateTime<Utc>) -> DomainResult<Self> {
        let name = required("name", &draft.name)?;
        let sku = required("sku", &draft.sku)?;
        let sale_price = draft.sale_price.ensure_non_negative("sale_price")?;
        let purchase_price = draft.purchase_price.ensure_non_negative("purchase_price")?;

        Ok(Self {
            id: ProductId::new(),
            name,
            sku,
            description: draft.description,
            sale_price,
            purchase_price,
            unit: draft.unit,
            category_id: draft.category_id,
            status: ProductStatus::Active,
            created_at: at,
            updated_at: at,
        })
    }

    /// Register a product offered by a supplier but not yet stocked.
    ///
    /// Forces `CATALOG_ONLY`, a zero sale price and `UNIT`.
    pub fn from_catalog(entry: CatalogEntry, at: DateTime<Utc>) -> DomainResult<Self> {
        let name = required("name", &entry.name)?;
        let sku = required("sku", &entry.sku)?;
        let purchase_price = entry.purchase_price.ensure_non_negative("purchase_price")?;

        Ok(Self {
            id: ProductId::new(),
            name,
            sku,
            description: entry.description,
            sale_price: Money::ZERO,
            purchase_price,
            unit: UnitOfMeasure::Unit,
            category_id: entry.category_id,
            status: ProductStatus::CatalogOnly,
            created_at: at,
            updated_at: at,
        })
    }

    /// Replace the editable fields. Nothing changes when validation fails.
    pub fn amend(&mut self, edit: ProductEdit, at: DateTime<Utc>) -> DomainResult<()> {
        let name = required("name", &edit.name)?;
        let sku = required("sku", &edit.sku)?;
        let sale_price = edit.sale_price.ensure_non_negative("sale_price")?;
        let purchase_price = edit.purchase_price.ensure_non_negative("purchase_price")?;

        self.name = name;
        self.sku = sku;
        self.description = edit.description;
        self.sale_price = sale_price;
        self.purchase_price = purchase_price;
        self.unit = edit.unit;
        self.category_id = edit.category_id;
        self.updated_at = at;
        Ok(())
    }

    /// Only active products appear in sale listings.
    pub fn is_sellable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Record a completed receipt of this product at `unit_cost`.
    ///
    /// Refreshes the purchase price and promotes a catalog-only product to
    /// `ACTIVE`. Returns whether the status flipped.
    pub fn mark_received(&mut self, unit_cost: Money, at: DateTime<Utc>) -> bool {
        self.purchase_price = unit_cost;
        self.updated_at = at;
        if self.status == ProductStatus::CatalogOnly {
            self.status = ProductStatus::Active;
            return true;
        }
        false
    }

    /// Administrative status change between `ACTIVE` and `INACTIVE`.
    ///
    /// `CATALOG_ONLY` is only ever assigned by catalog registration. Returns
    /// whether anything changed.
    pub fn set_status(&mut self, status: ProductStatus, at: DateTime<Utc>) -> DomainResult<bool> {
        if status == ProductStatus::CatalogOnly {
            return Err(DomainError::validation(
                "CATALOG_ONLY cannot be assigned directly",
            ));
        }
        if self.status == status {
            return Ok(false);
        }
        self.status = status;
        self.updated_at = at;
        Ok(true)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn entity_id(&self) -> ProductId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn draft() -> NewProduct {
        NewProduct {
            name: "Arroz Costeño 5kg".to_string(),
            sku: "ARR-005".to_string(),
            description: None,
            sale_price: Money::from_minor(2490),
            purchase_price: Money::from_minor(1900),
            unit: UnitOfMeasure::Pack,
            category_id: None,
        }
    }

    fn catalog_entry() -> CatalogEntry {
        CatalogEntry {
            supplier_id: SupplierId::new(),
            name: "Aceite Primor 1L".to_string(),
            sku: "ACE-001".to_string(),
            description: Some("botella".to_string()),
            purchase_price: Money::from_minor(850),
            category_id: None,
        }
    }

    #[test]
    fn register_creates_active_product() {
        let product = Product::register(draft(), test_time()).unwrap();
        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(product.sku, "ARR-005");
        assert!(product.is_sellable());
    }

    #[test]
    fn register_trims_and_rejects_blank_sku() {
        let mut d = draft();
        d.sku = "   ".to_string();
        let err = Product::register(d, test_time()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("sku") => {}
            _ => panic!("Expected Validation error for empty SKU"),
        }
    }

    #[test]
    fn register_rejects_negative_price() {
        let mut d = draft();
        d.sale_price = Money::from_minor(-1);
        let err = Product::register(d, test_time()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("sale_price") => {}
            _ => panic!("Expected Validation error for negative price"),
        }
    }

    #[test]
    fn catalog_entry_is_not_sellable() {
        let product = Product::from_catalog(catalog_entry(), test_time()).unwrap();
        assert_eq!(product.status, ProductStatus::CatalogOnly);
        assert_eq!(product.sale_price, Money::ZERO);
        assert_eq!(product.unit, UnitOfMeasure::Unit);
        assert!(!product.is_sellable());
    }

    #[test]
    fn receipt_promotes_catalog_product_once() {
        let mut product = Product::from_catalog(catalog_entry(), test_time()).unwrap();

        assert!(product.mark_received(Money::from_minor(800), test_time()));
        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(product.purchase_price, Money::from_minor(800));

        assert!(!product.mark_received(Money::from_minor(820), test_time()));
        assert_eq!(product.purchase_price, Money::from_minor(820));
    }

    #[test]
    fn receipt_does_not_reactivate_inactive_product() {
        let mut product = Product::register(draft(), test_time()).unwrap();
        product.set_status(ProductStatus::Inactive, test_time()).unwrap();

        assert!(!product.mark_received(Money::from_minor(1000), test_time()));
        assert_eq!(product.status, ProductStatus::Inactive);
    }

    fn edit() -> ProductEdit {
        ProductEdit {
            name: " Arroz Costeño 1kg ".to_string(),
            sku: "ARR-001".to_string(),
            description: Some("bolsa".to_string()),
            sale_price: Money::from_minor(590),
            purchase_price: Money::from_minor(410),
            unit: UnitOfMeasure::Kilogram,
            category_id: Some(CategoryId::new()),
        }
    }

    #[test]
    fn amend_replaces_fields_but_keeps_status() {
        let mut product = Product::from_catalog(catalog_entry(), test_time()).unwrap();
        let change = edit();
        product.amend(change.clone(), test_time()).unwrap();

        assert_eq!(product.name, "Arroz Costeño 1kg");
        assert_eq!(product.sku, "ARR-001");
        assert_eq!(product.sale_price, Money::from_minor(590));
        assert_eq!(product.unit, UnitOfMeasure::Kilogram);
        assert_eq!(product.category_id, change.category_id);
        assert_eq!(product.status, ProductStatus::CatalogOnly);
    }

    #[test]
    fn rejected_amend_leaves_product_untouched() {
        let mut product = Product::register(draft(), test_time()).unwrap();
        let before = product.clone();

        let mut change = edit();
        change.purchase_price = Money::from_minor(-5);
        let err = product.amend(change, test_time()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("purchase_price") => {}
            _ => panic!("Expected Validation error for negative price"),
        }
        assert_eq!(product, before);
    }

    #[test]
    fn set_status_toggles_and_reports_no_op() {
        let mut product = Product::register(draft(), test_time()).unwrap();
        assert!(product.set_status(ProductStatus::Inactive, test_time()).unwrap());
        assert!(!product.set_status(ProductStatus::Inactive, test_time()).unwrap());
        assert!(!product.is_sellable());
    }

    #[test]
    fn set_status_refuses_catalog_only() {
        let mut product = Product::register(draft(), test_time()).unwrap();
        let err = product
            .set_status(ProductStatus::CatalogOnly, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(product.status, ProductStatus::Active);
    }

    #[test]
    fn status_uses_wire_names() {
        let json = serde_json::to_string(&ProductStatus::CatalogOnly).unwrap();
        assert_eq!(json, "\"CATALOG_ONLY\"");
        assert!("catalog_only".parse::<ProductStatus>().is_err());
        assert_eq!("KG".parse::<UnitOfMeasure>().unwrap(), UnitOfMeasure::Kilogram);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Registration keeps the trimmed SKU and never yields a catalog-only product.
            #[test]
            fn register_preserves_trimmed_sku(
                sku in "[A-Z0-9-]{1,20}",
                pad in " {0,3}",
            ) {
                let mut d = draft();
                d.sku = format!("{pad}{sku}{pad}");
                let product = Product::register(d, test_time()).unwrap();
                prop_assert_eq!(product.sku, sku);
                prop_assert_eq!(product.status, ProductStatus::Active);
            }
        }
    }
}
