use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    DomainError, DomainResult, Entity, Lifecycle, Money, ProductId, PurchaseId, SupplierId,
    UserId, WarehouseId, wire_enum,
};

wire_enum! {
    /// Purchase lifecycle: `PENDIENTE -> {COMPLETADA, ANULADA}`.
    pub enum PurchaseStatus: "purchase status" {
        Pendiente => "PENDIENTE",
        Completada => "COMPLETADA",
        Anulada => "ANULADA",
    }
}

impl Lifecycle for PurchaseStatus {
    const ENTITY: &'static str = "purchase";

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (PurchaseStatus::Pendiente, PurchaseStatus::Completada)
                | (PurchaseStatus::Pendiente, PurchaseStatus::Anulada)
        )
    }

    fn is_terminal(self) -> bool {
        !matches!(self, PurchaseStatus::Pendiente)
    }
}

/// Supporting document of a purchase (invoice, receipt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub kind: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PurchaseLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Input for `Purchase::open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier_id: SupplierId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: UserId,
    #[serde(default)]
    pub voucher: Option<Voucher>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tax: Money,
    pub lines: Vec<NewPurchaseLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub supplier_id: SupplierId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: UserId,
    pub voucher: Option<Voucher>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub status: PurchaseStatus,
    pub lines: Vec<PurchaseLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// Draft a purchase in `PENDIENTE`, numbering lines from 1 and computing totals.
    pub fn open(draft: NewPurchase, at: DateTime<Utc>) -> DomainResult<Self> {
        if draft.lines.is_empty() {
            return Err(DomainError::validation("purchase must have at least one line"));
        }
        let tax = draft.tax.ensure_non_negative("tax")?;

        let mut lines = Vec::with_capacity(draft.lines.len());
        let mut subtotal = Money::ZERO;
        for (idx, line) in draft.lines.into_iter().enumerate() {
            let line_no = idx as u32 + 1;
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "line {line_no}: quantity must be positive (got {})",
                    line.quantity
                )));
            }
            line.unit_price
                .ensure_non_negative(&format!("line {line_no} unit_price"))?;

            let line = PurchaseLine {
                line_no,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            };
            subtotal = subtotal.checked_add(line.subtotal()?)?;
            lines.push(line);
        }

        Ok(Self {
            id: PurchaseId::new(),
            supplier_id: draft.supplier_id,
            warehouse_id: draft.warehouse_id,
            buyer_id: draft.buyer_id,
            voucher: draft.voucher,
            payment_method: draft.payment_method,
            notes: draft.notes,
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
            status: PurchaseStatus::Pendiente,
            lines,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn transition(&mut self, next: PurchaseStatus, at: DateTime<Utc>) -> DomainResult<()> {
        self.status.ensure_transition(self.id, next)?;
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Reason recorded on the ledger entries of this purchase's receipt.
    pub fn receipt_reason(&self) -> String {
        format!("receipt of purchase #{}", self.id)
    }
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn entity_id(&self) -> PurchaseId {
        self.id
    }
}
