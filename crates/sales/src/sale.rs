use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    CustomerId, DomainError, DomainResult, Entity, Lifecycle, Money, ProductId, SaleId, UserId,
    WarehouseId, wire_enum,
};

wire_enum! {
    /// Sale lifecycle: `PENDIENTE -> {COMPLETADA, ANULADA}`.
    ///
    /// `PENDIENTE` means awaiting shipment delivery.
    pub enum SaleStatus: "sale status" {
        Pendiente => "PENDIENTE",
        Completada => "COMPLETADA",
        Anulada => "ANULADA",
    }
}

impl Lifecycle for SaleStatus {
    const ENTITY: &'static str = "sale";

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pendiente, SaleStatus::Completada)
                | (SaleStatus::Pendiente, SaleStatus::Anulada)
        )
    }

    fn is_terminal(self) -> bool {
        !matches!(self, SaleStatus::Pendiente)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl SaleLine {
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Input for `Sale::open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub warehouse_id: WarehouseId,
    pub seller_id: UserId,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    pub lines: Vec<NewSaleLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub warehouse_id: WarehouseId,
    pub seller_id: UserId,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub status: SaleStatus,
    pub lines: Vec<SaleLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Build a sale; `PENDIENTE` when a delivery follows, `COMPLETADA` otherwise.
    pub fn open(draft: NewSale, wants_delivery: bool, at: DateTime<Utc>) -> DomainResult<Self> {
        if draft.lines.is_empty() {
            return Err(DomainError::validation("sale must have at least one line"));
        }
        let discount = draft.discount.ensure_non_negative("discount")?;
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

            let line = SaleLine {
                line_no,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            };
            subtotal = subtotal.checked_add(line.subtotal()?)?;
            lines.push(line);
        }

        let total = subtotal.checked_sub(discount)?.checked_add(tax)?;
        if total.is_negative() {
            return Err(DomainError::validation(format!(
                "discount {discount} exceeds sale amount {subtotal}"
            )));
        }

        let status = if wants_delivery {
            SaleStatus::Pendiente
        } else {
            SaleStatus::Completada
        };

        Ok(Self {
            id: SaleId::new(),
            customer_id: draft.customer_id,
            warehouse_id: draft.warehouse_id,
            seller_id: draft.seller_id,
            subtotal,
            discount,
            tax,
            total,
            status,
            lines,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn transition(&mut self, next: SaleStatus, at: DateTime<Utc>) -> DomainResult<()> {
        self.status.ensure_transition(self.id, next)?;
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Put the sale back in `PENDIENTE` because a shipment now carries it.
    ///
    /// Applies from any state. Returns whether the status changed.
    pub fn reopen_for_delivery(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == SaleStatus::Pendiente {
            return false;
        }
        self.status = SaleStatus::Pendiente;
        self.updated_at = at;
        true
    }

    pub fn issue_reason(&self) -> String {
        format!("sale issue #{}", self.id)
    }

    pub fn return_reason(&self) -> String {
        format!("return of cancelled sale #{}", self.id)
    }
}

impl Entity for Sale {
    type Id = SaleId;

    fn entity_id(&self) -> SaleId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: i64, unit_price: i64) -> NewSaleLine {
        NewSaleLine {
            product_id: ProductId::new(),
            quantity,
            unit_price: Money::from_minor(unit_price),
        }
    }

    fn draft(lines: Vec<NewSaleLine>) -> NewSale {
        NewSale {
            customer_id: Some(CustomerId::new()),
            warehouse_id: WarehouseId::new(),
            seller_id: UserId::new(),
            discount: Money::from_minor(100),
            tax: Money::from_minor(50),
            lines,
        }
    }

    #[test]
    fn counter_sale_completes_immediately() {
        let sale = Sale::open(draft(vec![line(6, 250)]), false, test_time()).unwrap();
        assert_eq!(sale.status, SaleStatus::Completada);
        assert_eq!(sale.subtotal, Money::from_minor(1500));
        assert_eq!(sale.total, Money::from_minor(1450));
    }

    #[test]
    fn delivered_sale_starts_pending() {
        let sale = Sale::open(draft(vec![line(1, 250)]), true, test_time()).unwrap();
        assert_eq!(sale.status, SaleStatus::Pendiente);
    }

    #[test]
    fn discount_cannot_exceed_amount() {
        let mut d = draft(vec![line(1, 50)]);
        d.tax = Money::ZERO;
        let err = Sale::open(d, false, test_time()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("discount") => {}
            _ => panic!("Expected Validation error for discount"),
        }
    }

    #[test]
    fn completed_sale_cannot_be_voided_directly() {
        let mut sale = Sale::open(draft(vec![line(1, 250)]), false, test_time()).unwrap();
        let err = sale.transition(SaleStatus::Anulada, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(sale.status, SaleStatus::Completada);
    }

    #[test]
    fn pending_sale_can_be_cancelled() {
        let mut sale = Sale::open(draft(vec![line(1, 250)]), true, test_time()).unwrap();
        sale.transition(SaleStatus::Anulada, test_time()).unwrap();
        assert!(sale.status.is_terminal());
    }

    #[test]
    fn reopen_for_delivery_forces_pending() {
        let mut sale = Sale::open(draft(vec![line(1, 250)]), false, test_time()).unwrap();
        assert!(sale.reopen_for_delivery(test_time()));
        assert_eq!(sale.status, SaleStatus::Pendiente);
        assert!(!sale.reopen_for_delivery(test_time()));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("ENTREGADA".parse::<SaleStatus>().is_err());
    }
}
