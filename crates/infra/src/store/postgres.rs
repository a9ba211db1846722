//! PostgreSQL store.
//!
//! Every transaction runs at READ COMMITTED with a transaction-local
//! `lock_timeout`. Mutated rows are taken with `SELECT ... FOR UPDATE`, so two
//! transactions debiting the same stock row serialize on that row only.
//!
//! ## Error Mapping
//!
//! | SQLSTATE | Meaning | StoreError |
//! |----------|---------|------------|
//! | `23505` | unique violation (duplicate SKU, stock pair) | `Conflict` |
//! | `55P03` | lock not available within `lock_timeout` | `LockTimeout` |
//! | other | | `Backend` |

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use stockflow_core::{
    CategoryId, CustomerId, DomainError, DriverId, Money, MovementId, ProductId, PurchaseId,
    RouteId, SaleId, ShipmentId, StockRecordId, SupplierId, UserId, VehicleId, WarehouseId,
};
use stockflow_inventory::{
    MovementEntry, StockKey, StockRecord, StockRecordParts, StockThresholds,
};
use stockflow_products::{Product, ProductStatus};
use stockflow_purchasing::{Purchase, PurchaseLine, Voucher};
use stockflow_sales::{Sale, SaleLine};
use stockflow_shipping::{Shipment, Vehicle};

use super::{Reference, Store, Transaction};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_stockflow.sql");

const SELECT_PRODUCT: &str = "SELECT id, name, sku, description, sale_price, purchase_price, \
     unit, category_id, status, created_at, updated_at FROM products";

const SELECT_STOCK: &str = "SELECT id, product_id, warehouse_id, quantity, min_stock, \
     max_stock, location, version, created_at, updated_at FROM stock_records";

const SELECT_MOVEMENT: &str = "SELECT id, stock_record_id, product_id, warehouse_id, kind, \
     delta, stock_before, stock_after, reason, actor_id, sequence, occurred_at \
     FROM stock_movements";

const SELECT_PURCHASE: &str = "SELECT id, supplier_id, warehouse_id, buyer_id, voucher_kind, \
     voucher_number, payment_method, notes, subtotal, tax, total, status, created_at, \
     updated_at FROM purchases";

const SELECT_SALE: &str = "SELECT id, customer_id, warehouse_id, seller_id, subtotal, \
     discount, tax, total, status, created_at, updated_at FROM sales";

const SELECT_SHIPMENT: &str = "SELECT id, sale_id, address, vehicle_id, driver_id, route_id, \
     scheduled_date, delivered_date, transport_cost, notes, status, created_at, updated_at \
     FROM shipments";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Create tables, constraints and the append-only trigger if missing.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PostgresTransaction { tx }))
    }
}

pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("55P03") => StoreError::LockTimeout(msg),
                _ => StoreError::backend(operation, msg),
            }
        }
        other => StoreError::backend(operation, other.to_string()),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn wire<T>(row: &PgRow, name: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = DomainError>,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e: DomainError| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn count(row: &PgRow, name: &str) -> Result<u64, StoreError> {
    let value: i64 = col(row, name)?;
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("column {name}: negative {value}")))
}

fn money(row: &PgRow, name: &str) -> Result<Money, StoreError> {
    Ok(Money::from_minor(col(row, name)?))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(col(row, "id")?),
        name: col(row, "name")?,
        sku: col(row, "sku")?,
        description: col(row, "description")?,
        sale_price: money(row, "sale_price")?,
        purchase_price: money(row, "purchase_price")?,
        unit: wire(row, "unit")?,
        category_id: col::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        status: wire(row, "status")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn stock_from_row(row: &PgRow) -> Result<StockRecord, StoreError> {
    let parts = StockRecordParts {
        id: StockRecordId::from_uuid(col(row, "id")?),
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        warehouse_id: WarehouseId::from_uuid(col(row, "warehouse_id")?),
        quantity: col(row, "quantity")?,
        thresholds: StockThresholds {
            min: col(row, "min_stock")?,
            max: col(row, "max_stock")?,
            location: col(row, "location")?,
        },
        version: count(row, "version")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    };
    StockRecord::restore(parts).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn movement_from_row(row: &PgRow) -> Result<MovementEntry, StoreError> {
    Ok(MovementEntry {
        id: MovementId::from_uuid(col(row, "id")?),
        stock_record_id: StockRecordId::from_uuid(col(row, "stock_record_id")?),
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        warehouse_id: WarehouseId::from_uuid(col(row, "warehouse_id")?),
        kind: wire(row, "kind")?,
        delta: col(row, "delta")?,
        stock_before: col(row, "stock_before")?,
        stock_after: col(row, "stock_after")?,
        reason: col(row, "reason")?,
        actor: col::<Option<Uuid>>(row, "actor_id")?.map(UserId::from_uuid),
        sequence: count(row, "sequence")?,
        occurred_at: col(row, "occurred_at")?,
    })
}

/// Order line columns shared by purchase and sale lines.
struct LineRow {
    owner: Uuid,
    line_no: u32,
    product_id: ProductId,
    quantity: i64,
    unit_price: Money,
}

fn line_from_row(row: &PgRow, owner_column: &str) -> Result<LineRow, StoreError> {
    let line_no: i32 = col(row, "line_no")?;
    Ok(LineRow {
        owner: col(row, owner_column)?,
        line_no: u32::try_from(line_no)
            .map_err(|_| StoreError::Corrupt(format!("line_no {line_no}")))?,
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        quantity: col(row, "quantity")?,
        unit_price: money(row, "unit_price")?,
    })
}

fn purchase_from_row(row: &PgRow, lines: Vec<PurchaseLine>) -> Result<Purchase, StoreError> {
    let voucher_kind: Option<String> = col(row, "voucher_kind")?;
    let voucher_number: Option<String> = col(row, "voucher_number")?;
    Ok(Purchase {
        id: PurchaseId::from_uuid(col(row, "id")?),
        supplier_id: SupplierId::from_uuid(col(row, "supplier_id")?),
        warehouse_id: WarehouseId::from_uuid(col(row, "warehouse_id")?),
        buyer_id: UserId::from_uuid(col(row, "buyer_id")?),
        voucher: voucher_kind
            .zip(voucher_number)
            .map(|(kind, number)| Voucher { kind, number }),
        payment_method: col(row, "payment_method")?,
        notes: col(row, "notes")?,
        subtotal: money(row, "subtotal")?,
        tax: money(row, "tax")?,
        total: money(row, "total")?,
        status: wire(row, "status")?,
        lines,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn sale_from_row(row: &PgRow, lines: Vec<SaleLine>) -> Result<Sale, StoreError> {
    Ok(Sale {
        id: SaleId::from_uuid(col(row, "id")?),
        customer_id: col::<Option<Uuid>>(row, "customer_id")?.map(CustomerId::from_uuid),
        warehouse_id: WarehouseId::from_uuid(col(row, "warehouse_id")?),
        seller_id: UserId::from_uuid(col(row, "seller_id")?),
        subtotal: money(row, "subtotal")?,
        discount: money(row, "discount")?,
        tax: money(row, "tax")?,
        total: money(row, "total")?,
        status: wire(row, "status")?,
        lines,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn shipment_from_row(row: &PgRow) -> Result<Shipment, StoreError> {
    Ok(Shipment {
        id: ShipmentId::from_uuid(col(row, "id")?),
        sale_id: col::<Option<Uuid>>(row, "sale_id")?.map(SaleId::from_uuid),
        address: col(row, "address")?,
        vehicle_id: col::<Option<Uuid>>(row, "vehicle_id")?.map(VehicleId::from_uuid),
        driver_id: col::<Option<Uuid>>(row, "driver_id")?.map(DriverId::from_uuid),
        route_id: col::<Option<Uuid>>(row, "route_id")?.map(RouteId::from_uuid),
        scheduled_date: col(row, "scheduled_date")?,
        delivered_date: col(row, "delivered_date")?,
        transport_cost: money(row, "transport_cost")?,
        notes: col(row, "notes")?,
        status: wire(row, "status")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn vehicle_from_row(row: &PgRow) -> Result<Vehicle, StoreError> {
    Ok(Vehicle {
        id: VehicleId::from_uuid(col(row, "id")?),
        plate: col(row, "plate")?,
        status: wire(row, "status")?,
        updated_at: col(row, "updated_at")?,
    })
}

impl PostgresTransaction {
    async fn fetch_optional(
        &mut self,
        operation: &'static str,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<PgRow>, StoreError> {
        sqlx::query(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn lines_of(
        &mut self,
        table: &'static str,
        owner_column: &'static str,
        owners: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<LineRow>>, StoreError> {
        let sql = format!(
            "SELECT {owner_column}, line_no, product_id, quantity, unit_price FROM {table} \
             WHERE {owner_column} = ANY($1) ORDER BY {owner_column}, line_no"
        );
        let rows = sqlx::query(&sql)
            .bind(owners)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_lines", e))?;

        let mut grouped: HashMap<Uuid, Vec<LineRow>> = HashMap::new();
        for row in &rows {
            let line = line_from_row(row, owner_column)?;
            grouped.entry(line.owner).or_default().push(line);
        }
        Ok(grouped)
    }

    async fn load_purchases(&mut self, rows: Vec<PgRow>) -> Result<Vec<Purchase>, StoreError> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| col(r, "id"))
            .collect::<Result<_, _>>()?;
        let mut lines = self.lines_of("purchase_lines", "purchase_id", &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let own = lines
                    .remove(&id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|l| PurchaseLine {
                        line_no: l.line_no,
                        product_id: l.product_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                    })
                    .collect();
                purchase_from_row(row, own)
            })
            .collect()
    }

    async fn load_sales(&mut self, rows: Vec<PgRow>) -> Result<Vec<Sale>, StoreError> {
        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| col(r, "id"))
            .collect::<Result<_, _>>()?;
        let mut lines = self.lines_of("sale_lines", "sale_id", &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let own = lines
                    .remove(&id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|l| SaleLine {
                        line_no: l.line_no,
                        product_id: l.product_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                    })
                    .collect();
                sale_from_row(row, own)
            })
            .collect()
    }

    async fn insert_line(
        &mut self,
        table: &'static str,
        owner_column: &'static str,
        owner: Uuid,
        line: (u32, ProductId, i64, Money),
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {table} ({owner_column}, line_no, product_id, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5)"
        );
        let (line_no, product_id, quantity, unit_price) = line;
        sqlx::query(&sql)
            .bind(owner)
            .bind(line_no as i32)
            .bind(product_id.as_uuid())
            .bind(quantity)
            .bind(unit_price.minor())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn reference_exists(&mut self, reference: Reference) -> Result<bool, StoreError> {
        let (table, id): (&str, Uuid) = match reference {
            Reference::Supplier(id) => ("suppliers", id.into()),
            Reference::Warehouse(id) => ("warehouses", id.into()),
            Reference::User(id) => ("users", id.into()),
            Reference::Customer(id) => ("customers", id.into()),
            Reference::Category(id) => ("categories", id.into()),
            Reference::Driver(id) => ("drivers", id.into()),
            Reference::Route(id) => ("routes", id.into()),
        };
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1) AS present");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("reference_exists", e))?;
        col(&row, "present")
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("{SELECT_PRODUCT} WHERE id = $1");
        self.fetch_optional("product", &sql, id.into())
            .await?
            .as_ref()
            .map(product_from_row)
            .transpose()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("{SELECT_PRODUCT} WHERE id = $1 FOR UPDATE");
        self.fetch_optional("lock_product", &sql, id.into())
            .await?
            .as_ref()
            .map(product_from_row)
            .transpose()
    }

    async fn product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("{SELECT_PRODUCT} WHERE sku = $1");
        sqlx::query(&sql)
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_by_sku", e))?
            .as_ref()
            .map(product_from_row)
            .transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, description, sale_price, purchase_price,
                unit, category_id, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.description.as_deref())
        .bind(product.sale_price.minor())
        .bind(product.purchase_price.minor())
        .bind(product.unit.as_str())
        .bind(product.category_id.map(Uuid::from))
        .bind(product.status.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, sale_price = $4, purchase_price = $5,
                unit = $6, category_id = $7, status = $8, updated_at = $9, sku = $10
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.sale_price.minor())
        .bind(product.purchase_price.minor())
        .bind(product.unit.as_str())
        .bind(product.category_id.map(Uuid::from))
        .bind(product.status.as_str())
        .bind(product.updated_at)
        .bind(&product.sku)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn products(&mut self, status: Option<ProductStatus>) -> Result<Vec<Product>, StoreError> {
        let sql = format!("{SELECT_PRODUCT} WHERE ($1::text IS NULL OR status = $1) ORDER BY name, id");
        let rows = sqlx::query(&sql)
            .bind(status.map(ProductStatus::as_str))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        let sql = format!("{SELECT_STOCK} WHERE product_id = $1 AND warehouse_id = $2");
        sqlx::query(&sql)
            .bind(key.product_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("stock", e))?
            .as_ref()
            .map(stock_from_row)
            .transpose()
    }

    #[instrument(skip(self), fields(stock = %key), err)]
    async fn lock_stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        let sql = format!("{SELECT_STOCK} WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE");
        sqlx::query(&sql)
            .bind(key.product_id.as_uuid())
            .bind(key.warehouse_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_stock", e))?
            .as_ref()
            .map(stock_from_row)
            .transpose()
    }

    #[instrument(skip(self, fresh), fields(stock = %fresh.key()), err)]
    async fn lock_or_insert_stock(&mut self, fresh: StockRecord) -> Result<StockRecord, StoreError> {
        // A concurrent insert of the same pair blocks here until it resolves.
        sqlx::query(
            r#"
            INSERT INTO stock_records (
                id, product_id, warehouse_id, quantity, min_stock, max_stock,
                location, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(fresh.id().as_uuid())
        .bind(fresh.product_id().as_uuid())
        .bind(fresh.warehouse_id().as_uuid())
        .bind(fresh.quantity())
        .bind(fresh.thresholds().min)
        .bind(fresh.thresholds().max)
        .bind(fresh.thresholds().location.as_deref())
        .bind(fresh.version() as i64)
        .bind(fresh.created_at())
        .bind(fresh.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock", e))?;

        self.lock_stock(fresh.key()).await?.ok_or_else(|| {
            StoreError::Corrupt(format!("stock record for {} vanished after insert", fresh.key()))
        })
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = $2, min_stock = $3, max_stock = $4, location = $5,
                version = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.quantity())
        .bind(record.thresholds().min)
        .bind(record.thresholds().max)
        .bind(record.thresholds().location.as_deref())
        .bind(record.version() as i64)
        .bind(record.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_stock", e))?;
        Ok(())
    }

    async fn stock_in_warehouse(
        &mut self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<StockRecord>, StoreError> {
        let sql = format!("{SELECT_STOCK} WHERE warehouse_id = $1 ORDER BY product_id");
        let rows = sqlx::query(&sql)
            .bind(warehouse_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("stock_in_warehouse", e))?;
        rows.iter().map(stock_from_row).collect()
    }

    #[instrument(skip(self, entry), fields(movement_id = %entry.id, kind = %entry.kind), err)]
    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, stock_record_id, product_id, warehouse_id, kind, delta,
                stock_before, stock_after, reason, actor_id, sequence, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.stock_record_id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.warehouse_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.delta)
        .bind(entry.stock_before)
        .bind(entry.stock_after)
        .bind(&entry.reason)
        .bind(entry.actor.map(Uuid::from))
        .bind(entry.sequence as i64)
        .bind(entry.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    async fn movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<MovementEntry>, StoreError> {
        let sql = format!("{SELECT_MOVEMENT} WHERE product_id = $1 ORDER BY position DESC");
        let rows = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("movements_for_product", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    async fn movements_for_record(
        &mut self,
        record_id: StockRecordId,
    ) -> Result<Vec<MovementEntry>, StoreError> {
        let sql = format!("{SELECT_MOVEMENT} WHERE stock_record_id = $1 ORDER BY position ASC");
        let rows = sqlx::query(&sql)
            .bind(record_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("movements_for_record", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, supplier_id, warehouse_id, buyer_id, voucher_kind, voucher_number,
                payment_method, notes, subtotal, tax, total, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.supplier_id.as_uuid())
        .bind(purchase.warehouse_id.as_uuid())
        .bind(purchase.buyer_id.as_uuid())
        .bind(purchase.voucher.as_ref().map(|v| v.kind.as_str()))
        .bind(purchase.voucher.as_ref().map(|v| v.number.as_str()))
        .bind(purchase.payment_method.as_deref())
        .bind(purchase.notes.as_deref())
        .bind(purchase.subtotal.minor())
        .bind(purchase.tax.minor())
        .bind(purchase.total.minor())
        .bind(purchase.status.as_str())
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase", e))?;

        for line in &purchase.lines {
            self.insert_line(
                "purchase_lines",
                "purchase_id",
                purchase.id.into(),
                (line.line_no, line.product_id, line.quantity, line.unit_price),
            )
            .await?;
        }
        Ok(())
    }

    async fn purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        let sql = format!("{SELECT_PURCHASE} WHERE id = $1");
        let Some(row) = self.fetch_optional("purchase", &sql, id.into()).await? else {
            return Ok(None);
        };
        Ok(self.load_purchases(vec![row]).await?.pop())
    }

    async fn lock_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        let sql = format!("{SELECT_PURCHASE} WHERE id = $1 FOR UPDATE");
        let Some(row) = self.fetch_optional("lock_purchase", &sql, id.into()).await? else {
            return Ok(None);
        };
        Ok(self.load_purchases(vec![row]).await?.pop())
    }

    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        sqlx::query("UPDATE purchases SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(purchase.id.as_uuid())
            .bind(purchase.status.as_str())
            .bind(purchase.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_purchase", e))?;
        Ok(())
    }

    async fn purchases(&mut self) -> Result<Vec<Purchase>, StoreError> {
        let sql = format!("{SELECT_PURCHASE} ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("purchases", e))?;
        self.load_purchases(rows).await
    }

    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, warehouse_id, seller_id, subtotal, discount, tax,
                total, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.customer_id.map(Uuid::from))
        .bind(sale.warehouse_id.as_uuid())
        .bind(sale.seller_id.as_uuid())
        .bind(sale.subtotal.minor())
        .bind(sale.discount.minor())
        .bind(sale.tax.minor())
        .bind(sale.total.minor())
        .bind(sale.status.as_str())
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;

        for line in &sale.lines {
            self.insert_line(
                "sale_lines",
                "sale_id",
                sale.id.into(),
                (line.line_no, line.product_id, line.quantity, line.unit_price),
            )
            .await?;
        }
        Ok(())
    }

    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let sql = format!("{SELECT_SALE} WHERE id = $1");
        let Some(row) = self.fetch_optional("sale", &sql, id.into()).await? else {
            return Ok(None);
        };
        Ok(self.load_sales(vec![row]).await?.pop())
    }

    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let sql = format!("{SELECT_SALE} WHERE id = $1 FOR UPDATE");
        let Some(row) = self.fetch_optional("lock_sale", &sql, id.into()).await? else {
            return Ok(None);
        };
        Ok(self.load_sales(vec![row]).await?.pop())
    }

    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query("UPDATE sales SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(sale.id.as_uuid())
            .bind(sale.status.as_str())
            .bind(sale.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_sale", e))?;
        Ok(())
    }

    async fn sales(&mut self) -> Result<Vec<Sale>, StoreError> {
        let sql = format!("{SELECT_SALE} ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("sales", e))?;
        self.load_sales(rows).await
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shipments (
                id, sale_id, address, vehicle_id, driver_id, route_id, scheduled_date,
                delivered_date, transport_cost, notes, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(shipment.sale_id.map(Uuid::from))
        .bind(&shipment.address)
        .bind(shipment.vehicle_id.map(Uuid::from))
        .bind(shipment.driver_id.map(Uuid::from))
        .bind(shipment.route_id.map(Uuid::from))
        .bind(shipment.scheduled_date)
        .bind(shipment.delivered_date)
        .bind(shipment.transport_cost.minor())
        .bind(shipment.notes.as_deref())
        .bind(shipment.status.as_str())
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment", e))?;
        Ok(())
    }

    async fn shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let sql = format!("{SELECT_SHIPMENT} WHERE id = $1");
        self.fetch_optional("shipment", &sql, id.into())
            .await?
            .as_ref()
            .map(shipment_from_row)
            .transpose()
    }

    async fn lock_shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let sql = format!("{SELECT_SHIPMENT} WHERE id = $1 FOR UPDATE");
        self.fetch_optional("lock_shipment", &sql, id.into())
            .await?
            .as_ref()
            .map(shipment_from_row)
            .transpose()
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE shipments
            SET address = $2, vehicle_id = $3, driver_id = $4, route_id = $5,
                scheduled_date = $6, delivered_date = $7, transport_cost = $8,
                notes = $9, status = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(shipment.id.as_uuid())
        .bind(&shipment.address)
        .bind(shipment.vehicle_id.map(Uuid::from))
        .bind(shipment.driver_id.map(Uuid::from))
        .bind(shipment.route_id.map(Uuid::from))
        .bind(shipment.scheduled_date)
        .bind(shipment.delivered_date)
        .bind(shipment.transport_cost.minor())
        .bind(shipment.notes.as_deref())
        .bind(shipment.status.as_str())
        .bind(shipment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_shipment", e))?;
        Ok(())
    }

    async fn shipments(&mut self) -> Result<Vec<Shipment>, StoreError> {
        let sql = format!("{SELECT_SHIPMENT} ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("shipments", e))?;
        rows.iter().map(shipment_from_row).collect()
    }

    async fn lock_vehicle(&mut self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        self.fetch_optional(
            "lock_vehicle",
            "SELECT id, plate, status, updated_at FROM vehicles WHERE id = $1 FOR UPDATE",
            id.into(),
        )
        .await?
        .as_ref()
        .map(vehicle_from_row)
        .transpose()
    }

    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), StoreError> {
        sqlx::query("UPDATE vehicles SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(vehicle.id.as_uuid())
            .bind(vehicle.status.as_str())
            .bind(vehicle.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_vehicle", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}
