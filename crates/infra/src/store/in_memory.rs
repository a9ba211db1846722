//! In-memory store with per-row async locks.
//!
//! Intended for tests/dev and single-process deployments. Writes are staged in
//! the transaction and published atomically at commit; each row has its own
//! `tokio::sync::Mutex`, so transactions touching different rows never wait on
//! each other.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use stockflow_core::{
    Entity, ProductId, PurchaseId, SaleId, ShipmentId, StockRecordId, VehicleId, WarehouseId,
};
use stockflow_inventory::{MovementEntry, StockKey, StockRecord};
use stockflow_products::{Product, ProductStatus};
use stockflow_purchasing::Purchase;
use stockflow_sales::Sale;
use stockflow_shipping::{Shipment, Vehicle};

use super::{Reference, Store, Transaction};
use crate::error::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductId),
    Stock(StockKey),
    Purchase(PurchaseId),
    Sale(SaleId),
    Shipment(ShipmentId),
    Vehicle(VehicleId),
}

impl core::fmt::Display for RowKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RowKey::Product(id) => write!(f, "product {id}"),
            RowKey::Stock(key) => write!(f, "stock {key}"),
            RowKey::Purchase(id) => write!(f, "purchase {id}"),
            RowKey::Sale(id) => write!(f, "sale {id}"),
            RowKey::Shipment(id) => write!(f, "shipment {id}"),
            RowKey::Vehicle(id) => write!(f, "vehicle {id}"),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    references: HashSet<Reference>,
    products: HashMap<ProductId, Product>,
    stock: HashMap<StockKey, StockRecord>,
    movements: Vec<MovementEntry>,
    purchases: HashMap<PurchaseId, Purchase>,
    sales: HashMap<SaleId, Sale>,
    shipments: HashMap<ShipmentId, Shipment>,
    vehicles: HashMap<VehicleId, Vehicle>,
}

#[derive(Debug, Default)]
struct Staged {
    products: HashMap<ProductId, Product>,
    stock: HashMap<StockKey, StockRecord>,
    movements: Vec<MovementEntry>,
    purchases: HashMap<PurchaseId, Purchase>,
    sales: HashMap<SaleId, Sale>,
    shipments: HashMap<ShipmentId, Shipment>,
    vehicles: HashMap<VehicleId, Vehicle>,
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
    lock_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::backend(operation, "lock poisoned")
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }

    /// Register a master-data record so existence checks pass.
    pub fn add_reference(&self, reference: Reference) -> Result<(), StoreError> {
        let mut tables = self
            .shared
            .tables
            .write()
            .map_err(|_| poisoned("add_reference"))?;
        tables.references.insert(reference);
        Ok(())
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), StoreError> {
        let mut tables = self
            .shared
            .tables
            .write()
            .map_err(|_| poisoned("add_vehicle"))?;
        tables.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    /// Committed state of a vehicle.
    pub fn vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned("vehicle"))?;
        Ok(tables.vehicles.get(&id).cloned())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: Staged::default(),
            locks: HeldLocks {
                shared: Arc::clone(&self.shared),
                guards: HashMap::new(),
            },
        }))
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    staged: Staged,
    locks: HeldLocks,
}

/// Row locks held by one transaction.
///
/// Dropping releases every guard and forgets the mutexes nobody else is
/// holding or waiting on, so the lock table only tracks contended rows.
struct HeldLocks {
    shared: Arc<Shared>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.guards.drain().map(|(key, _)| key).collect();
        if let Ok(mut locks) = self.shared.locks.lock() {
            for key in keys {
                if locks.get(&key).is_some_and(|mutex| Arc::strong_count(mutex) == 1) {
                    locks.remove(&key);
                }
            }
        }
    }
}

/// Committed rows overlaid with this transaction's staged rows.
fn merged<K, V>(committed: &HashMap<K, V>, staged: &HashMap<K, V>) -> Vec<V>
where
    K: Eq + Hash,
    V: Clone,
{
    committed
        .iter()
        .filter(|(k, _)| !staged.contains_key(*k))
        .map(|(_, v)| v.clone())
        .chain(staged.values().cloned())
        .collect()
}

fn lookup<K, V>(committed: &HashMap<K, V>, staged: &HashMap<K, V>, key: &K) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
{
    staged.get(key).or_else(|| committed.get(key)).cloned()
}

impl InMemoryTransaction {
    fn tables(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.shared.tables.read().map_err(|_| poisoned(operation))
    }

    /// Take the row lock unless this transaction already holds it.
    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.locks.guards.contains_key(&key) {
            return Ok(());
        }
        let mutex = {
            let mut locks = self.shared.locks.lock().map_err(|_| poisoned("acquire"))?;
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = tokio::time::timeout(self.shared.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(key.to_string()))?;
        self.locks.guards.insert(key, guard);
        Ok(())
    }

    fn movements(&self, operation: &'static str) -> Result<Vec<MovementEntry>, StoreError> {
        let tables = self.tables(operation)?;
        Ok(tables
            .movements
            .iter()
            .chain(self.staged.movements.iter())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn reference_exists(&mut self, reference: Reference) -> Result<bool, StoreError> {
        Ok(self.tables("reference_exists")?.references.contains(&reference))
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let tables = self.tables("product")?;
        Ok(lookup(&tables.products, &self.staged.products, &id))
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.acquire(RowKey::Product(id)).await?;
        self.product(id).await
    }

    async fn product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError> {
        let tables = self.tables("product_by_sku")?;
        Ok(merged(&tables.products, &self.staged.products)
            .into_iter()
            .find(|p| p.sku == sku))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if let Some(existing) = self.product_by_sku(&product.sku).await? {
            if existing.id != product.id {
                return Err(StoreError::Conflict(format!("sku '{}' already exists", product.sku)));
            }
        }
        self.staged.products.insert(product.entity_id(), product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.staged.products.insert(product.entity_id(), product.clone());
        Ok(())
    }

    async fn products(&mut self, status: Option<ProductStatus>) -> Result<Vec<Product>, StoreError> {
        let tables = self.tables("products")?;
        let mut products: Vec<Product> = merged(&tables.products, &self.staged.products)
            .into_iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        let tables = self.tables("stock")?;
        Ok(lookup(&tables.stock, &self.staged.stock, &key))
    }

    async fn lock_stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        self.acquire(RowKey::Stock(key)).await?;
        self.stock(key).await
    }

    async fn lock_or_insert_stock(&mut self, fresh: StockRecord) -> Result<StockRecord, StoreError> {
        let key = fresh.key();
        if let Some(existing) = self.lock_stock(key).await? {
            return Ok(existing);
        }
        self.staged.stock.insert(key, fresh.clone());
        Ok(fresh)
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<(), StoreError> {
        self.staged.stock.insert(record.key(), record.clone());
        Ok(())
    }

    async fn stock_in_warehouse(
        &mut self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<StockRecord>, StoreError> {
        let tables = self.tables("stock_in_warehouse")?;
        let mut records: Vec<StockRecord> = merged(&tables.stock, &self.staged.stock)
            .into_iter()
            .filter(|r| r.warehouse_id() == warehouse_id)
            .collect();
        records.sort_by_key(|r| r.key());
        Ok(records)
    }

    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError> {
        self.staged.movements.push(entry.clone());
        Ok(())
    }

    async fn movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<MovementEntry>, StoreError> {
        let mut entries: Vec<MovementEntry> = self
            .movements("movements_for_product")?
            .into_iter()
            .filter(|m| m.product_id == product_id)
            .collect();
        entries.reverse();
        Ok(entries)
    }

    async fn movements_for_record(
        &mut self,
        record_id: StockRecordId,
    ) -> Result<Vec<MovementEntry>, StoreError> {
        Ok(self
            .movements("movements_for_record")?
            .into_iter()
            .filter(|m| m.stock_record_id == record_id)
            .collect())
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        self.staged.purchases.insert(purchase.entity_id(), purchase.clone());
        Ok(())
    }

    async fn purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        let tables = self.tables("purchase")?;
        Ok(lookup(&tables.purchases, &self.staged.purchases, &id))
    }

    async fn lock_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError> {
        self.acquire(RowKey::Purchase(id)).await?;
        self.purchase(id).await
    }

    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError> {
        self.staged.purchases.insert(purchase.entity_id(), purchase.clone());
        Ok(())
    }

    async fn purchases(&mut self) -> Result<Vec<Purchase>, StoreError> {
        let tables = self.tables("purchases")?;
        let mut purchases = merged(&tables.purchases, &self.staged.purchases);
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(purchases)
    }

    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        self.staged.sales.insert(sale.entity_id(), sale.clone());
        Ok(())
    }

    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let tables = self.tables("sale")?;
        Ok(lookup(&tables.sales, &self.staged.sales, &id))
    }

    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        self.acquire(RowKey::Sale(id)).await?;
        self.sale(id).await
    }

    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        self.staged.sales.insert(sale.entity_id(), sale.clone());
        Ok(())
    }

    async fn sales(&mut self) -> Result<Vec<Sale>, StoreError> {
        let tables = self.tables("sales")?;
        let mut sales = merged(&tables.sales, &self.staged.sales);
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(sales)
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        self.staged.shipments.insert(shipment.entity_id(), shipment.clone());
        Ok(())
    }

    async fn shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let tables = self.tables("shipment")?;
        Ok(lookup(&tables.shipments, &self.staged.shipments, &id))
    }

    async fn lock_shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        self.acquire(RowKey::Shipment(id)).await?;
        self.shipment(id).await
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError> {
        self.staged.shipments.insert(shipment.entity_id(), shipment.clone());
        Ok(())
    }

    async fn shipments(&mut self) -> Result<Vec<Shipment>, StoreError> {
        let tables = self.tables("shipments")?;
        let mut shipments = merged(&tables.shipments, &self.staged.shipments);
        shipments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(shipments)
    }

    async fn lock_vehicle(&mut self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        self.acquire(RowKey::Vehicle(id)).await?;
        let tables = self.tables("lock_vehicle")?;
        Ok(lookup(&tables.vehicles, &self.staged.vehicles, &id))
    }

    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), StoreError> {
        self.staged.vehicles.insert(vehicle.entity_id(), vehicle.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            shared,
            staged,
            locks,
        } = *self;

        {
            let mut tables = shared.tables.write().map_err(|_| poisoned("commit"))?;

            for product in staged.products.values() {
                let clash = tables
                    .products
                    .values()
                    .any(|p| p.sku == product.sku && p.id != product.id);
                if clash {
                    return Err(StoreError::Conflict(format!(
                        "sku '{}' already exists",
                        product.sku
                    )));
                }
            }
            for (key, record) in &staged.stock {
                if let Some(existing) = tables.stock.get(key) {
                    if existing.id() != record.id() {
                        return Err(StoreError::Conflict(format!(
                            "stock record for {key} already exists"
                        )));
                    }
                }
            }

            tables.products.extend(staged.products);
            tables.stock.extend(staged.stock);
            tables.movements.extend(staged.movements);
            tables.purchases.extend(staged.purchases);
            tables.sales.extend(staged.sales);
            tables.shipments.extend(staged.shipments);
            tables.vehicles.extend(staged.vehicles);
        }

        drop(locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockflow_core::Money;
    use stockflow_inventory::StockThresholds;
    use stockflow_products::{NewProduct, UnitOfMeasure};

    fn product(sku: &str) -> Product {
        Product::register(
            NewProduct {
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                description: None,
                sale_price: Money::from_minor(100),
                purchase_price: Money::from_minor(60),
                unit: UnitOfMeasure::Unit,
                category_id: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn record() -> StockRecord {
        StockRecord::open(
            StockKey::new(ProductId::new(), WarehouseId::new()),
            StockThresholds::new(0, None, None).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryStore::default();
        let p = product("SKU-1");

        let mut writer = store.begin().await.unwrap();
        writer.insert_product(&p).await.unwrap();
        assert!(writer.product(p.id).await.unwrap().is_some());

        let mut reader = store.begin().await.unwrap();
        assert!(reader.product(p.id).await.unwrap().is_none());

        writer.commit().await.unwrap();
        assert!(reader.product(p.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryStore::default();
        let p = product("SKU-1");
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&p).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.product(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_sku_conflicts_at_commit() {
        let store = InMemoryStore::default();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_product(&product("DUP")).await.unwrap();
        second.insert_product(&product("DUP")).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn row_lock_times_out_while_held() {
        let store = InMemoryStore::new(Duration::from_millis(50));
        let fresh = record();
        let key = fresh.key();

        let mut holder = store.begin().await.unwrap();
        holder.lock_or_insert_stock(fresh).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_stock(key).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));

        holder.commit().await.unwrap();
        assert!(waiter.lock_stock(key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn different_rows_do_not_block() {
        let store = InMemoryStore::new(Duration::from_millis(50));
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.lock_or_insert_stock(record()).await.unwrap();
        b.lock_or_insert_stock(record()).await.unwrap();
        a.commit().await.unwrap();
        b.commit().await.unwrap();
    }

    #[tokio::test]
    async fn lock_is_reentrant_within_a_transaction() {
        let store = InMemoryStore::new(Duration::from_millis(50));
        let fresh = record();
        let key = fresh.key();
        let mut tx = store.begin().await.unwrap();
        tx.lock_or_insert_stock(fresh).await.unwrap();
        assert!(tx.lock_stock(key).await.unwrap().is_some());
    }

    fn tracked_locks(store: &InMemoryStore) -> usize {
        store.shared.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn released_row_locks_are_forgotten() {
        let store = InMemoryStore::new(Duration::from_millis(50));
        let fresh = record();
        let key = fresh.key();

        let mut tx = store.begin().await.unwrap();
        tx.lock_or_insert_stock(fresh).await.unwrap();
        assert_eq!(tracked_locks(&store), 1);
        tx.commit().await.unwrap();
        assert_eq!(tracked_locks(&store), 0);

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_stock(key).await.unwrap();
            assert_eq!(tracked_locks(&store), 1);
        }
        assert_eq!(tracked_locks(&store), 0);

        let mut holder = store.begin().await.unwrap();
        holder.lock_stock(key).await.unwrap();
        let mut waiter = store.begin().await.unwrap();
        assert!(waiter.lock_stock(key).await.is_err());
        holder.rollback().await.unwrap();
        assert_eq!(tracked_locks(&store), 0);
    }
}
