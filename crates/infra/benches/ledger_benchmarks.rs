use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use stockflow_core::{CustomerId, Money, ProductId, UserId, WarehouseId};
use stockflow_infra::config::PolicySettings;
use stockflow_infra::{InMemoryStore, InitialPlacement, Reference, Workflows};
use stockflow_inventory::{
    MovementEntry, MovementKind, MovementRequest, StockKey, StockRecord, StockThresholds, replay,
};
use stockflow_products::{NewProduct, UnitOfMeasure};
use stockflow_sales::{NewSale, NewSaleLine};
use std::sync::Arc;

fn open_record() -> StockRecord {
    StockRecord::open(
        StockKey::new(ProductId::new(), WarehouseId::new()),
        StockThresholds::new(0, None, None).unwrap(),
        Utc::now(),
    )
    .unwrap()
}

/// A log of `len` alternating receipts and issues that never goes negative.
fn movement_log(len: usize) -> (StockRecord, Vec<MovementEntry>) {
    let mut record = open_record();
    let now = Utc::now();
    let entries = (0..len)
        .map(|i| {
            let request = if i % 2 == 0 {
                MovementRequest::new(MovementKind::Entrada, 10, "receipt")
            } else {
                MovementRequest::new(MovementKind::Salida, 7, "issue")
            };
            record.apply(&request, now).unwrap()
        })
        .collect();
    (record, entries)
}

fn bench_movement_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_apply_latency");
    group.sample_size(1000);

    let receipt = MovementRequest::new(MovementKind::Entrada, 5, "receipt");
    group.bench_function("entrada", |b| {
        let mut record = open_record();
        b.iter(|| black_box(record.apply(black_box(&receipt), Utc::now()).unwrap()));
    });

    let issue = MovementRequest::new(MovementKind::Salida, 1_000, "issue");
    group.bench_function("salida_rejected", |b| {
        let mut record = open_record();
        b.iter(|| black_box(record.apply(black_box(&issue), Utc::now()).is_err()));
    });

    group.finish();
}

fn bench_log_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_replay_speed");

    for len in [10usize, 100, 1_000, 10_000].iter() {
        let (record, entries) = movement_log(*len);
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &entries, |b, entries| {
            b.iter(|| {
                let report = replay(record.id(), record.quantity(), black_box(entries));
                assert!(report.is_consistent());
            });
        });
    }

    group.finish();
}

fn bench_sale_workflow(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let store = InMemoryStore::default();
    let warehouse = WarehouseId::new();
    let seller = UserId::new();
    let customer = CustomerId::new();
    for reference in [
        Reference::Warehouse(warehouse),
        Reference::User(seller),
        Reference::Customer(customer),
    ] {
        store.add_reference(reference).unwrap();
    }
    let workflows = Workflows::new(
        Arc::new(store),
        StockThresholds::new(0, None, None).unwrap(),
        PolicySettings::default(),
    );

    let product_id = runtime.block_on(async {
        workflows
            .register_product(
                NewProduct {
                    name: "Bench widget".to_string(),
                    sku: "BENCH-1".to_string(),
                    description: None,
                    sale_price: Money::from_minor(100),
                    purchase_price: Money::from_minor(60),
                    unit: UnitOfMeasure::Unit,
                    category_id: None,
                },
                Some(InitialPlacement {
                    warehouse_id: warehouse,
                    quantity: 1_000_000_000,
                    thresholds: None,
                }),
                Some(seller),
            )
            .await
            .unwrap()
            .product
            .id
    });

    let mut group = c.benchmark_group("sale_workflow_latency");
    group.bench_function("single_line_sale", |b| {
        b.iter(|| {
            let draft = NewSale {
                customer_id: Some(customer),
                warehouse_id: warehouse,
                seller_id: seller,
                discount: Money::ZERO,
                tax: Money::ZERO,
                lines: vec![NewSaleLine {
                    product_id,
                    quantity: 1,
                    unit_price: Money::from_minor(100),
                }],
            };
            runtime.block_on(workflows.create_sale(draft, None)).unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_movement_apply,
    bench_log_replay,
    bench_sale_workflow
);
criterion_main!(benches);
