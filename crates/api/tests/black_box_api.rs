use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value, json};

use stockflow_api::app::services::AppServices;
use stockflow_core::{CustomerId, SupplierId, UserId, VehicleId, WarehouseId};
use stockflow_infra::config::PolicySettings;
use stockflow_infra::{InMemoryStore, Reference, Workflows};
use stockflow_inventory::StockThresholds;
use stockflow_shipping::Vehicle;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    supplier: SupplierId,
    warehouse: WarehouseId,
    user: UserId,
    customer: CustomerId,
    vehicle: VehicleId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = InMemoryStore::new(Duration::from_secs(2));
        let supplier = SupplierId::new();
        let warehouse = WarehouseId::new();
        let user = UserId::new();
        let customer = CustomerId::new();
        for reference in [
            Reference::Supplier(supplier),
            Reference::Warehouse(warehouse),
            Reference::User(user),
            Reference::Customer(customer),
        ] {
            store.add_reference(reference).unwrap();
        }
        let vehicle = Vehicle::new("TRK-042", Utc::now());
        let vehicle_id = vehicle.id;
        store.add_vehicle(vehicle).unwrap();

        let workflows = Workflows::new(
            Arc::new(store),
            StockThresholds::new(5, None, None).unwrap(),
            PolicySettings::default(),
        );

        // Same router as prod, bound to an ephemeral port.
        let app = stockflow_api::app::build_app(AppServices::new(workflows));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            supplier,
            warehouse,
            user,
            customer,
            vehicle: vehicle_id,
            handle,
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(body)).await
    }

    /// Register an active product with `quantity` units on the shelf.
    async fn stocked_product(&self, sku: &str, quantity: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({
                    "name": format!("Product {sku}"),
                    "sku": sku,
                    "sale_price": 1200,
                    "purchase_price": 800,
                    "unit": "UNIT",
                    "placement": { "warehouse_id": self.warehouse, "quantity": quantity },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["product"]["id"].as_str().unwrap().to_string()
    }

    async fn quantity(&self, product_id: &str) -> i64 {
        let (status, body) = self
            .get(&format!("/warehouses/{}/stock/{}", self.warehouse, product_id))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["quantity"].as_i64().unwrap()
    }

    fn sale_body(&self, lines: Value) -> Value {
        json!({
            "customer_id": self.customer,
            "warehouse_id": self.warehouse,
            "seller_id": self.user,
            "lines": lines,
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    let (status, _) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn purchase_then_sale_over_http() {
    let server = TestServer::spawn().await;

    let (status, product) = server
        .post(
            "/catalog/products",
            json!({
                "supplier_id": server.supplier,
                "name": "Rice 1kg",
                "sku": "RICE-1",
                "purchase_price": 300,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    assert_eq!(product["status"], "CATALOG_ONLY");
    let product_id = product["id"].as_str().unwrap().to_string();

    let (status, listed) = server.get("/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 0);

    let (status, purchase) = server
        .post(
            "/purchases",
            json!({
                "supplier_id": server.supplier,
                "warehouse_id": server.warehouse,
                "buyer_id": server.user,
                "lines": [{ "product_id": product_id, "quantity": 20, "unit_price": 280 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{purchase}");
    assert_eq!(purchase["status"], "PENDIENTE");
    assert_eq!(purchase["total"], 5600);
    let purchase_id = purchase["id"].as_str().unwrap().to_string();

    let (status, completed) = server
        .put(
            &format!("/purchases/{purchase_id}/state"),
            json!({ "status": "COMPLETADA" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{completed}");
    assert_eq!(server.quantity(&product_id).await, 20);

    let (_, product) = server.get(&format!("/products/{product_id}")).await;
    assert_eq!(product["status"], "ACTIVE");

    let (status, again) = server
        .put(
            &format!("/purchases/{purchase_id}/state"),
            json!({ "status": "COMPLETADA" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"], "invalid_transition");
    assert_eq!(again["from"], "COMPLETADA");
    assert_eq!(server.quantity(&product_id).await, 20);

    let (status, receipt) = server
        .post(
            "/sales",
            server.sale_body(json!([{ "product_id": product_id, "quantity": 6, "unit_price": 450 }])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["sale"]["status"], "COMPLETADA");
    assert!(receipt["shipment"].is_null());
    assert_eq!(server.quantity(&product_id).await, 14);

    let (status, movements) = server.get(&format!("/products/{product_id}/movements")).await;
    assert_eq!(status, StatusCode::OK);
    let movements = movements.as_array().unwrap();
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[0]["kind"], "SALIDA");
    assert_eq!(movements[0]["stock_before"], 20);
    assert_eq!(movements[0]["stock_after"], 14);
    assert_eq!(movements[1]["kind"], "ENTRADA");

    let (status, report) = server
        .get(&format!(
            "/warehouses/{}/stock/{}/reconciliation",
            server.warehouse, product_id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true);
}

#[tokio::test]
async fn short_sale_reports_the_shortfall() {
    let server = TestServer::spawn().await;
    let a = server.stocked_product("A", 10).await;
    let b = server.stocked_product("B", 3).await;

    let (status, body) = server
        .post(
            "/sales",
            server.sale_body(json!([
                { "product_id": a, "quantity": 5, "unit_price": 100 },
                { "product_id": b, "quantity": 100, "unit_price": 100 },
            ])),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["product_id"], b.as_str());
    assert_eq!(body["available"], 3);
    assert_eq!(body["requested"], 100);
    assert_eq!(body["shortfall"], 97);

    assert_eq!(server.quantity(&a).await, 10);
    let (_, sales) = server.get("/sales").await;
    assert!(sales.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn delivery_cascade_over_http() {
    let server = TestServer::spawn().await;
    let p = server.stocked_product("P", 8).await;

    let mut body = server.sale_body(json!([{ "product_id": p, "quantity": 3, "unit_price": 100 }]));
    body["delivery"] = json!({
        "address": "Calle Falsa 123",
        "vehicle_id": server.vehicle,
        "scheduled_date": "2026-03-14",
    });
    let (status, receipt) = server.post("/sales", body).await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["sale"]["status"], "PENDIENTE");
    let shipment_id = receipt["shipment"]["id"].as_str().unwrap().to_string();

    let (status, update) = server
        .put(
            &format!("/shipments/{shipment_id}/state"),
            json!({ "status": "EN_RUTA" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{update}");
    assert_eq!(update["vehicle"]["status"], "EN_RUTA");

    let (status, update) = server
        .put(
            &format!("/shipments/{shipment_id}/state"),
            json!({ "status": "ENTREGADO" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{update}");
    assert_eq!(update["shipment"]["status"], "ENTREGADO");
    assert!(update["shipment"]["delivered_date"].is_string());
    assert_eq!(update["sale"]["status"], "COMPLETADA");
    assert_eq!(update["vehicle"]["status"], "DISPONIBLE");

    let (status, body) = server
        .put(
            &format!("/shipments/{shipment_id}/state"),
            json!({ "status": "CANCELADO" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["entity"], "shipment");
    assert_eq!(server.quantity(&p).await, 5);
}

#[tokio::test]
async fn malformed_input_is_a_validation_error() {
    let server = TestServer::spawn().await;
    let p = server.stocked_product("P", 1).await;

    let (status, body) = server
        .put(&format!("/products/{p}/status"), json!({ "status": "ARCHIVED" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = server.get("/sales/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = server
        .post("/purchases", json!({ "supplier_id": server.supplier }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = server
        .get(&format!("/sales/{}", stockflow_core::SaleId::new()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["entity"], "sale");

    let (status, body) = server
        .post(
            "/products",
            json!({
                "name": "Dup",
                "sku": "P",
                "sale_price": 1,
                "purchase_price": 1,
                "unit": "UNIT",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn most_negative_adjustment_is_rejected_cleanly() {
    let server = TestServer::spawn().await;
    let p = server.stocked_product("P", 4).await;

    let (status, body) = server
        .post(
            &format!("/warehouses/{}/stock/{}/adjustments", server.warehouse, p),
            json!({ "delta": i64::MIN, "reason": "shrinkage" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
    assert_eq!(server.quantity(&p).await, 4);
}

#[tokio::test]
async fn edits_over_http() {
    let server = TestServer::spawn().await;
    let first = server.stocked_product("E-1", 6).await;
    let second = server.stocked_product("E-2", 6).await;

    let edit = |sku: &str| {
        json!({
            "name": "Renamed",
            "sku": sku,
            "sale_price": 1500,
            "purchase_price": 900,
            "unit": "BOX",
        })
    };

    let (status, body) = server.put(&format!("/products/{second}"), edit("E-1")).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "conflict");

    let mut shelved = edit("E-2B");
    shelved["shelf"] = json!({
        "warehouse_id": server.warehouse,
        "thresholds": { "min": 2, "max": 30, "location": "R-1" },
    });
    let (status, body) = server.put(&format!("/products/{second}"), shelved).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["product"]["sku"], "E-2B");
    assert_eq!(body["product"]["status"], "ACTIVE");
    assert_eq!(server.quantity(&second).await, 6);
    assert_eq!(server.quantity(&first).await, 6);

    let shipment = json!({
        "address": "Calle Falsa 123",
        "vehicle_id": server.vehicle,
        "scheduled_date": "2026-03-14",
    });
    let (status, created) = server.post("/shipments", shipment).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let shipment_id = created["id"].as_str().unwrap().to_string();

    let (status, body) = server
        .put(
            &format!("/shipments/{shipment_id}"),
            json!({ "address": "Av. Nueva 9", "scheduled_date": "2026-03-21" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["address"], "Av. Nueva 9");
    assert!(body["vehicle_id"].is_null());

    server
        .put(&format!("/shipments/{shipment_id}/state"), json!({ "status": "EN_RUTA" }))
        .await;
    let (status, body) = server
        .put(
            &format!("/shipments/{shipment_id}"),
            json!({ "address": "Too late", "scheduled_date": "2026-03-22" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "invalid_transition");
}
