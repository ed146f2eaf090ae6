use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use shared::{domain::NotificationKind, error::GatewayError};

use super::*;

#[derive(Default)]
struct FakeCatalogGateway {
    products: Mutex<Vec<Product>>,
    fail_list: Mutex<bool>,
    fail_create: Mutex<bool>,
    fail_update: Mutex<bool>,
    fail_delete: Mutex<bool>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeCatalogGateway {
    fn seeded(products: Vec<Product>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.products.try_lock().expect("unused") = products;
        Arc::new(gateway)
    }

    async fn set_fail_list(&self, fail: bool) {
        *self.fail_list.lock().await = fail;
    }

    async fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().await = fail;
    }

    async fn set_fail_update(&self, fail: bool) {
        *self.fail_update.lock().await = fail;
    }

    async fn set_fail_delete(&self, fail: bool) {
        *self.fail_delete.lock().await = fail;
    }
}

fn server_error() -> GatewayError {
    GatewayError::Status { status: 500 }
}

#[async_trait]
impl CatalogGateway for FakeCatalogGateway {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_list.lock().await {
            return Err(server_error());
        }
        Ok(self.products.lock().await.clone())
    }

    async fn create_product(&self, product: &Product) -> Result<Product, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create.lock().await {
            return Err(server_error());
        }
        self.products.lock().await.push(product.clone());
        Ok(product.clone())
    }

    async fn update_product(&self, id: &str, product: &Product) -> Result<Product, GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_update.lock().await {
            return Err(server_error());
        }
        let mut products = self.products.lock().await;
        if let Some(existing) = products.iter_mut().find(|p| p.id == id) {
            *existing = product.clone();
        }
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &str) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_delete.lock().await {
            return Err(server_error());
        }
        self.products.lock().await.retain(|p| p.id != id);
        Ok(())
    }
}

fn product(id: &str, desc: &str, price: f64, brand: &str, stock: i64) -> Product {
    Product {
        id: id.to_string(),
        desc: desc.to_string(),
        price,
        brand: brand.to_string(),
        stock,
    }
}

fn draft(id: &str, desc: &str, price: f64, brand: &str, stock: i64) -> ProductDraft {
    ProductDraft {
        id: id.to_string(),
        desc: desc.to_string(),
        price,
        brand: brand.to_string(),
        stock,
    }
}

fn wireless_mouse() -> Product {
    product("P001", "Wireless Mouse", 29.99, "Logitech", 10)
}

fn setup(
    products: Vec<Product>,
) -> (Arc<CatalogEngine>, Arc<FakeCatalogGateway>, Arc<NotificationSink>) {
    let gateway = FakeCatalogGateway::seeded(products);
    let notifications = Arc::new(NotificationSink::new(Duration::from_secs(30)));
    let engine = CatalogEngine::new(gateway.clone(), notifications.clone());
    (engine, gateway, notifications)
}

#[tokio::test]
async fn load_replaces_snapshot_wholesale() {
    let (engine, _, _) = setup(vec![wireless_mouse()]);
    assert_eq!(engine.load_status().await, LoadStatus::NeverLoaded);

    engine.load().await;

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "P001");
    assert_eq!(engine.load_status().await, LoadStatus::Loaded);
}

#[tokio::test]
async fn reload_with_no_mutation_is_idempotent() {
    let (engine, _, _) = setup(vec![wireless_mouse()]);
    engine.load().await;
    let first = engine.snapshot().await;
    engine.load().await;
    assert_eq!(first, engine.snapshot().await);
}

#[tokio::test]
async fn failed_refresh_keeps_stale_snapshot_available() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;

    gateway.set_fail_list(true).await;
    engine.load().await;

    // Stale rows stay visible instead of a blank table.
    assert_eq!(engine.snapshot().await.len(), 1);
    assert_eq!(engine.load_status().await, LoadStatus::Stale);
    let toast = notifications.current().await.expect("error toast");
    assert_eq!(toast.kind, NotificationKind::Error);
    assert_eq!(toast.message, "Failed to fetch products");

    gateway.set_fail_list(false).await;
    engine.load().await;
    assert_eq!(engine.load_status().await, LoadStatus::Loaded);
}

#[tokio::test]
async fn failed_first_load_stays_never_loaded() {
    let (engine, gateway, _) = setup(vec![wireless_mouse()]);
    gateway.set_fail_list(true).await;
    engine.load().await;
    assert_eq!(engine.load_status().await, LoadStatus::NeverLoaded);
    assert!(engine.snapshot().await.is_empty());
}

#[tokio::test]
async fn add_then_reload_contains_draft_exactly_once() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.open_add().await;
    engine
        .submit_add(&draft("P003", "USB-C Hub", 45.50, "Anker", 5))
        .await
        .expect("valid draft");

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.iter().filter(|p| p.id == "P003").count(), 1);
    assert_eq!(engine.overlay().await, Overlay::None);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);

    let toast = notifications.current().await.expect("success toast");
    assert_eq!(toast.kind, NotificationKind::Success);
    assert_eq!(toast.message, "Product added successfully");
}

#[tokio::test]
async fn duplicate_id_is_rejected_locally_without_a_round_trip() {
    let (engine, gateway, _) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.open_add().await;
    let errors = engine
        .submit_add(&draft("P001", "Another Mouse", 9.99, "NoName", 1))
        .await
        .expect_err("duplicate id");

    assert_eq!(errors.field(ProductField::Id), Some("ID already exists"));
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.overlay().await, Overlay::Adding);
}

#[tokio::test]
async fn failed_add_keeps_overlay_open_for_retry() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;
    gateway.set_fail_create(true).await;

    engine.open_add().await;
    engine
        .submit_add(&draft("P003", "USB-C Hub", 45.50, "Anker", 5))
        .await
        .expect("validation passes");

    assert_eq!(engine.overlay().await, Overlay::Adding);
    assert_eq!(engine.snapshot().await.len(), 1);
    let toast = notifications.current().await.expect("error toast");
    assert_eq!(toast.message, "Failed to add product");

    // Same input succeeds once the backend recovers.
    gateway.set_fail_create(false).await;
    engine
        .submit_add(&draft("P003", "USB-C Hub", 45.50, "Anker", 5))
        .await
        .expect("retry");
    assert_eq!(engine.overlay().await, Overlay::None);
    assert_eq!(engine.snapshot().await.len(), 2);
}

#[tokio::test]
async fn submit_add_without_the_add_overlay_is_a_noop() {
    let (engine, gateway, _) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine
        .submit_add(&draft("P003", "USB-C Hub", 45.50, "Anker", 5))
        .await
        .expect("no-op");
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn edit_stages_a_copy_and_commits_via_refetch() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.open_edit("P001").await;
    assert_eq!(engine.overlay().await, Overlay::Editing(wireless_mouse()));

    engine
        .submit_edit(&draft("P001", "Wireless Mouse v2", 34.99, "Logitech", 8))
        .await
        .expect("valid update");

    assert_eq!(engine.overlay().await, Overlay::None);
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot[0].desc, "Wireless Mouse v2");
    assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        notifications.current().await.expect("toast").message,
        "Product updated successfully"
    );
}

#[tokio::test]
async fn edit_cannot_change_the_product_id() {
    let (engine, gateway, _) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.open_edit("P001").await;
    let errors = engine
        .submit_edit(&draft("P999", "Wireless Mouse", 29.99, "Logitech", 10))
        .await
        .expect_err("id is immutable");

    assert_eq!(
        errors.field(ProductField::Id),
        Some("Product ID cannot be changed")
    );
    assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_update_keeps_editing_overlay() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;
    gateway.set_fail_update(true).await;

    engine.open_edit("P001").await;
    engine
        .submit_edit(&draft("P001", "Wireless Mouse v2", 34.99, "Logitech", 8))
        .await
        .expect("validation passes");

    assert!(matches!(engine.overlay().await, Overlay::Editing(_)));
    assert_eq!(engine.snapshot().await[0].desc, "Wireless Mouse");
    assert_eq!(
        notifications.current().await.expect("toast").message,
        "Failed to update product"
    );
}

#[tokio::test]
async fn open_edit_with_unknown_id_leaves_overlay_untouched() {
    let (engine, _, _) = setup(vec![wireless_mouse()]);
    engine.load().await;
    engine.open_edit("P404").await;
    assert_eq!(engine.overlay().await, Overlay::None);
}

#[tokio::test]
async fn delete_only_reaches_the_gateway_after_confirmation() {
    let (engine, gateway, _) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.request_delete("P001").await;
    assert_eq!(
        engine.overlay().await,
        Overlay::ConfirmingDelete("P001".to_string())
    );
    assert_eq!(gateway.delete_calls.load(Ordering::SeqCst), 0);

    // Canceling the confirmation never calls the gateway.
    engine.close_overlay().await;
    engine.confirm_delete().await;
    assert_eq!(gateway.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.snapshot().await.len(), 1);

    engine.request_delete("P001").await;
    engine.confirm_delete().await;
    assert_eq!(gateway.delete_calls.load(Ordering::SeqCst), 1);
    assert!(engine.snapshot().await.is_empty());
    assert_eq!(engine.overlay().await, Overlay::None);
}

#[tokio::test]
async fn failed_delete_keeps_confirmation_open() {
    let (engine, gateway, notifications) = setup(vec![wireless_mouse()]);
    engine.load().await;
    gateway.set_fail_delete(true).await;

    engine.request_delete("P001").await;
    engine.confirm_delete().await;

    assert_eq!(
        engine.overlay().await,
        Overlay::ConfirmingDelete("P001".to_string())
    );
    assert_eq!(engine.snapshot().await.len(), 1);
    assert_eq!(
        notifications.current().await.expect("toast").message,
        "Failed to delete product"
    );
}

#[tokio::test]
async fn overlays_are_mutually_exclusive_by_construction() {
    let (engine, _, _) = setup(vec![wireless_mouse()]);
    engine.load().await;

    engine.open_add().await;
    engine.open_edit("P001").await;
    assert!(matches!(engine.overlay().await, Overlay::Editing(_)));

    engine.request_delete("P001").await;
    assert!(matches!(engine.overlay().await, Overlay::ConfirmingDelete(_)));
}

#[tokio::test]
async fn filtering_is_case_insensitive_across_columns() {
    let (engine, _, _) = setup(vec![
        wireless_mouse(),
        product("P003", "USB-C Hub", 45.50, "Anker", 5),
    ]);
    engine.load().await;

    engine.set_filter("ANKER").await;
    let upper = engine.filtered_view().await;
    engine.set_filter("anker").await;
    let lower = engine.filtered_view().await;
    assert_eq!(upper, lower);
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].id, "P003");

    // Price is matched as text.
    engine.set_filter("29.99").await;
    let by_price = engine.filtered_view().await;
    assert_eq!(by_price.len(), 1);
    assert_eq!(by_price[0].id, "P001");

    engine.set_filter("").await;
    assert_eq!(engine.filtered_view().await.len(), 2);
}

#[tokio::test]
async fn seeded_catalog_walkthrough() {
    let (engine, _, _) = setup(vec![wireless_mouse()]);

    engine.load().await;
    assert_eq!(engine.snapshot().await.len(), 1);

    engine.set_filter("Anker").await;
    assert!(engine.filtered_view().await.is_empty());

    engine.open_add().await;
    engine
        .submit_add(&draft("P003", "USB-C Hub", 45.50, "Anker", 5))
        .await
        .expect("valid draft");
    assert_eq!(engine.snapshot().await.len(), 2);

    let filtered = engine.filtered_view().await;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].desc, "USB-C Hub");
}
