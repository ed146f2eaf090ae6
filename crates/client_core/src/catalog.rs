use std::sync::Arc;

use shared::domain::Product;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    gateway::CatalogGateway,
    notify::NotificationSink,
    validate::{self, ProductDraft, ProductField, ValidationErrors},
};

/// Which modal interaction is in progress. A tagged union rather than a set of
/// booleans, so "at most one overlay" holds by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    Adding,
    /// Carries a staged copy of the product being edited, not a reference into
    /// the snapshot. Edits touch the snapshot only after a successful round
    /// trip plus refetch.
    Editing(Product),
    ConfirmingDelete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No snapshot has ever been fetched; a view should show a loading state.
    NeverLoaded,
    Loaded,
    /// A snapshot exists but the most recent refresh failed; the view keeps
    /// rendering the stale rows rather than going blank.
    Stale,
}

/// Owns the authoritative product snapshot and mediates every mutation
/// through a strict request, refetch, commit sequence. The snapshot is only
/// ever replaced wholesale by a successful fetch; mutation results are never
/// spliced in locally.
pub struct CatalogEngine {
    gateway: Arc<dyn CatalogGateway>,
    notifications: Arc<NotificationSink>,
    inner: Mutex<CatalogState>,
}

struct CatalogState {
    snapshot: Vec<Product>,
    loaded_once: bool,
    last_refresh_failed: bool,
    filter: String,
    overlay: Overlay,
}

impl CatalogEngine {
    pub fn new(gateway: Arc<dyn CatalogGateway>, notifications: Arc<NotificationSink>) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            notifications,
            inner: Mutex::new(CatalogState {
                snapshot: Vec::new(),
                loaded_once: false,
                last_refresh_failed: false,
                filter: String::new(),
                overlay: Overlay::None,
            }),
        })
    }

    /// Fetches the full snapshot. Failure keeps the previous snapshot intact
    /// and marks it stale; the old rows stay available to the view.
    pub async fn load(&self) {
        match self.gateway.list_products().await {
            Ok(products) => {
                let mut guard = self.inner.lock().await;
                info!(count = products.len(), "catalog: snapshot replaced");
                guard.snapshot = products;
                guard.loaded_once = true;
                guard.last_refresh_failed = false;
            }
            Err(err) => {
                warn!("catalog: snapshot refresh failed: {err}");
                self.inner.lock().await.last_refresh_failed = true;
                self.notifications.error("Failed to fetch products").await;
            }
        }
    }

    pub async fn open_add(&self) {
        self.inner.lock().await.overlay = Overlay::Adding;
    }

    /// Stages a copy of the product for editing. An id missing from the
    /// snapshot leaves the overlay untouched.
    pub async fn open_edit(&self, id: &str) {
        let mut guard = self.inner.lock().await;
        if let Some(product) = guard.snapshot.iter().find(|p| p.id == id).cloned() {
            guard.overlay = Overlay::Editing(product);
        }
    }

    /// First phase of removal: a pure local transition into the confirmation
    /// overlay. The gateway is only touched by [`confirm_delete`].
    ///
    /// [`confirm_delete`]: CatalogEngine::confirm_delete
    pub async fn request_delete(&self, id: &str) {
        self.inner.lock().await.overlay = Overlay::ConfirmingDelete(id.to_string());
    }

    /// Cancels whatever overlay is open without any network activity.
    pub async fn close_overlay(&self) {
        self.inner.lock().await.overlay = Overlay::None;
    }

    /// Validates and submits a new product. Validation failures come back
    /// synchronously as a field map and cost no round trip. On a gateway
    /// failure the overlay stays open so the user can retry the same input.
    pub async fn submit_add(&self, draft: &ProductDraft) -> Result<(), ValidationErrors> {
        let existing_ids: Vec<String> = {
            let guard = self.inner.lock().await;
            if guard.overlay != Overlay::Adding {
                return Ok(());
            }
            guard.snapshot.iter().map(|p| p.id.clone()).collect()
        };

        let product = validate::validate_new(draft, &existing_ids)?;
        match self.gateway.create_product(&product).await {
            Ok(_) => {
                self.inner.lock().await.overlay = Overlay::None;
                self.load().await;
                self.notifications.success("Product added successfully").await;
            }
            Err(err) => {
                warn!(id = %product.id, "catalog: create failed: {err}");
                self.notifications.error("Failed to add product").await;
            }
        }
        Ok(())
    }

    /// Validates and submits a full replace-by-id update. The id is immutable
    /// once the product exists: a draft whose id differs from the staged
    /// product is rejected on the id field.
    pub async fn submit_edit(&self, draft: &ProductDraft) -> Result<(), ValidationErrors> {
        let staged_id = {
            let guard = self.inner.lock().await;
            match &guard.overlay {
                Overlay::Editing(staged) => staged.id.clone(),
                _ => return Ok(()),
            }
        };

        if draft.id != staged_id {
            return Err(ValidationErrors::single(
                ProductField::Id,
                "Product ID cannot be changed",
            ));
        }

        let product = validate::validate_update(draft)?;
        match self.gateway.update_product(&staged_id, &product).await {
            Ok(_) => {
                self.inner.lock().await.overlay = Overlay::None;
                self.load().await;
                self.notifications
                    .success("Product updated successfully")
                    .await;
            }
            Err(err) => {
                warn!(id = %staged_id, "catalog: update failed: {err}");
                self.notifications.error("Failed to update product").await;
            }
        }
        Ok(())
    }

    /// Second phase of removal. A no-op unless a delete is pending
    /// confirmation; on failure the confirmation overlay stays open for a
    /// retry or cancel.
    pub async fn confirm_delete(&self) {
        let id = {
            let guard = self.inner.lock().await;
            match &guard.overlay {
                Overlay::ConfirmingDelete(id) => id.clone(),
                _ => return,
            }
        };

        match self.gateway.delete_product(&id).await {
            Ok(()) => {
                self.inner.lock().await.overlay = Overlay::None;
                self.load().await;
                self.notifications
                    .success("Product deleted successfully")
                    .await;
            }
            Err(err) => {
                warn!(id = %id, "catalog: delete failed: {err}");
                self.notifications.error("Failed to delete product").await;
            }
        }
    }

    /// Pure local state update; never fails and never touches the gateway.
    pub async fn set_filter(&self, text: &str) {
        self.inner.lock().await.filter = text.to_string();
    }

    pub async fn filter(&self) -> String {
        self.inner.lock().await.filter.clone()
    }

    pub async fn snapshot(&self) -> Vec<Product> {
        self.inner.lock().await.snapshot.clone()
    }

    /// Rows whose id, description, price text, or brand contain the filter
    /// text case-insensitively. Recomputed from the snapshot on every call,
    /// never cached.
    pub async fn filtered_view(&self) -> Vec<Product> {
        let guard = self.inner.lock().await;
        if guard.filter.is_empty() {
            return guard.snapshot.clone();
        }
        let needle = guard.filter.to_lowercase();
        guard
            .snapshot
            .iter()
            .filter(|product| matches_filter(product, &needle))
            .cloned()
            .collect()
    }

    pub async fn overlay(&self) -> Overlay {
        self.inner.lock().await.overlay.clone()
    }

    pub async fn load_status(&self) -> LoadStatus {
        let guard = self.inner.lock().await;
        if !guard.loaded_once {
            LoadStatus::NeverLoaded
        } else if guard.last_refresh_failed {
            LoadStatus::Stale
        } else {
            LoadStatus::Loaded
        }
    }
}

fn matches_filter(product: &Product, needle: &str) -> bool {
    product.id.to_lowercase().contains(needle)
        || product.desc.to_lowercase().contains(needle)
        || product.price.to_string().contains(needle)
        || product.brand.to_lowercase().contains(needle)
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
