use std::collections::BTreeMap;

use shared::domain::Product;
use thiserror::Error;

/// Transient form state for a product being created or edited. Only a draft
/// that passes validation ever becomes a [`Product`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub id: String,
    pub desc: String,
    pub price: f64,
    pub brand: String,
    pub stock: i64,
}

impl ProductDraft {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            desc: product.desc.clone(),
            price: product.price,
            brand: product.brand.clone(),
            stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProductField {
    Id,
    Desc,
    Price,
    Brand,
    Stock,
}

/// Field-scoped validation failures. These block submission locally and never
/// reach the gateway.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("invalid product draft")]
pub struct ValidationErrors {
    errors: BTreeMap<ProductField, String>,
}

impl ValidationErrors {
    pub fn single(field: ProductField, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.insert(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: ProductField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductField, &str)> {
        self.errors.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    fn insert(&mut self, field: ProductField, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }
}

/// Validates a draft for creation. The duplicate-id check runs here, locally,
/// against the current snapshot: a taken id never costs a round trip.
pub fn validate_new(
    draft: &ProductDraft,
    existing_ids: &[String],
) -> Result<Product, ValidationErrors> {
    validate(draft, Some(existing_ids))
}

/// Validates a draft for a replace-by-id update. The id is immutable after
/// creation, so no duplicate check applies.
pub fn validate_update(draft: &ProductDraft) -> Result<Product, ValidationErrors> {
    validate(draft, None)
}

fn validate(
    draft: &ProductDraft,
    existing_ids: Option<&[String]>,
) -> Result<Product, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if draft.id.trim().is_empty() {
        errors.insert(ProductField::Id, "ID is required");
    } else if let Some(ids) = existing_ids {
        if ids.iter().any(|id| id == &draft.id) {
            errors.insert(ProductField::Id, "ID already exists");
        }
    }

    if draft.desc.trim().is_empty() {
        errors.insert(ProductField::Desc, "Description is required");
    }

    if !(draft.price > 0.0) {
        errors.insert(ProductField::Price, "Valid price is required");
    }

    if draft.brand.trim().is_empty() {
        errors.insert(ProductField::Brand, "Brand is required");
    }

    if draft.stock < 0 {
        errors.insert(ProductField::Stock, "Stock cannot be negative");
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Product {
        id: draft.id.clone(),
        desc: draft.desc.clone(),
        price: draft.price,
        brand: draft.brand.clone(),
        stock: draft.stock,
    })
}
