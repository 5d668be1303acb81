//! Catalog mirror: product and price documents.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::error::SyncResult;
use crate::model::{PriceObject, ProductObject};
use crate::store::{paths, DocumentStore};

/// Keeps the product/price document tree in step with provider events.
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Merge-writes the product document at `products/{id}`.
    ///
    /// Every payload field is written, absent ones as explicit nulls, so a
    /// later upsert fully reflects the provider's current view.
    pub async fn upsert_product(&self, product: &ProductObject) -> SyncResult<()> {
        let doc = json!({
            "active": product.active,
            "name": product.name,
            "description": product.description,
            "role": product.role(),
            "images": product.images.clone().unwrap_or_default(),
            "metadata": product.metadata,
        });
        self.store.set_merge(&paths::product(&product.id), doc).await?;
        info!(product_id = %product.id, "product upserted");
        Ok(())
    }

    /// Merge-writes the price document under its owning product.
    pub async fn upsert_price(&self, price: &PriceObject) -> SyncResult<()> {
        let product_id = price.product.id().to_owned();
        let doc = json!({
            "active": price.active,
            "billing_scheme": price.billing_scheme,
            "currency": price.currency,
            "nickname": price.nickname,
            "type": price.price_type,
            "unit_amount": price.unit_amount,
            "recurring": price.recurring,
            "metadata": price.metadata,
            "product": product_id,
        });
        self.store.set_merge(&paths::price(&product_id, &price.id), doc).await?;
        info!(price_id = %price.id, product_id = %product_id, "price upserted");
        Ok(())
    }

    /// Deletes exactly the product document. Prices under it are removed by
    /// their own deletion events.
    pub async fn delete_product(&self, product: &ProductObject) -> SyncResult<()> {
        self.store.delete(&paths::product(&product.id)).await?;
        info!(product_id = %product.id, "product deleted");
        Ok(())
    }

    pub async fn delete_price(&self, price: &PriceObject) -> SyncResult<()> {
        let product_id = price.product.id();
        self.store.delete(&paths::price(product_id, &price.id)).await?;
        info!(price_id = %price.id, product_id = %product_id, "price deleted");
        Ok(())
    }
}
