//! # Catalog Store
//!
//! Holds the product reference list keyed by product code. Every other store
//! joins on `Product::code`.
//!
//! Loading replaces the whole list or nothing: a payload that is not a list
//! leaves the previous catalog untouched.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::CoreResult;
use crate::ingest::{self, IngestReport};
use crate::types::Product;

/// The in-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog payload, replacing the current list atomically.
    ///
    /// ## Errors
    /// [`crate::CoreError::CatalogLoad`] if the payload is not a list. Rows
    /// without a code are dropped and counted in the returned report.
    pub fn load(&mut self, payload: &Value) -> CoreResult<IngestReport> {
        let ingested = ingest::products(payload)?;
        self.replace(ingested.records);
        Ok(ingested.report)
    }

    /// Replaces the list with already-validated products (last write wins).
    pub fn replace(&mut self, products: Vec<Product>) {
        let mut index = HashMap::with_capacity(products.len());
        let mut deduped: Vec<Product> = Vec::with_capacity(products.len());
        for product in products {
            match index.get(&product.code) {
                Some(&i) => deduped[i] = product,
                None => {
                    index.insert(product.code.clone(), deduped.len());
                    deduped.push(product);
                }
            }
        }
        self.products = deduped;
        self.index = index;
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Product> {
        self.index.get(code.trim()).map(|&i| &self.products[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code.trim())
    }

    /// Products in load order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|p| p.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Case-insensitive substring match on code or name.
    ///
    /// An empty query returns every product.
    pub fn filter(&self, query: &str) -> Vec<&Product> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.products.iter().collect();
        }
        self.products
            .iter()
            .filter(|p| {
                p.code.to_lowercase().contains(&query) || p.name.to_lowercase().contains(&query)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loaded() -> CatalogStore {
        let mut catalog = CatalogStore::new();
        catalog
            .load(&json!([
                { "code": "A", "name": "Arroz" },
                { "code": "B", "name": "Frijol" },
                { "code": "C", "name": "Azucar" }
            ]))
            .unwrap();
        catalog
    }

    #[test]
    fn test_find_by_code() {
        let catalog = loaded();
        assert_eq!(catalog.find_by_code("B").unwrap().name, "Frijol");
        assert_eq!(catalog.find_by_code(" C ").unwrap().name, "Azucar");
        assert!(catalog.find_by_code("Z").is_none());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_failed_load_keeps_previous_catalog() {
        let mut catalog = loaded();
        assert!(catalog.load(&json!({ "message": "unavailable" })).is_err());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_reload_is_full_replace() {
        let mut catalog = loaded();
        let report = catalog
            .load(&json!([{ "code": "Z", "name": "Sal" }, { "nombre": "x" }]))
            .unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(catalog.codes().collect::<Vec<_>>(), vec!["Z"]);
        assert!(!catalog.contains("A"));
    }

    #[test]
    fn test_filter() {
        let catalog = loaded();
        assert_eq!(catalog.filter("a").len(), 2);
        assert_eq!(catalog.filter("frij").len(), 1);
        assert_eq!(catalog.filter("").len(), 3);
    }
}
