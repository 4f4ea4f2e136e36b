//! Product catalog row.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One catalog row. A product appears once per (crop, application, growth
/// stage, problem) combination, so the same product name can occur in many
/// rows with different usage details.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub product_name: String,
    pub crop: Option<String>,
    pub application: Option<String>,
    pub application_type: Option<String>,
    pub growth_stage: Option<String>,
    pub problem: Option<String>,
    pub directions: Option<String>,
    pub label: Option<String>,
    pub msds: Option<String>,
    pub tech_doc: Option<String>,
    pub notes: Option<String>,
    pub m_intervention: Option<String>,
}

impl Product {
    /// Composite identity used to drop exact duplicates while keeping
    /// legitimate per-usage variations of the same product.
    pub fn dedup_key(&self) -> (String, String, String, String, String, String) {
        (
            self.product_name.clone(),
            self.crop.clone().unwrap_or_default(),
            self.application.clone().unwrap_or_default(),
            self.growth_stage.clone().unwrap_or_default(),
            self.problem.clone().unwrap_or_default(),
            self.application_type.clone().unwrap_or_default(),
        )
    }

    /// Whether any documentation link is present.
    pub fn has_documents(&self) -> bool {
        self.directions.is_some()
            || self.label.is_some()
            || self.msds.is_some()
            || self.tech_doc.is_some()
    }
}

/// Drop exact duplicate rows, preserving order.
pub fn dedup_products(products: Vec<Product>) -> Vec<Product> {
    let mut seen = std::collections::HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}
