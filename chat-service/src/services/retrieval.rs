//! Catalog retrieval driven by extracted context.
//!
//! Search priority: direct product mention, then problem, then crop, then
//! application method. A crop with no other signal returns nothing so the
//! prompt layer can ask the user for more detail instead of dumping the
//! whole crop catalog.

use crate::models::product::dedup_products;
use crate::models::Product;
use crate::services::context::{
    MessageContext, PH_GENERIC_PROBLEM, PROBLEM_SOIL_ACIDITY, PROBLEM_SOIL_SALINITY,
};
use crate::services::database::Database;
use service_core::error::AppError;

/// Result of a retrieval pass.
#[derive(Debug, Default)]
pub struct RetrievedProducts {
    pub products: Vec<Product>,
    /// Set when a generic pH question was expanded into both acidity and
    /// salinity searches; prompt assembly explains the dual-purpose match.
    pub ph_unified: bool,
}

pub async fn relevant_products(
    db: &Database,
    context: &MessageContext,
) -> Result<RetrievedProducts, AppError> {
    // 1. Direct product queries return immediately.
    if let Some(name) = &context.product_name {
        let products = db.search_products_by_name(name, Some(10)).await?;
        if !products.is_empty() {
            return Ok(RetrievedProducts {
                products: dedup_products(products),
                ph_unified: false,
            });
        }
    }

    // 2. Problem-based search works with or without a crop.
    if let Some(problem) = &context.problem {
        if problem == PH_GENERIC_PROBLEM {
            let acidity = db
                .search_products_by_criteria(
                    context.crop.as_deref(),
                    context.application_type.as_deref(),
                    Some(PROBLEM_SOIL_ACIDITY),
                    None,
                )
                .await?;
            let salinity = db
                .search_products_by_criteria(
                    context.crop.as_deref(),
                    context.application_type.as_deref(),
                    Some(PROBLEM_SOIL_SALINITY),
                    None,
                )
                .await?;

            let mut combined = acidity;
            combined.extend(salinity);
            let products = dedup_products(combined);
            if !products.is_empty() {
                return Ok(RetrievedProducts {
                    products,
                    ph_unified: true,
                });
            }
        } else {
            let products = db
                .search_products_by_criteria(
                    context.crop.as_deref(),
                    context.application_type.as_deref(),
                    Some(problem),
                    None,
                )
                .await?;
            if !products.is_empty() {
                return Ok(RetrievedProducts {
                    products: dedup_products(products),
                    ph_unified: false,
                });
            }
        }
    }

    // 3. Crop-based search, but only when the crop is not the lone signal.
    if let Some(crop) = &context.crop {
        let has_only_crop = context.problem.is_none()
            && context.application_type.is_none()
            && context.product_name.is_none();

        if !has_only_crop {
            let mut products = db
                .search_products_by_criteria(
                    Some(crop),
                    context.application_type.as_deref(),
                    context.problem.as_deref(),
                    None,
                )
                .await?;

            if products.is_empty() {
                products = db.search_products(crop, None).await?;
            }

            return Ok(RetrievedProducts {
                products: dedup_products(products),
                ph_unified: false,
            });
        }

        return Ok(RetrievedProducts::default());
    }

    // 4. Application method alone.
    if let Some(app_type) = &context.application_type {
        let products = db
            .search_products_by_criteria(None, Some(app_type), None, None)
            .await?;
        return Ok(RetrievedProducts {
            products: dedup_products(products),
            ph_unified: false,
        });
    }

    Ok(RetrievedProducts::default())
}
