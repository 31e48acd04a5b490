//! Product catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::ProductRepository;
use crate::db::catalog::{CategoryRef, ProductFilter, ProductSort};
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::models::{ProductDetail, ProductSummary};
use crate::routes::{PageQuery, Paginated};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 12;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<String>,
    pub order: Option<String>,
    /// `false` includes inactive products (admins only).
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ProductQuery {
    fn filter(&self, is_admin: bool) -> ProductFilter {
        ProductFilter {
            search: self.search.clone(),
            category: self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(CategoryRef::parse),
            featured: self.featured,
            min_price: self.min_price,
            max_price: self.max_price,
            include_inactive: is_admin && self.active == Some(false),
            sort: self.sort.as_deref().map(ProductSort::parse).unwrap_or_default(),
            descending: !self
                .order
                .as_deref()
                .is_some_and(|o| o.eq_ignore_ascii_case("asc")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: ProductDetail,
    pub avg_rating: f64,
}

/// GET /api/products
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductList>>, AppError> {
    let is_admin = identity.as_ref().is_some_and(|i| i.is_admin());
    let filter = query.filter(is_admin);
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .page(DEFAULT_LIMIT);

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(Json(Paginated::new(ProductList { products }, total, page)))
}

/// GET /api/products/{id_or_slug}
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Path(id_or_slug): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let is_admin = identity.as_ref().is_some_and(|i| i.is_admin());

    let product = ProductRepository::new(state.pool())
        .get_detail(&id_or_slug, is_admin)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let avg_rating = product.avg_rating();
    Ok(Json(ProductResponse {
        product,
        avg_rating,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_listing_requires_admin() {
        let query = ProductQuery {
            active: Some(false),
            ..Default::default()
        };
        assert!(!query.filter(false).include_inactive);
        assert!(query.filter(true).include_inactive);
    }

    #[test]
    fn test_default_ordering_is_newest_first() {
        let filter = ProductQuery::default().filter(false);
        assert_eq!(filter.sort, ProductSort::CreatedAt);
        assert!(filter.descending);

        let query = ProductQuery {
            sort: Some("price".to_owned()),
            order: Some("ASC".to_owned()),
            ..Default::default()
        };
        let filter = query.filter(false);
        assert_eq!(filter.sort, ProductSort::Price);
        assert!(!filter.descending);
    }

    #[test]
    fn test_query_string_parsing() {
        let query: ProductQuery =
            parse_query("search=batik&category=fashion&min_price=10000&page=2");
        assert_eq!(query.search.as_deref(), Some("batik"));
        assert_eq!(query.min_price, Some(Decimal::from(10_000)));
        assert_eq!(query.page, Some(2));
        assert!(matches!(
            query.filter(false).category,
            Some(CategoryRef::Slug(ref s)) if s == "fashion"
        ));
    }

    fn parse_query(raw: &str) -> ProductQuery {
        let uri: axum::http::Uri = format!("/api/products?{raw}").parse().unwrap();
        Query::<ProductQuery>::try_from_uri(&uri).unwrap().0
    }
}
