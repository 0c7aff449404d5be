//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use tradepost_core::{CategoryId, CurrencyCode, ProductId, UserId};

use super::{Layout, money};
use crate::api::types::{Category, Product};
use crate::error::AppError;
use crate::middleware::{Flashes, OptionalAuth};
use crate::state::AppState;

/// Product card data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: String,
    pub delivery: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub variants: Vec<VariantView>,
    /// The signed-in seller listed this product.
    pub own_listing: bool,
}

/// Variant option data for templates.
#[derive(Clone)]
pub struct VariantView {
    pub id: i32,
    pub name: String,
    pub price: String,
}

impl ProductView {
    pub(crate) fn new(product: &Product, currency: CurrencyCode, viewer: Option<UserId>) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: money(product.price, currency),
            delivery: (!product.delivery_charge.is_zero())
                .then(|| money(product.delivery_charge, currency)),
            category: product.category.as_ref().map(|c| c.name.clone()),
            image_url: product.image_url.clone(),
            in_stock: product.in_stock,
            variants: product
                .variants
                .iter()
                .map(|v| VariantView {
                    id: v.id.as_i32(),
                    name: v.name.clone(),
                    price: money(product.unit_price(Some(v)), currency),
                })
                .collect(),
            own_listing: viewer.is_some() && product.seller_id == viewer,
        }
    }
}

/// Category filter option.
#[derive(Clone)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<CategoryId>,
    pub q: Option<String>,
}

impl ListingQuery {
    fn matches(&self, product: &Product) -> bool {
        let category_ok = self
            .category
            .is_none_or(|id| product.category.as_ref().is_some_and(|c| c.id == id));

        let search_ok = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .is_none_or(|q| product.name.to_lowercase().contains(&q.to_lowercase()));

        category_ok && search_ok
    }
}

/// Distinct categories in catalogue order.
fn categories(products: &[Product], selected: Option<CategoryId>) -> Vec<CategoryOption> {
    let mut seen: Vec<&Category> = Vec::new();
    for category in products.iter().filter_map(|p| p.category.as_ref()) {
        if !seen.iter().any(|c| c.id == category.id) {
            seen.push(category);
        }
    }

    seen.into_iter()
        .map(|c| CategoryOption {
            id: c.id.as_i32(),
            name: c.name.clone(),
            selected: selected == Some(c.id),
        })
        .collect()
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub products: Vec<ProductView>,
    pub categories: Vec<CategoryOption>,
    pub query: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
}

/// Display the product listing.
///
/// # Errors
///
/// Returns an error if the catalogue cannot be fetched.
#[instrument(skip(state, user, flashes))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    flashes: Flashes,
    Query(query): Query<ListingQuery>,
) -> Result<ProductsIndexTemplate, AppError> {
    let catalogue = state.api().products().await?;
    let currency = state.config().currency;
    let viewer = user.as_ref().map(|u| u.id);

    let products = catalogue
        .iter()
        .filter(|p| query.matches(p))
        .map(|p| ProductView::new(p, currency, viewer))
        .collect();

    Ok(ProductsIndexTemplate {
        layout: Layout::new(user.as_ref(), flashes),
        products,
        categories: categories(&catalogue, query.category),
        query: query.q.unwrap_or_default(),
    })
}

/// Display a product.
///
/// # Errors
///
/// Returns `AppError::Api(NotFound)` for unknown products.
#[instrument(skip(state, user, flashes), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    flashes: Flashes,
    Path(id): Path<ProductId>,
) -> Result<ProductShowTemplate, AppError> {
    let product = state.api().product(id).await?;
    let viewer = user.as_ref().map(|u| u.id);

    Ok(ProductShowTemplate {
        layout: Layout::new(user.as_ref(), flashes),
        product: ProductView::new(&product, state.config().currency, viewer),
    })
}
