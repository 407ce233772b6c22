use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

fn default_one() -> u32 {
    1
}

/// Some parsers report an unknown price as `null`; it reads as 0.
fn price_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// A single catalog entry as returned by the aggregator.
///
/// `link` is unique within a shop and is the key the cart uses to address
/// an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub link: String,
    #[serde(default, deserialize_with = "price_or_zero")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    #[serde(default = "default_one")]
    pub quantity: u32,
    #[serde(default = "default_one")]
    pub step: u32,
}

impl Product {
    pub fn new(name: impl Into<String>, link: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            price,
            price_display: None,
            availability: None,
            img_url: None,
            quantity: 1,
            step: 1,
        }
    }

    pub fn with_availability(mut self, text: impl Into<String>) -> Self {
        self.availability = Some(text.into());
        self
    }
}

/// Cart lines share the product shape; `quantity` is the server's count.
pub type CartItem = Product;

/// Accumulated results for one shop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopResult {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ShopResult {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            count: products.len() as u64,
            products,
        }
    }

    /// A shop is ready once it holds at least one product.
    pub fn is_ready(&self) -> bool {
        !self.products.is_empty()
    }
}

/// Body of `/api/search` and `/api/search/update`: shop key to results.
pub type SearchResults = BTreeMap<String, ShopResult>;

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddToCartRequest<'a> {
    pub product: &'a Product,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateCartRequest<'a> {
    pub link: &'a str,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveFromCartRequest<'a> {
    pub link: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Shape of the server's 4xx bodies, e.g. `{"error": "empty query"}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_defaults_fill_missing_fields() {
        let p: Product =
            serde_json::from_str(r#"{"name":"Tape","link":"https://a/1","price":12.5}"#).unwrap();
        assert_eq!(p.quantity, 1);
        assert_eq!(p.step, 1);
        assert!(p.availability.is_none());
        assert!(p.price_display.is_none());
    }

    #[test]
    fn product_ignores_unknown_server_fields() {
        let p: Product = serde_json::from_str(
            r#"{"name":"Tape","link":"l","price":1,"site":"gudvin","id":7,"last_updated":null}"#,
        )
        .unwrap();
        assert_eq!(p.name, "Tape");
    }

    #[test]
    fn search_results_use_keyed_shape() {
        let body = r#"{"gudvin":{"count":2,"products":[
            {"name":"A","link":"a","price":1},
            {"name":"B","link":"b","price":2}]},
            "hozka":{"count":0,"products":[]}}"#;
        let results: SearchResults = serde_json::from_str(body).unwrap();
        assert_eq!(results["gudvin"].products.len(), 2);
        assert!(results["gudvin"].is_ready());
        assert!(!results["hozka"].is_ready());
    }

    #[test]
    fn null_price_reads_as_zero() {
        let body = r#"{"promispb":{"count":2,"products":[
            {"name":"A","link":"a","price":1.5,"availability":"В наличии"},
            {"name":"B","link":"b","price":null,"availability":"Под заказ"}]}}"#;
        let results: SearchResults = serde_json::from_str(body).unwrap();
        let products = &results["promispb"].products;
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, 1.5);
        assert_eq!(products[1].price, 0.0);

        let cart: Vec<CartItem> =
            serde_json::from_str(r#"[{"name":"B","link":"b","price":null,"quantity":3}]"#).unwrap();
        assert_eq!(cart[0].price, 0.0);
        assert_eq!(cart[0].quantity, 3);
    }

    #[test]
    fn bare_product_list_shape_is_rejected() {
        let body = r#"{"gudvin":[{"name":"A","link":"a","price":1}]}"#;
        assert!(serde_json::from_str::<SearchResults>(body).is_err());
    }

    #[test]
    fn optional_fields_are_not_serialized_when_absent() {
        let json = serde_json::to_value(Product::new("A", "a", 3.0)).unwrap();
        assert!(json.get("availability").is_none());
        assert_eq!(json["quantity"], 1);
    }
}
