//! Server-tracked cart.
//!
//! The server owns the cart. The client only holds the list returned by the
//! last `GET /api/cart` and re-fetches after every successful mutation.

use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, CartItem, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

/// Quantities below one are never sent.
pub fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(1, u32::MAX as i64) as u32
}

/// Quick +/- control: one step up, or one step down but never below `step`.
pub fn step_quantity(current: u32, step: u32, direction: StepDirection) -> u32 {
    let step = step.max(1);
    match direction {
        StepDirection::Up => current.saturating_add(step),
        StepDirection::Down => current.saturating_sub(step).max(step),
    }
}

/// Result of a cart mutation that was followed by a re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CartChange {
    pub message: String,
    /// `None` when the mutation succeeded but the re-fetch failed.
    pub items: Option<Vec<CartItem>>,
}

#[derive(Debug, Clone)]
pub struct CartService {
    api: ApiClient,
}

impl CartService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn load(&self) -> Result<Vec<CartItem>, ApiError> {
        self.api.cart().await
    }

    pub async fn add(&self, product: &Product) -> Result<CartChange, ApiError> {
        let resp = self.api.cart_add(product).await?;
        info!(link = %product.link, "added to cart");
        Ok(self.refetch(resp.message).await)
    }

    pub async fn set_quantity(&self, link: &str, quantity: i64) -> Result<CartChange, ApiError> {
        let quantity = clamp_quantity(quantity);
        let resp = self.api.cart_update(link, quantity).await?;
        info!(link, quantity, "cart quantity updated");
        Ok(self.refetch(resp.message).await)
    }

    pub async fn step(&self, item: &CartItem, direction: StepDirection) -> Result<CartChange, ApiError> {
        let quantity = step_quantity(item.quantity, item.step, direction);
        self.set_quantity(&item.link, i64::from(quantity)).await
    }

    pub async fn remove(&self, link: &str) -> Result<CartChange, ApiError> {
        let resp = self.api.cart_remove(link).await?;
        info!(link, "removed from cart");
        Ok(self.refetch(resp.message).await)
    }

    pub async fn checkout(&self) -> Result<CartChange, ApiError> {
        let resp = self.api.cart_checkout().await?;
        info!(message = %resp.message, "checkout complete");
        Ok(self.refetch(resp.message).await)
    }

    async fn refetch(&self, message: String) -> CartChange {
        let items = match self.load().await {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(error = %e, "cart re-fetch failed");
                None
            }
        };
        CartChange { message, items }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    /// 1-based position used by the `/qty`, `/inc`, `/dec` and `/rm` commands.
    pub index: usize,
    pub name: String,
    pub link: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
}

impl CartView {
    pub fn from_items(items: &[CartItem]) -> Self {
        let lines = items
            .iter()
            .enumerate()
            .map(|(i, item)| CartLine {
                index: i + 1,
                name: item.name.clone(),
                link: item.link.clone(),
                quantity: item.quantity,
            })
            .collect();
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text_lines(&self) -> Vec<String> {
        if self.lines.is_empty() {
            return vec!["Cart is empty".to_string()];
        }
        self.lines
            .iter()
            .map(|l| format!("{:>2}. {} ×{}", l.index, l.name, l.quantity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn service(server: &Server) -> CartService {
        CartService::new(ApiClient::new(server.url_str("")).unwrap())
    }

    fn cart_json() -> serde_json::Value {
        serde_json::json!([
            {"name": "Tape", "link": "g/1", "price": 10.0, "quantity": 2, "step": 1}
        ])
    }

    #[test]
    fn quantities_are_clamped_to_one() {
        assert_eq!(clamp_quantity(0), 1);
        assert_eq!(clamp_quantity(-5), 1);
        assert_eq!(clamp_quantity(7), 7);
    }

    #[test]
    fn stepping_never_goes_below_step() {
        assert_eq!(step_quantity(1, 1, StepDirection::Down), 1);
        assert_eq!(step_quantity(10, 5, StepDirection::Down), 5);
        assert_eq!(step_quantity(5, 5, StepDirection::Down), 5);
        assert_eq!(step_quantity(5, 5, StepDirection::Up), 10);
        assert_eq!(step_quantity(3, 0, StepDirection::Up), 4);
    }

    #[tokio::test]
    async fn zero_quantity_is_sent_as_one() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/api/cart/update"),
                request::body(json_decoded(eq(
                    serde_json::json!({"link": "g/1", "quantity": 1})
                ))),
            ])
            .respond_with(json_encoded(serde_json::json!({"message": "Cart updated"}))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/cart"))
                .respond_with(json_encoded(cart_json())),
        );
        let change = service(&server).set_quantity("g/1", 0).await.unwrap();
        assert_eq!(change.message, "Cart updated");
        assert_eq!(change.items.unwrap()[0].quantity, 2);
    }

    #[tokio::test]
    async fn checkout_refetches_cart() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/api/cart/checkout"),
                request::body(json_decoded(eq(serde_json::json!({})))),
            ])
            .respond_with(json_encoded(serde_json::json!({"message": "Order placed"}))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/cart"))
                .times(1)
                .respond_with(json_encoded(serde_json::json!([]))),
        );
        let change = service(&server).checkout().await.unwrap();
        assert_eq!(change.message, "Order placed");
        assert_eq!(change.items, Some(vec![]));
    }

    #[tokio::test]
    async fn failed_checkout_does_not_refetch() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/api/cart/checkout")).respond_with(
                status_code(400)
                    .append_header("Content-Type", "application/json")
                    .body(r#"{"error":"Your cart is empty"}"#),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/cart"))
                .times(0)
                .respond_with(json_encoded(serde_json::json!([]))),
        );
        let err = service(&server).checkout().await.unwrap_err();
        assert_eq!(err.user_message(), "Your cart is empty");
    }

    #[tokio::test]
    async fn add_sends_product_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/api/cart/add"),
                request::body(json_decoded(eq(serde_json::json!({
                    "product": {"name": "Tape", "link": "g/1", "price": 10.0, "quantity": 1, "step": 1}
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({"message": "Added"}))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/cart"))
                .respond_with(json_encoded(cart_json())),
        );
        let change = service(&server)
            .add(&Product::new("Tape", "g/1", 10.0))
            .await
            .unwrap();
        assert_eq!(change.message, "Added");
    }

    #[tokio::test]
    async fn refetch_failure_keeps_mutation_result() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/api/cart/remove"))
                .respond_with(json_encoded(serde_json::json!({"message": "Removed"}))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/cart"))
                .respond_with(status_code(500)),
        );
        let change = service(&server).remove("g/1").await.unwrap();
        assert_eq!(change.message, "Removed");
        assert!(change.items.is_none());
    }

    #[test]
    fn cart_view_lines() {
        assert_eq!(CartView::default().text_lines(), vec!["Cart is empty"]);
        let mut item = Product::new("Tape", "g/1", 10.0);
        item.quantity = 3;
        let view = CartView::from_items(&[item]);
        assert_eq!(view.text_lines(), vec![" 1. Tape ×3"]);
        assert_eq!(view.lines[0].link, "g/1");
    }
}
