//! Stock-status classification from free-form availability text.
//!
//! Shops phrase stock status differently ("В наличии", "Нет в наличии",
//! "Под заказ", "in stock: 12"), so classification is marker-based.
//! Exclusion markers take precedence over the in-stock marker: "нет в
//! наличии" contains "в наличии" and must still read as unavailable.

const ON_ORDER_MARKERS: &[&str] = &["под заказ", "on order", "backorder", "pre-order", "preorder"];
const OUT_OF_STOCK_MARKERS: &[&str] = &[
    "нет в наличии",
    "out of stock",
    "not in stock",
    "none in stock",
    "sold out",
    "unavailable",
];
const OUT_OF_STOCK_PREFIX: &str = "нет";
const IN_STOCK_MARKERS: &[&str] = &["в наличии", "in stock"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    OnOrder,
    Unavailable,
    /// Text present but matches no marker.
    Unknown,
    /// The product carries no availability text.
    Missing,
}

impl Availability {
    pub fn classify(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Availability::Missing;
        };
        let status = normalize(text);
        if ON_ORDER_MARKERS.iter().any(|m| status.contains(m)) {
            Availability::OnOrder
        } else if status.starts_with(OUT_OF_STOCK_PREFIX)
            || OUT_OF_STOCK_MARKERS.iter().any(|m| status.contains(m))
        {
            Availability::Unavailable
        } else if IN_STOCK_MARKERS.iter().any(|m| status.contains(m)) {
            Availability::Available
        } else {
            Availability::Unknown
        }
    }

    pub fn is_available(self) -> bool {
        self == Availability::Available
    }

    /// Reason the add-to-cart control is disabled, if it is.
    pub fn blocks_cart(self) -> Option<&'static str> {
        match self {
            Availability::OnOrder => Some("On order"),
            Availability::Unavailable => Some("Out of stock"),
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
