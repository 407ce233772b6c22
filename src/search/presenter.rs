//! Pure projection of a [`SearchSession`] into what the screen shows.
//!
//! Nothing here is retained between calls: the UI calls [`present`] after
//! every state change and draws the returned [`ResultsView`].

use crate::api::{ApiClient, Product};
use crate::search::availability::Availability;
use crate::search::session::{Filters, Phase, SearchSession, SortMode};
use crate::search::shops::ShopNames;

/// Product cards per shop page.
pub const PAGE_SIZE: usize = 5;

pub struct PresentOptions<'a> {
    pub names: &'a ShopNames,
    pub currency: &'a str,
    /// When set, card images point at the server's image cache.
    pub image_proxy: Option<&'a ApiClient>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub query: String,
    pub phase: Phase,
    pub filters: Filters,
    pub notice: Option<String>,
    pub shops: Vec<ShopView>,
}

impl ResultsView {
    pub fn shop(&self, key: &str) -> Option<&ShopView> {
        self.shops.iter().find(|s| s.key == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShopView {
    pub key: String,
    pub title: String,
    /// Server-reported total, before any client-side filtering.
    pub total_count: u64,
    pub body: ShopBody,
}

impl ShopView {
    pub fn heading(&self) -> String {
        format!("{} ({} items)", self.title, self.total_count)
    }

    pub fn cards(&self) -> &[ProductCard] {
        match &self.body {
            ShopBody::Page(page) => &page.cards,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShopBody {
    /// No products received yet.
    Loading,
    /// Products received, none pass the filters.
    Empty,
    Page(PageView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: usize,
    pub page_count: usize,
    pub filtered_count: usize,
    pub cards: Vec<ProductCard>,
    pub can_prev: bool,
    pub can_next: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductCard {
    pub name: String,
    pub link: String,
    pub image: Option<String>,
    pub price_label: String,
    pub availability_text: Option<String>,
    pub availability: Availability,
    pub add_control: AddControl,
    pub product: Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddControl {
    Enabled,
    Disabled(&'static str),
}

/// Products of one shop that pass the price window and sort mode, in
/// display order. Entries without a name or link are dropped.
pub fn visible_products<'a>(products: &'a [Product], filters: &Filters) -> Vec<&'a Product> {
    let mut out: Vec<&Product> = products
        .iter()
        .filter(|p| !p.name.is_empty() && !p.link.is_empty())
        .filter(|p| filters.admits_price(p.price))
        .collect();
    match filters.sort {
        SortMode::AvailableOnly => {
            out.retain(|p| Availability::classify(p.availability.as_deref()).is_available())
        }
        // `sort_by` is stable, so equal prices keep server order.
        SortMode::PriceAsc => out.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortMode::PriceDesc => out.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortMode::None => {}
    }
    out
}

pub fn format_price(product: &Product, currency: &str) -> String {
    match product.price_display.as_deref() {
        Some(display) if !display.trim().is_empty() => display.to_string(),
        _ => format!("{:.2} {currency}", product.price),
    }
}

pub fn present(session: &SearchSession, opts: &PresentOptions<'_>) -> ResultsView {
    let filters = *session.filters();
    let shops: Vec<ShopView> = session
        .results()
        .iter()
        .map(|(key, result)| {
            let body = if result.products.is_empty() {
                ShopBody::Loading
            } else {
                let visible = visible_products(&result.products, &filters);
                if visible.is_empty() {
                    ShopBody::Empty
                } else {
                    ShopBody::Page(page_view(&visible, session.page(key), opts))
                }
            };
            ShopView {
                key: key.clone(),
                title: opts.names.display_name(key),
                total_count: result.count,
                body,
            }
        })
        .collect();

    let notice = match session.phase() {
        Phase::Idle => None,
        Phase::Searching => Some("Searching…".to_string()),
        Phase::Failed => Some("Failed to load products".to_string()),
        Phase::Polling | Phase::Settled if shops.is_empty() => {
            Some("No products found.".to_string())
        }
        Phase::Polling | Phase::Settled => None,
    };

    ResultsView {
        query: session.query().to_string(),
        phase: session.phase(),
        filters,
        notice,
        shops,
    }
}

fn page_view(visible: &[&Product], page: usize, opts: &PresentOptions<'_>) -> PageView {
    let filtered_count = visible.len();
    let page_count = filtered_count.div_ceil(PAGE_SIZE);
    let start = (page * PAGE_SIZE).min(filtered_count);
    let end = (start + PAGE_SIZE).min(filtered_count);
    let cards = visible[start..end]
        .iter()
        .map(|p| product_card(p, opts))
        .collect();
    PageView {
        page,
        page_count,
        filtered_count,
        cards,
        can_prev: page > 0,
        can_next: (page + 1) * PAGE_SIZE < filtered_count,
    }
}

fn product_card(product: &Product, opts: &PresentOptions<'_>) -> ProductCard {
    let availability = Availability::classify(product.availability.as_deref());
    let image = product.img_url.as_deref().map(|url| match opts.image_proxy {
        Some(client) => client
            .cached_image_url(url)
            .unwrap_or_else(|_| url.to_string()),
        None => url.to_string(),
    });
    ProductCard {
        name: product.name.clone(),
        link: product.link.clone(),
        image,
        price_label: format_price(product, opts.currency),
        availability_text: product.availability.clone(),
        availability,
        add_control: match availability.blocks_cart() {
            Some(reason) => AddControl::Disabled(reason),
            None => AddControl::Enabled,
        },
        product: product.clone(),
    }
}
