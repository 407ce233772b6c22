//! Search session state and its pure transitions.
//!
//! A [`SearchSession`] is created per submitted query and replaced wholesale
//! by the next one. None of the transitions here perform I/O; the controller
//! feeds them with responses and the presenter reads the result.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::SearchResults;
use crate::search::presenter::{PAGE_SIZE, visible_products};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SearchError {
    #[error("Enter a search query")]
    EmptyQuery,
    #[error("Unknown sort mode: {0} (expected none, asc, desc or available)")]
    UnknownSortMode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    AvailableOnly,
}

impl FromStr for SortMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(SortMode::None),
            "asc" | "priceasc" | "price-asc" => Ok(SortMode::PriceAsc),
            "desc" | "pricedesc" | "price-desc" => Ok(SortMode::PriceDesc),
            "available" | "availableonly" | "available-only" => Ok(SortMode::AvailableOnly),
            other => Err(SearchError::UnknownSortMode(other.to_string())),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortMode::None => "none",
            SortMode::PriceAsc => "price ↑",
            SortMode::PriceDesc => "price ↓",
            SortMode::AvailableOnly => "in stock only",
        };
        f.write_str(s)
    }
}

/// Price window and ordering captured when a search is submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Filters {
    pub min_price: f64,
    pub max_price: f64,
    pub sort: SortMode,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            min_price: 0.0,
            max_price: f64::INFINITY,
            sort: SortMode::None,
        }
    }
}

impl Filters {
    /// NaN prices never match.
    pub fn admits_price(&self, price: f64) -> bool {
        price >= self.min_price && price <= self.max_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Polling,
    Settled,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "Idle",
            Phase::Searching => "Searching",
            Phase::Polling => "Polling",
            Phase::Settled => "Settled",
            Phase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// Cancellation handle for one session's background worker.
///
/// Dropping the handle cancels the worker, so a replaced session can never
/// keep polling.
#[derive(Debug)]
pub struct PollHandle {
    generation: u64,
    token: CancellationToken,
}

impl PollHandle {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token handed to the worker task.
    pub fn worker_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(generation = self.generation, "cancelling poll worker");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Shops whose stored result was replaced, in key order.
    pub changed: Vec<String>,
    /// Every known shop now holds at least one product.
    pub settled: bool,
}

impl MergeOutcome {
    pub fn needs_render(&self) -> bool {
        !self.changed.is_empty()
    }
}

#[derive(Debug)]
pub struct SearchSession {
    query: String,
    filters: Filters,
    per_shop_page: HashMap<String, usize>,
    results: SearchResults,
    phase: Phase,
    generation: u64,
    poll: Option<PollHandle>,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::idle()
    }
}

impl SearchSession {
    pub fn idle() -> Self {
        Self {
            query: String::new(),
            filters: Filters::default(),
            per_shop_page: HashMap::new(),
            results: SearchResults::new(),
            phase: Phase::Idle,
            generation: 0,
            poll: None,
        }
    }

    /// Fresh session in `Searching`. Rejects blank queries.
    pub fn start(query: &str, filters: Filters, generation: u64) -> Result<Self, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        info!(query, generation, sort = %filters.sort, "search session started");
        Ok(Self {
            query: query.to_string(),
            filters,
            per_shop_page: HashMap::new(),
            results: SearchResults::new(),
            phase: Phase::Searching,
            generation,
            poll: None,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn results(&self) -> &SearchResults {
        &self.results
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page(&self, shop: &str) -> usize {
        self.per_shop_page.get(shop).copied().unwrap_or(0)
    }

    pub fn poll_handle(&self) -> Option<&PollHandle> {
        self.poll.as_ref()
    }

    pub fn attach_poll(&mut self, handle: PollHandle) {
        if let Some(old) = self.poll.replace(handle) {
            old.cancel();
        }
    }

    pub fn cancel_poll(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.cancel();
        }
    }

    /// Vacuously true for an empty result set.
    pub fn all_ready(&self) -> bool {
        self.results.values().all(|r| r.is_ready())
    }

    /// Installs the initial response. Moves to `Polling` whenever the
    /// deployment supports incremental updates, otherwise to `Settled`.
    pub fn apply_initial(&mut self, results: SearchResults, polling_enabled: bool) -> Phase {
        self.results = results;
        self.phase = if polling_enabled {
            Phase::Polling
        } else {
            self.cancel_poll();
            Phase::Settled
        };
        info!(
            generation = self.generation,
            shops = self.results.len(),
            phase = %self.phase,
            "initial results applied"
        );
        self.phase
    }

    pub fn fail(&mut self) {
        self.cancel_poll();
        self.phase = Phase::Failed;
    }

    /// Merges an incremental update. A shop's stored result is replaced only
    /// when the update holds strictly more products; unknown shops are
    /// added. When something changed and every shop is ready, the session
    /// settles and polling is cancelled.
    pub fn merge_update(&mut self, update: SearchResults) -> MergeOutcome {
        let mut changed = Vec::new();
        for (shop, incoming) in update {
            match self.results.get_mut(&shop) {
                Some(current) if incoming.products.len() > current.products.len() => {
                    debug!(
                        shop = %shop,
                        before = current.products.len(),
                        after = incoming.products.len(),
                        "shop results grew"
                    );
                    *current = incoming;
                    changed.push(shop);
                }
                Some(_) => {}
                None => {
                    debug!(shop = %shop, "new shop in update");
                    self.results.insert(shop.clone(), incoming);
                    changed.push(shop);
                }
            }
        }
        let settled = !changed.is_empty() && self.all_ready();
        if settled {
            self.cancel_poll();
            self.phase = Phase::Settled;
            info!(generation = self.generation, "all shops reported, polling stopped");
        }
        MergeOutcome { changed, settled }
    }

    /// Moves one page in `direction` if the filtered list allows it.
    pub fn turn_page(&mut self, shop: &str, direction: PageDirection) -> bool {
        let Some(result) = self.results.get(shop) else {
            return false;
        };
        let page = self.page(shop);
        let next = match direction {
            PageDirection::Forward => {
                let filtered = visible_products(&result.products, &self.filters).len();
                if (page + 1) * PAGE_SIZE >= filtered {
                    return false;
                }
                page + 1
            }
            PageDirection::Backward => {
                if page == 0 {
                    return false;
                }
                page - 1
            }
        };
        self.per_shop_page.insert(shop.to_string(), next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Product, ShopResult};

    fn products(prefix: &str, n: usize) -> Vec<Product> {
        (0..n)
            .map(|i| Product::new(format!("{prefix}{i}"), format!("{prefix}/{i}"), i as f64))
            .collect()
    }

    fn results(entries: &[(&str, usize)]) -> SearchResults {
        entries
            .iter()
            .map(|(shop, n)| (shop.to_string(), ShopResult::new(products(shop, *n))))
            .collect()
    }

    fn polling_session(entries: &[(&str, usize)]) -> SearchSession {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        s.apply_initial(results(entries), true);
        s
    }

    #[test]
    fn blank_query_is_rejected() {
        assert_eq!(
            SearchSession::start("   ", Filters::default(), 1).unwrap_err(),
            SearchError::EmptyQuery
        );
        let s = SearchSession::start("  tape ", Filters::default(), 1).unwrap();
        assert_eq!(s.query(), "tape");
        assert_eq!(s.phase(), Phase::Searching);
    }

    #[test]
    fn sort_mode_parsing() {
        assert_eq!("asc".parse::<SortMode>().unwrap(), SortMode::PriceAsc);
        assert_eq!("DESC".parse::<SortMode>().unwrap(), SortMode::PriceDesc);
        assert_eq!(
            "available".parse::<SortMode>().unwrap(),
            SortMode::AvailableOnly
        );
        assert_eq!("none".parse::<SortMode>().unwrap(), SortMode::None);
        assert!("cheapest".parse::<SortMode>().is_err());
    }

    #[test]
    fn initial_with_empty_shop_starts_polling() {
        let s = polling_session(&[("gudvin", 2), ("hozka", 0)]);
        assert_eq!(s.phase(), Phase::Polling);
        assert!(!s.poll_handle().unwrap().is_cancelled());
    }

    #[test]
    fn initial_with_all_ready_still_polls_until_growth() {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        let token = s.poll_handle().unwrap().worker_token();
        assert_eq!(s.apply_initial(results(&[("gudvin", 2)]), true), Phase::Polling);

        let out = s.merge_update(results(&[("gudvin", 2)]));
        assert!(!out.settled);
        assert!(!token.is_cancelled());

        let out = s.merge_update(results(&[("gudvin", 3)]));
        assert!(out.settled);
        assert!(token.is_cancelled());
        assert!(s.poll_handle().is_none());
    }

    #[test]
    fn initial_without_polling_support_settles() {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        let token = s.poll_handle().unwrap().worker_token();
        assert_eq!(s.apply_initial(results(&[("hozka", 0)]), false), Phase::Settled);
        assert!(token.is_cancelled());
    }

    #[test]
    fn merge_replaces_only_on_strict_growth() {
        let mut s = polling_session(&[("gudvin", 2), ("hozka", 0)]);
        let out = s.merge_update(results(&[("gudvin", 2), ("hozka", 0)]));
        assert!(!out.needs_render());
        assert!(!out.settled);

        let out = s.merge_update(results(&[("gudvin", 1), ("hozka", 3)]));
        assert_eq!(out.changed, vec!["hozka".to_string()]);
        assert_eq!(s.results()["gudvin"].products.len(), 2);
        assert_eq!(s.results()["hozka"].products.len(), 3);
    }

    #[test]
    fn merge_never_shrinks_a_shop() {
        let mut s = polling_session(&[("gudvin", 4), ("hozka", 0)]);
        for n in [0, 1, 3, 4] {
            s.merge_update(results(&[("gudvin", n)]));
            assert_eq!(s.results()["gudvin"].products.len(), 4);
        }
    }

    #[test]
    fn merge_settles_when_every_shop_ready() {
        let mut s = polling_session(&[("gudvin", 2), ("hozka", 0)]);
        let token = s.poll_handle().unwrap().worker_token();
        let out = s.merge_update(results(&[("hozka", 1)]));
        assert!(out.settled);
        assert_eq!(s.phase(), Phase::Settled);
        assert!(token.is_cancelled());
    }

    #[test]
    fn merge_adds_unknown_shops() {
        let mut s = polling_session(&[("gudvin", 0)]);
        let out = s.merge_update(results(&[("artplast", 0)]));
        assert_eq!(out.changed, vec!["artplast".to_string()]);
        assert!(s.results().contains_key("artplast"));
        assert!(!out.settled);
    }

    #[test]
    fn pagination_bounds_follow_filtered_count() {
        let mut s = polling_session(&[("gudvin", 12), ("hozka", 0)]);
        assert!(!s.turn_page("gudvin", PageDirection::Backward));
        assert!(s.turn_page("gudvin", PageDirection::Forward));
        assert!(s.turn_page("gudvin", PageDirection::Forward));
        assert_eq!(s.page("gudvin"), 2);
        assert!(!s.turn_page("gudvin", PageDirection::Forward));
        assert!(s.turn_page("gudvin", PageDirection::Backward));
        assert_eq!(s.page("gudvin"), 1);
        assert!(!s.turn_page("nosuchshop", PageDirection::Forward));
    }

    #[test]
    fn pagination_respects_price_filter() {
        let filters = Filters {
            min_price: 0.0,
            max_price: 4.0,
            sort: SortMode::None,
        };
        let mut s = SearchSession::start("tape", filters, 1).unwrap();
        s.apply_initial(results(&[("gudvin", 12)]), true);
        // Prices 0..=4 pass: exactly one page.
        assert!(!s.turn_page("gudvin", PageDirection::Forward));
    }

    #[test]
    fn replacing_attached_handle_cancels_previous() {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        let first = s.poll_handle().unwrap().worker_token();
        s.attach_poll(PollHandle::new(2));
        assert!(first.is_cancelled());
        assert!(!s.poll_handle().unwrap().is_cancelled());
    }

    #[test]
    fn dropping_session_cancels_worker() {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        let token = s.poll_handle().unwrap().worker_token();
        drop(s);
        assert!(token.is_cancelled());
    }

    #[test]
    fn fail_cancels_and_marks_failed() {
        let mut s = SearchSession::start("tape", Filters::default(), 1).unwrap();
        s.attach_poll(PollHandle::new(1));
        let token = s.poll_handle().unwrap().worker_token();
        s.fail();
        assert_eq!(s.phase(), Phase::Failed);
        assert!(token.is_cancelled());
    }
}
