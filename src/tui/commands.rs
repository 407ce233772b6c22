//! Slash-command grammar and the handler that executes it.
//!
//! The handler owns the search controller and the cart service. Search I/O
//! runs in the controller's worker; cart calls are spawned per action. Both
//! report back over channels that [`CommandHandler::tick`] drains on the UI
//! thread, so all state changes happen there.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, CartItem, Product};
use crate::cart::{CartChange, CartService, CartView, StepDirection};
use crate::config::AppConfig;
use crate::search::{
    self, AddControl, Filters, PageDirection, PollSettings, PresentOptions, ResultsView,
    SearchController, SearchError, SearchUpdate, ShopNames, SortMode,
};
use crate::tui::view::TuiApp;

pub const HELP: &str = "\
/search <query>     Search all shops (bare text works too)
/min <price|none>   Set minimum price for the next search
/max <price|none>   Set maximum price for the next search
/sort none|asc|desc|available
/apply              Re-run the last search with the current filters
/next <shop>        Next page of a shop (shop key, name or number)
/prev <shop>        Previous page of a shop
/add <shop> <n>     Add the n-th product on the shop's page to the cart
/open <shop> <n>    Open the n-th product in the browser
/cart               Reload the cart
/qty <i> <q>        Set quantity of cart line i
/inc <i>, /dec <i>  Step quantity of cart line i
/rm <i>             Remove cart line i
/checkout           Place the order
/clear              Clear the log
/help               Show this help
/quit               Quit";

pub trait CommandHandler {
    fn handle(&mut self, line: &str, ui: &mut TuiApp);

    /// Applies background results to `ui`. Returns true if anything changed.
    fn tick(&mut self, ui: &mut TuiApp) -> bool;
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0} (try /help)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a valid number: {0}")]
    InvalidNumber(String),

    #[error("not a valid price: {0}")]
    InvalidPrice(String),

    #[error("{0}")]
    Search(#[from] SearchError),

    #[error("no shop matches '{0}'")]
    UnknownShop(String),

    #[error("{shop} has no item {number} on this page")]
    NoSuchCard { shop: String, number: usize },

    #[error("no cart line {0}")]
    NoSuchCartLine(usize),

    #[error("cannot add to cart: {0}")]
    CartBlocked(&'static str),

    #[error("no previous search to apply filters to")]
    NothingToApply,

    #[error("failed to open {link}: {reason}")]
    Open { link: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Min(f64),
    Max(Option<f64>),
    Sort(SortMode),
    Apply,
    Next(String),
    Prev(String),
    Add { shop: String, number: usize },
    Open { shop: String, number: usize },
    Cart,
    Qty { index: usize, quantity: i64 },
    Inc(usize),
    Dec(usize),
    Rm(usize),
    Checkout,
    Clear,
    Help,
    Quit,
}

fn parse_price(s: &str) -> Result<f64, CommandError> {
    let v: f64 = s
        .replace(',', ".")
        .parse()
        .map_err(|_| CommandError::InvalidPrice(s.to_string()))?;
    if !v.is_finite() || v < 0.0 {
        return Err(CommandError::InvalidPrice(s.to_string()));
    }
    Ok(v)
}

fn parse_position(s: &str) -> Result<usize, CommandError> {
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommandError::InvalidNumber(s.to_string())),
    }
}

fn one_arg<'a>(args: &[&'a str], usage: &'static str) -> Result<&'a str, CommandError> {
    match args {
        [a] => Ok(*a),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn two_args<'a>(args: &[&'a str], usage: &'static str) -> Result<(&'a str, &'a str), CommandError> {
    match args {
        [a, b] => Ok((*a, *b)),
        _ => Err(CommandError::Usage(usage)),
    }
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Command::Search(line.to_string()));
    }
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let cmd = match name {
        "/search" => Command::Search(rest.to_string()),
        "/min" => {
            let arg = one_arg(&args, "/min <price|none>")?;
            if arg.eq_ignore_ascii_case("none") {
                Command::Min(0.0)
            } else {
                Command::Min(parse_price(arg)?)
            }
        }
        "/max" => {
            let arg = one_arg(&args, "/max <price|none>")?;
            if arg.eq_ignore_ascii_case("none") {
                Command::Max(None)
            } else {
                Command::Max(Some(parse_price(arg)?))
            }
        }
        "/sort" => Command::Sort(one_arg(&args, "/sort none|asc|desc|available")?.parse()?),
        "/apply" => Command::Apply,
        "/next" => Command::Next(one_arg(&args, "/next <shop>")?.to_string()),
        "/prev" => Command::Prev(one_arg(&args, "/prev <shop>")?.to_string()),
        "/add" => {
            let (shop, n) = two_args(&args, "/add <shop> <n>")?;
            Command::Add {
                shop: shop.to_string(),
                number: parse_position(n)?,
            }
        }
        "/open" => {
            let (shop, n) = two_args(&args, "/open <shop> <n>")?;
            Command::Open {
                shop: shop.to_string(),
                number: parse_position(n)?,
            }
        }
        "/cart" => Command::Cart,
        "/qty" => {
            let (i, q) = two_args(&args, "/qty <i> <quantity>")?;
            Command::Qty {
                index: parse_position(i)?,
                quantity: q
                    .parse()
                    .map_err(|_| CommandError::InvalidNumber(q.to_string()))?,
            }
        }
        "/inc" => Command::Inc(parse_position(one_arg(&args, "/inc <i>")?)?),
        "/dec" => Command::Dec(parse_position(one_arg(&args, "/dec <i>")?)?),
        "/rm" => Command::Rm(parse_position(one_arg(&args, "/rm <i>")?)?),
        "/checkout" => Command::Checkout,
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}

/// Resolves a shop argument against the shops currently shown: a 1-based
/// position, a shop key, or a display name, case-insensitively.
pub fn resolve_shop(view: &ResultsView, arg: &str) -> Result<String, CommandError> {
    if let Ok(n) = arg.parse::<usize>()
        && n >= 1
        && let Some(shop) = view.shops.get(n - 1)
    {
        return Ok(shop.key.clone());
    }
    let wanted = arg.to_lowercase();
    view.shops
        .iter()
        .find(|s| s.key.to_lowercase() == wanted || s.title.to_lowercase() == wanted)
        .map(|s| s.key.clone())
        .ok_or_else(|| CommandError::UnknownShop(arg.to_string()))
}

pub fn open_in_browser(url: &str) -> std::io::Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(windows) {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };
    let mut child = cmd
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

type Opener = Box<dyn Fn(&str) -> std::io::Result<()> + Send>;

enum CartEvent {
    Loaded(Result<Vec<CartItem>, ApiError>),
    Changed(Result<CartChange, ApiError>),
}

pub struct ShopExecutor {
    api: ApiClient,
    controller: SearchController,
    cart: CartService,
    cart_items: Vec<CartItem>,
    cart_tx: mpsc::UnboundedSender<CartEvent>,
    cart_rx: mpsc::UnboundedReceiver<CartEvent>,
    names: ShopNames,
    currency: String,
    form: Filters,
    last_query: Option<String>,
    opener: Opener,
}

impl ShopExecutor {
    pub fn new(
        api: ApiClient,
        settings: PollSettings,
        names: ShopNames,
        currency: impl Into<String>,
    ) -> Self {
        let (cart_tx, cart_rx) = mpsc::unbounded_channel();
        Self {
            controller: SearchController::new(Arc::new(api.clone()), settings),
            cart: CartService::new(api.clone()),
            api,
            cart_items: Vec::new(),
            cart_tx,
            cart_rx,
            names,
            currency: currency.into(),
            form: Filters::default(),
            last_query: None,
            opener: Box::new(open_in_browser),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let api = ApiClient::new(cfg.base_url.clone())?.with_connect_timeout(cfg.connect_timeout());
        Ok(Self::new(
            api,
            cfg.poll_settings(),
            cfg.shop_names(),
            cfg.currency_suffix.clone(),
        ))
    }

    pub fn with_opener(mut self, opener: impl Fn(&str) -> std::io::Result<()> + Send + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn form(&self) -> Filters {
        self.form
    }

    pub fn current_view(&self) -> ResultsView {
        search::present(
            self.controller.session(),
            &PresentOptions {
                names: &self.names,
                currency: &self.currency,
                image_proxy: Some(&self.api),
            },
        )
    }

    /// Fetches the cart in the background; the result arrives on a later tick.
    pub fn load_cart(&self) {
        let cart = self.cart.clone();
        let tx = self.cart_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(CartEvent::Loaded(cart.load().await));
        });
    }

    fn spawn_cart_change<F, Fut>(&self, action: F)
    where
        F: FnOnce(CartService) -> Fut,
        Fut: std::future::Future<Output = Result<CartChange, ApiError>> + Send + 'static,
    {
        let fut = action(self.cart.clone());
        let tx = self.cart_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(CartEvent::Changed(fut.await));
        });
    }

    fn refresh(&self, ui: &mut TuiApp) {
        ui.form = self.form;
        ui.set_results(self.current_view());
    }

    fn cart_line(&self, index: usize) -> Result<CartItem, CommandError> {
        index
            .checked_sub(1)
            .and_then(|i| self.cart_items.get(i))
            .cloned()
            .ok_or(CommandError::NoSuchCartLine(index))
    }

    fn card_product(&self, shop_arg: &str, number: usize) -> Result<(Product, AddControl), CommandError> {
        let view = self.current_view();
        let key = resolve_shop(&view, shop_arg)?;
        view.shop(&key)
            .and_then(|shop| shop.cards().get(number - 1))
            .map(|card| (card.product.clone(), card.add_control))
            .ok_or(CommandError::NoSuchCard { shop: key, number })
    }

    fn start_search(&mut self, query: &str, ui: &mut TuiApp) -> Result<(), CommandError> {
        self.controller.start_search(query, self.form)?;
        let query = self.controller.session().query().to_string();
        info!(query = %query, "search started");
        self.last_query = Some(query);
        ui.selected_shop = 0;
        self.refresh(ui);
        Ok(())
    }

    fn execute(&mut self, cmd: Command, ui: &mut TuiApp) -> Result<(), CommandError> {
        match cmd {
            Command::Search(query) => self.start_search(&query, ui)?,
            Command::Min(v) => {
                self.form.min_price = v;
                ui.form = self.form;
                ui.push_log(format!("Min price {v:.2}; /apply to re-run the search"));
            }
            Command::Max(v) => {
                self.form.max_price = v.unwrap_or(f64::INFINITY);
                ui.form = self.form;
                match v {
                    Some(v) => ui.push_log(format!("Max price {v:.2}; /apply to re-run the search")),
                    None => ui.push_log("Max price cleared; /apply to re-run the search"),
                }
            }
            Command::Sort(mode) => {
                self.form.sort = mode;
                ui.form = self.form;
                ui.push_log(format!("Sort: {mode}; /apply to re-run the search"));
            }
            Command::Apply => {
                let query = self.last_query.clone().ok_or(CommandError::NothingToApply)?;
                self.start_search(&query, ui)?;
            }
            Command::Next(shop) => self.turn_page(&shop, PageDirection::Forward, ui)?,
            Command::Prev(shop) => self.turn_page(&shop, PageDirection::Backward, ui)?,
            Command::Add { shop, number } => {
                let (product, control) = self.card_product(&shop, number)?;
                if let AddControl::Disabled(reason) = control {
                    return Err(CommandError::CartBlocked(reason));
                }
                ui.push_log(format!("Adding {} to cart…", product.name));
                self.spawn_cart_change(move |cart| async move { cart.add(&product).await });
            }
            Command::Open { shop, number } => {
                let (product, _) = self.card_product(&shop, number)?;
                (self.opener)(&product.link).map_err(|e| CommandError::Open {
                    link: product.link.clone(),
                    reason: e.to_string(),
                })?;
                ui.push_log(format!("Opened {}", product.link));
            }
            Command::Cart => self.load_cart(),
            Command::Qty { index, quantity } => {
                let item = self.cart_line(index)?;
                self.spawn_cart_change(move |cart| async move {
                    cart.set_quantity(&item.link, quantity).await
                });
            }
            Command::Inc(index) => self.step_line(index, StepDirection::Up)?,
            Command::Dec(index) => self.step_line(index, StepDirection::Down)?,
            Command::Rm(index) => {
                let item = self.cart_line(index)?;
                self.spawn_cart_change(move |cart| async move { cart.remove(&item.link).await });
            }
            Command::Checkout => self.spawn_cart_change(|cart| async move { cart.checkout().await }),
            Command::Clear => ui.log.clear(),
            Command::Help => {
                for line in HELP.lines() {
                    ui.push_log(line);
                }
            }
            Command::Quit => ui.request_quit(),
        }
        Ok(())
    }

    fn step_line(&self, index: usize, direction: StepDirection) -> Result<(), CommandError> {
        let item = self.cart_line(index)?;
        self.spawn_cart_change(move |cart| async move { cart.step(&item, direction).await });
        Ok(())
    }

    fn turn_page(
        &mut self,
        shop: &str,
        direction: PageDirection,
        ui: &mut TuiApp,
    ) -> Result<(), CommandError> {
        let key = resolve_shop(&self.current_view(), shop)?;
        if self.controller.turn_page(&key, direction) {
            if let Some(pos) = ui.results.as_ref().and_then(|v| v.shops.iter().position(|s| s.key == key)) {
                ui.selected_shop = pos;
            }
            self.refresh(ui);
        } else {
            ui.push_log("No more pages");
        }
        Ok(())
    }

    fn apply_search_update(&mut self, update: &SearchUpdate, ui: &mut TuiApp) {
        match update {
            SearchUpdate::InitialFailed(msg) => {
                ui.push_log(format!("[error] Search failed: {msg}"));
            }
            SearchUpdate::Merged(outcome) if outcome.settled => {
                ui.push_log("All shops have results");
            }
            _ => {}
        }
    }

    fn apply_cart_event(&mut self, event: CartEvent, ui: &mut TuiApp) {
        match event {
            CartEvent::Loaded(Ok(items)) => {
                ui.set_cart(CartView::from_items(&items));
                self.cart_items = items;
            }
            CartEvent::Loaded(Err(e)) => {
                warn!(error = %e, "cart load failed");
                ui.push_log(format!("[error] Failed to load cart: {}", e.user_message()));
            }
            CartEvent::Changed(Ok(change)) => {
                ui.push_log(change.message);
                if let Some(items) = change.items {
                    ui.set_cart(CartView::from_items(&items));
                    self.cart_items = items;
                }
            }
            CartEvent::Changed(Err(e)) => {
                warn!(error = %e, "cart action failed");
                ui.push_log(format!("[error] {}", e.user_message()));
            }
        }
    }
}

impl CommandHandler for ShopExecutor {
    fn handle(&mut self, line: &str, ui: &mut TuiApp) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        ui.push_log(format!("> {line}"));
        let result = parse_command(line).and_then(|cmd| self.execute(cmd, ui));
        if let Err(e) = result {
            ui.push_log(format!("[error] {e}"));
        }
    }

    fn tick(&mut self, ui: &mut TuiApp) -> bool {
        let mut changed = false;
        let mut render = false;
        for update in self.controller.drain() {
            self.apply_search_update(&update, ui);
            render |= update.needs_render();
        }
        if render {
            self.refresh(ui);
            changed = true;
        }
        while let Ok(event) = self.cart_rx.try_recv() {
            self.apply_cart_event(event, ui);
            changed = true;
        }
        changed
    }
}
