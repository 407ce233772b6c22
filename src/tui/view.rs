use anyhow::Result;
use crossterm::{cursor, execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;

use crate::cart::CartView;
use crate::search::{Filters, ResultsView};
use crate::tui::commands::CommandHandler;
use crate::tui::theme::Theme;

pub(crate) type TerminalType = Terminal<CrosstermBackend<io::Stdout>>;

/// UI state shared by the full-screen TUI and line mode. Nothing here
/// touches the terminal until [`TuiApp::run`] is called.
pub struct TuiApp {
    pub title: String,
    pub input: String,
    pub log: Vec<String>,
    pub(crate) handler: Option<Box<dyn CommandHandler + Send>>,
    pub max_log_lines: usize,
    /// Total lines ever pushed; line mode uses it to print only new ones.
    pub(crate) log_seq: usize,
    pub theme: Theme,
    pub results: Option<ResultsView>,
    pub(crate) results_seq: u64,
    pub cart: CartView,
    pub(crate) cart_seq: u64,
    /// Filter form as last edited, shown in the footer.
    pub form: Filters,
    pub selected_shop: usize,
    pub(crate) quit_requested: bool,
    pub(crate) dirty: bool,
}

impl TuiApp {
    pub fn new(title: impl Into<String>, theme: &str) -> Self {
        Self {
            title: title.into(),
            input: String::new(),
            log: Vec::new(),
            handler: None,
            max_log_lines: 500,
            log_seq: 0,
            theme: Theme::from_name(theme),
            results: None,
            results_seq: 0,
            cart: CartView::default(),
            cart_seq: 0,
            form: Filters::default(),
            selected_shop: 0,
            quit_requested: false,
            dirty: true,
        }
    }

    pub fn with_handler(mut self, h: Box<dyn CommandHandler + Send>) -> Self {
        self.handler = Some(h);
        self
    }

    pub fn push_log<S: Into<String>>(&mut self, s: S) {
        self.log.push(s.into());
        self.log_seq += 1;
        if self.log.len() > self.max_log_lines {
            let overflow = self.log.len() - self.max_log_lines;
            self.log.drain(0..overflow);
        }
        self.dirty = true;
    }

    pub fn set_results(&mut self, view: ResultsView) {
        if self.selected_shop >= view.shops.len() {
            self.selected_shop = 0;
        }
        self.results = Some(view);
        self.results_seq += 1;
        self.dirty = true;
    }

    pub fn set_cart(&mut self, cart: CartView) {
        self.cart = cart;
        self.cart_seq += 1;
        self.dirty = true;
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn selected_shop_key(&self) -> Option<&str> {
        self.results
            .as_ref()
            .and_then(|v| v.shops.get(self.selected_shop))
            .map(|s| s.key.as_str())
    }

    pub fn select_next_shop(&mut self) {
        let count = self.results.as_ref().map_or(0, |v| v.shops.len());
        if count > 0 {
            self.selected_shop = (self.selected_shop + 1) % count;
            self.dirty = true;
        }
    }

    pub fn select_prev_shop(&mut self) {
        let count = self.results.as_ref().map_or(0, |v| v.shops.len());
        if count > 0 {
            self.selected_shop = (self.selected_shop + count - 1) % count;
            self.dirty = true;
        }
    }

    pub fn run(&mut self) -> Result<()> {
        struct TuiGuard;
        impl Drop for TuiGuard {
            fn drop(&mut self) {
                let mut stdout = io::stdout();
                let _ = execute!(stdout, terminal::LeaveAlternateScreen, cursor::Show);
                let _ = terminal::disable_raw_mode();
            }
        }
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        let _guard = TuiGuard;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        terminal.clear()?;
        self.event_loop(&mut terminal)
    }

    pub fn dispatch(&mut self, line: &str) {
        if let Some(mut handler) = self.handler.take() {
            handler.handle(line, self);
            self.handler = Some(handler);
            return;
        }
        self.push_log(format!("> {line}"));
    }

    /// Lets the handler apply background results. Returns true if anything
    /// visible changed.
    pub fn poll_handler(&mut self) -> bool {
        let Some(mut handler) = self.handler.take() else {
            return false;
        };
        let changed = handler.tick(self);
        self.handler = Some(handler);
        if changed {
            self.dirty = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Phase, ShopBody, ShopView};

    struct Echo {
        ticks: usize,
    }

    impl CommandHandler for Echo {
        fn handle(&mut self, line: &str, ui: &mut TuiApp) {
            ui.push_log(format!("echo {line}"));
        }

        fn tick(&mut self, _ui: &mut TuiApp) -> bool {
            self.ticks += 1;
            self.ticks == 1
        }
    }

    fn view(keys: &[&str]) -> ResultsView {
        ResultsView {
            query: "tape".into(),
            phase: Phase::Polling,
            filters: Filters::default(),
            notice: None,
            shops: keys
                .iter()
                .map(|k| ShopView {
                    key: k.to_string(),
                    title: k.to_string(),
                    total_count: 0,
                    body: ShopBody::Loading,
                })
                .collect(),
        }
    }

    #[test]
    fn dispatch_goes_through_handler() {
        let mut app = TuiApp::new("t", "dark").with_handler(Box::new(Echo { ticks: 0 }));
        app.dispatch("/help");
        assert_eq!(app.log, vec!["echo /help"]);
        assert!(app.handler.is_some());
        assert!(app.poll_handler());
        assert!(!app.poll_handler());
    }

    #[test]
    fn dispatch_without_handler_logs_line() {
        let mut app = TuiApp::new("t", "dark");
        app.dispatch("hello");
        assert_eq!(app.log, vec!["> hello"]);
    }

    #[test]
    fn log_is_bounded() {
        let mut app = TuiApp::new("t", "dark");
        app.max_log_lines = 3;
        for i in 0..5 {
            app.push_log(format!("{i}"));
        }
        assert_eq!(app.log, vec!["2", "3", "4"]);
        assert_eq!(app.log_seq, 5);
    }

    #[test]
    fn shop_selection_wraps() {
        let mut app = TuiApp::new("t", "dark");
        app.select_next_shop();
        assert_eq!(app.selected_shop, 0);
        app.set_results(view(&["a", "b", "c"]));
        app.select_prev_shop();
        assert_eq!(app.selected_shop_key(), Some("c"));
        app.select_next_shop();
        assert_eq!(app.selected_shop_key(), Some("a"));

        app.selected_shop = 2;
        app.set_results(view(&["a"]));
        assert_eq!(app.selected_shop, 0);
    }
}
