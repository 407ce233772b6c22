use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::tui::view::{TerminalType, TuiApp};

const CTRL_C_WINDOW: Duration = Duration::from_secs(3);

impl TuiApp {
    pub(crate) fn event_loop(&mut self, terminal: &mut TerminalType) -> Result<()> {
        let mut last_ctrl_c_at: Option<Instant> = None;
        loop {
            self.poll_handler();

            if self.dirty {
                terminal.draw(|f| self.view(f))?;
                self.dirty = false;
            }

            if self.quit_requested {
                return Ok(());
            }

            if !event::poll(Duration::from_millis(50))? {
                continue;
            }
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => {
                    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
                        let now = Instant::now();
                        if let Some(prev) = last_ctrl_c_at
                            && now.duration_since(prev) <= CTRL_C_WINDOW
                        {
                            return Ok(());
                        }
                        last_ctrl_c_at = Some(now);
                        self.push_log("[Press Ctrl+C again within 3s to exit]");
                        continue;
                    }
                    self.handle_key(k);
                }
                Event::Resize(_, _) => self.dirty = true,
                _ => {}
            }
        }
    }

    pub(crate) fn handle_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                if !line.trim().is_empty() {
                    debug!(target: "tui", line = %line, "submit");
                    self.dispatch(&line);
                }
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Tab => self.select_next_shop(),
            KeyCode::BackTab => self.select_prev_shop(),
            KeyCode::Right | KeyCode::Left if self.input.is_empty() => {
                if let Some(key) = self.selected_shop_key().map(str::to_string) {
                    let cmd = if k.code == KeyCode::Right { "/next" } else { "/prev" };
                    self.dispatch(&format!("{cmd} {key}"));
                }
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => return,
        }
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::commands::CommandHandler;

    struct Recorder(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl CommandHandler for Recorder {
        fn handle(&mut self, line: &str, _ui: &mut TuiApp) {
            self.0.lock().unwrap().push(line.to_string());
        }

        fn tick(&mut self, _ui: &mut TuiApp) -> bool {
            false
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_enter_dispatches() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut app = TuiApp::new("t", "dark").with_handler(Box::new(Recorder(seen.clone())));
        for c in "/cart".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Char('t')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(*seen.lock().unwrap(), vec!["/cart"]);
        assert!(app.input.is_empty());

        app.handle_key(key(KeyCode::Char('x')));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.input.is_empty());

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn arrows_page_selected_shop() {
        use crate::search::{Filters, Phase, ResultsView, ShopBody, ShopView};

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut app = TuiApp::new("t", "dark").with_handler(Box::new(Recorder(seen.clone())));
        app.handle_key(key(KeyCode::Right));
        assert!(seen.lock().unwrap().is_empty());

        let shop = |k: &str| ShopView {
            key: k.into(),
            title: k.into(),
            total_count: 0,
            body: ShopBody::Loading,
        };
        app.set_results(ResultsView {
            query: "tape".into(),
            phase: Phase::Polling,
            filters: Filters::default(),
            notice: None,
            shops: vec![shop("gudvin"), shop("hozka")],
        });
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Left));
        assert_eq!(*seen.lock().unwrap(), vec!["/next hozka", "/prev hozka"]);
    }
}
