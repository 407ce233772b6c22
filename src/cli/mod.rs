//! Line mode (`--no-tui`): the same commands over stdin/stdout.

use anyhow::Result;
use std::io::{self, Write};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::config::AppConfig;
use crate::tui::commands::{CommandHandler, HELP, ShopExecutor};
use crate::tui::state::build_results_plan;
use crate::tui::view::TuiApp;

const TICK: Duration = Duration::from_millis(100);

pub fn print_help() {
    println!("{HELP}");
}

/// Commands line mode handles itself. `Some(true)` means quit.
pub fn handle_command(line: &str) -> Option<bool> {
    match line.trim() {
        "/clear" => {
            print!("\x1B[2J\x1B[H");
            let _ = io::stdout().flush();
            Some(false)
        }
        "/quit" | "/exit" => Some(true),
        _ => None,
    }
}

/// Prints what changed in the UI state since the last call.
#[derive(Debug, Default)]
pub struct LinePrinter {
    log_seen: usize,
    results_seen: u64,
    cart_seen: u64,
}

impl LinePrinter {
    pub fn flush(&mut self, ui: &TuiApp, out: &mut impl Write) -> io::Result<()> {
        let new_lines = ui.log_seq.saturating_sub(self.log_seen).min(ui.log.len());
        for line in &ui.log[ui.log.len() - new_lines..] {
            writeln!(out, "{line}")?;
        }
        self.log_seen = ui.log_seq;

        if ui.results_seq != self.results_seen {
            self.results_seen = ui.results_seq;
            if let Some(view) = &ui.results {
                writeln!(out, "== {} [{}] ==", view.query, view.phase)?;
                for line in build_results_plan(view) {
                    writeln!(out, "{}", line.text)?;
                }
            }
        }

        if ui.cart_seq != self.cart_seen {
            self.cart_seen = ui.cart_seq;
            writeln!(out, "-- cart --")?;
            for line in ui.cart.text_lines() {
                writeln!(out, "{line}")?;
            }
        }
        out.flush()
    }
}

pub async fn run_cli_loop(cfg: AppConfig) -> Result<()> {
    println!("shopmux (line mode)");
    print_help();
    let mut exec = ShopExecutor::from_config(&cfg)?;
    let mut ui = TuiApp::new("shopmux", &cfg.theme);
    exec.load_cart();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK);
    let mut printer = LinePrinter::default();
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_command(&line) {
                    Some(true) => break,
                    Some(false) => {}
                    None => exec.handle(&line, &mut ui),
                }
            }
            _ = ticker.tick() => {
                exec.tick(&mut ui);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        printer.flush(&ui, &mut stdout)?;
        if ui.quit_requested() {
            break;
        }
    }
    info!("line mode finished");
    Ok(())
}
