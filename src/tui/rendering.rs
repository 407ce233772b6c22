use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::tui::state::{LineKind, PlanLine, build_footer, build_results_plan, heading_row, truncate_display};
use crate::tui::theme::Theme;
use crate::tui::view::TuiApp;

const LOG_ROWS: u16 = 6;

impl TuiApp {
    pub fn view(&self, f: &mut Frame) {
        let size = f.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),        // Header
                Constraint::Min(3),           // Results + cart
                Constraint::Length(LOG_ROWS), // Log
                Constraint::Length(1),        // Status footer
                Constraint::Length(3),        // Input
            ])
            .split(size);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[1]);

        self.render_header(f, chunks[0]);
        self.render_results(f, body[0]);
        self.render_cart(f, body[1]);
        self.render_log(f, chunks[2]);
        self.render_status_footer(f, chunks[3]);
        self.render_input_area(f, chunks[4]);
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let title = truncate_display(&self.title, area.width as usize);
        f.render_widget(Paragraph::new(title).style(self.theme.header_style), area);
    }

    fn render_results(&self, f: &mut Frame, area: Rect) {
        let block_title = match &self.results {
            Some(v) if !v.query.is_empty() => format!("Results: {}", v.query),
            _ => "Results".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(block_title);
        let inner_height = area.height.saturating_sub(2) as usize;

        let Some(view) = &self.results else {
            let hint = Paragraph::new("Type a query and press Enter, or /help")
                .style(self.theme.notice_style)
                .block(block);
            f.render_widget(hint, area);
            return;
        };

        let plan = build_results_plan(view);
        // Keep the selected shop's heading on screen.
        let scroll = heading_row(&plan, self.selected_shop)
            .map(|row| row.saturating_sub(inner_height / 3))
            .unwrap_or(0);
        let lines: Vec<Line> = plan
            .iter()
            .map(|l| styled_line(l, self.selected_shop, &self.theme))
            .collect();
        let paragraph = Paragraph::new(lines)
            .block(block)
            .scroll((scroll.min(u16::MAX as usize) as u16, 0));
        f.render_widget(paragraph, area);
    }

    fn render_cart(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .cart
            .text_lines()
            .into_iter()
            .map(|l| Line::styled(l, self.theme.cart_style))
            .collect();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Cart"))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_log(&self, f: &mut Frame, area: Rect) {
        let rows = area.height as usize;
        let start = self.log.len().saturating_sub(rows);
        let width = area.width as usize;
        let lines: Vec<Line> = self.log[start..]
            .iter()
            .map(|l| {
                let style = if l.starts_with("[error]") {
                    self.theme.error_style
                } else {
                    self.theme.log_style
                };
                Line::styled(truncate_display(l, width), style)
            })
            .collect();
        f.render_widget(Paragraph::new(lines), area);
    }

    fn render_status_footer(&self, f: &mut Frame, area: Rect) {
        let text = build_footer(self.results.as_ref(), &self.form, &self.cart, area.width);
        f.render_widget(Paragraph::new(text).style(self.theme.footer_style), area);
    }

    fn render_input_area(&self, f: &mut Frame, area: Rect) {
        let input = Paragraph::new(format!("> {}", self.input))
            .style(self.theme.input_style)
            .block(Block::default().borders(Borders::ALL).title("Input"));
        f.render_widget(input, area);
        let cursor_x = area.x + 3 + unicode_width::UnicodeWidthStr::width(self.input.as_str()) as u16;
        f.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn styled_line(line: &PlanLine, selected: usize, theme: &Theme) -> Line<'static> {
    let style = match line.kind {
        LineKind::Notice => theme.notice_style,
        LineKind::Heading(idx) if idx == selected => theme.selected_heading_style,
        LineKind::Heading(_) => theme.heading_style,
        LineKind::Card(availability) => theme.badge_style(availability),
        LineKind::Detail | LineKind::Pager => theme.detail_style,
    };
    Line::styled(line.text.clone(), style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Product, SearchResults, ShopResult};
    use crate::search::{Filters, PresentOptions, SearchSession, ShopNames, present};
    use ratatui::backend::TestBackend;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn draws_results_cart_and_input() {
        let mut session = SearchSession::start("tape", Filters::default(), 1).unwrap();
        let mut results = SearchResults::new();
        results.insert(
            "gudvin".into(),
            ShopResult::new(vec![Product::new("Tape", "g/1", 10.0).with_availability("В наличии")]),
        );
        session.apply_initial(results, true);
        let names = ShopNames::default();
        let view = present(
            &session,
            &PresentOptions {
                names: &names,
                currency: "rub",
                image_proxy: None,
            },
        );

        let mut app = TuiApp::new("shopmux", "dark");
        app.set_results(view);
        app.input = "/cart".into();
        app.push_log("hello");

        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| app.view(f)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Results: tape"));
        assert!(text.contains("Gudvin Group (1 items)"));
        assert!(text.contains("Tape | 10.00 rub"));
        assert!(text.contains("Cart is empty"));
        assert!(text.contains("> /cart"));
        assert!(text.contains("hello"));
        assert!(text.contains("[Polling] \"tape\""));
    }
}
