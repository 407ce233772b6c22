//! Pure layout of the results and footer text. Both the ratatui renderer and
//! line mode consume the same plan; only styling differs.

use unicode_width::UnicodeWidthChar;

use crate::cart::CartView;
use crate::search::{AddControl, Availability, Filters, ProductCard, ResultsView, ShopBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Notice,
    /// Shop heading; carries the shop's position in the view.
    Heading(usize),
    Card(Availability),
    Detail,
    Pager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLine {
    pub kind: LineKind,
    pub text: String,
}

impl PlanLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub fn truncate_display(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut width = 0usize;
    let mut out = String::new();
    for ch in s.chars() {
        let ch_w = ch.width().unwrap_or(0);
        if ch_w == 0 {
            out.push(ch);
            continue;
        }
        if width + ch_w > max {
            break;
        }
        out.push(ch);
        width += ch_w;
    }
    out
}

pub fn card_line(number: usize, card: &ProductCard) -> String {
    let status = card.availability_text.as_deref().unwrap_or("-");
    let mut line = format!(
        "{number:>3}. {} | {} | {}",
        card.name.trim(),
        card.price_label,
        status.trim()
    );
    if let AddControl::Disabled(reason) = card.add_control {
        line.push_str(&format!(" [{reason}]"));
    }
    line
}

pub fn build_results_plan(view: &ResultsView) -> Vec<PlanLine> {
    let mut lines = Vec::new();
    if let Some(notice) = &view.notice {
        lines.push(PlanLine::new(LineKind::Notice, notice.clone()));
    }
    for (idx, shop) in view.shops.iter().enumerate() {
        lines.push(PlanLine::new(LineKind::Heading(idx), shop.heading()));
        match &shop.body {
            ShopBody::Loading => lines.push(PlanLine::new(LineKind::Detail, "     loading…")),
            ShopBody::Empty => {
                lines.push(PlanLine::new(LineKind::Detail, "     no products match the filters"))
            }
            ShopBody::Page(page) => {
                for (i, card) in page.cards.iter().enumerate() {
                    lines.push(PlanLine::new(
                        LineKind::Card(card.availability),
                        card_line(i + 1, card),
                    ));
                    if let Some(image) = &card.image {
                        lines.push(PlanLine::new(LineKind::Detail, format!("       {image}")));
                    }
                }
                let prev = if page.can_prev { "‹ prev" } else { "      " };
                let next = if page.can_next { "next ›" } else { "" };
                lines.push(PlanLine::new(
                    LineKind::Pager,
                    format!(
                        "     {prev}  page {}/{} ({} shown)  {next}",
                        page.page + 1,
                        page.page_count,
                        page.filtered_count
                    )
                    .trim_end()
                    .to_string(),
                ));
            }
        }
    }
    lines
}

/// Row of the plan where the given shop's heading starts.
pub fn heading_row(plan: &[PlanLine], shop_index: usize) -> Option<usize> {
    plan.iter()
        .position(|l| l.kind == LineKind::Heading(shop_index))
}

pub fn describe_filters(filters: &Filters) -> String {
    let max = if filters.max_price.is_finite() {
        format!("{:.2}", filters.max_price)
    } else {
        "∞".to_string()
    };
    format!(
        "price {:.2}..{max}, sort: {}",
        filters.min_price, filters.sort
    )
}

pub fn build_footer(view: Option<&ResultsView>, form: &Filters, cart: &CartView, w: u16) -> String {
    let phase = view.map(|v| v.phase.to_string()).unwrap_or_else(|| "Idle".into());
    let query = match view {
        Some(v) if !v.query.is_empty() => format!(" \"{}\"", v.query),
        _ => String::new(),
    };
    let text = format!(
        "[{phase}]{query} | form: {} | cart: {} | Tab shop  ←/→ page  /help",
        describe_filters(form),
        cart.lines.len()
    );
    truncate_display(&text, w as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Product, SearchResults, ShopResult};
    use crate::search::{PresentOptions, SearchSession, ShopNames, SortMode, present};

    fn view_of(shops: Vec<(&str, Vec<Product>)>) -> ResultsView {
        let mut session = SearchSession::start("tape", Filters::default(), 1).unwrap();
        let results: SearchResults = shops
            .into_iter()
            .map(|(k, p)| (k.to_string(), ShopResult::new(p)))
            .collect();
        session.apply_initial(results, true);
        let names = ShopNames::default();
        present(
            &session,
            &PresentOptions {
                names: &names,
                currency: "руб.",
                image_proxy: None,
            },
        )
    }

    #[test]
    fn truncate_counts_wide_chars() {
        assert_eq!(truncate_display("abcdef", 3), "abc");
        assert_eq!(truncate_display("日本語", 4), "日本");
        assert_eq!(truncate_display("abc", 0), "");
    }

    #[test]
    fn plan_lists_headings_cards_and_pager() {
        let products: Vec<Product> = (0..7)
            .map(|i| Product::new(format!("Tape {i}"), format!("g/{i}"), 10.0 + i as f64))
            .collect();
        let view = view_of(vec![("gudvin", products), ("hozka", vec![])]);
        let plan = build_results_plan(&view);

        assert_eq!(plan[0].kind, LineKind::Heading(0));
        assert_eq!(plan[0].text, "Gudvin Group (7 items)");
        assert_eq!(plan[1].text, "  1. Tape 0 | 10.00 руб. | -");
        assert_eq!(plan[6].kind, LineKind::Pager);
        assert_eq!(plan[6].text, "             page 1/2 (7 shown)  next ›");
        assert_eq!(heading_row(&plan, 1), Some(7));
        assert_eq!(plan[8].text, "     loading…");
    }

    #[test]
    fn blocked_cards_show_reason() {
        let view = view_of(vec![(
            "promispb",
            vec![Product::new("Film", "p/1", 5.0).with_availability("Под заказ")],
        )]);
        let plan = build_results_plan(&view);
        assert_eq!(plan[1].kind, LineKind::Card(Availability::OnOrder));
        assert!(plan[1].text.ends_with("| Под заказ [On order]"));
    }

    #[test]
    fn notice_comes_first() {
        let view = view_of(vec![]);
        let plan = build_results_plan(&view);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, LineKind::Notice);
        assert_eq!(plan[0].text, "No products found.");
    }

    #[test]
    fn filters_are_described() {
        let mut f = Filters::default();
        assert_eq!(describe_filters(&f), "price 0.00..∞, sort: none");
        f.max_price = 100.0;
        f.sort = SortMode::PriceAsc;
        assert!(describe_filters(&f).starts_with("price 0.00..100.00"));
    }

    #[test]
    fn footer_without_search() {
        let footer = build_footer(None, &Filters::default(), &CartView::default(), 200);
        assert!(footer.starts_with("[Idle] | form: price 0.00..∞"));
        assert!(footer.contains("cart: 0"));
    }
}
