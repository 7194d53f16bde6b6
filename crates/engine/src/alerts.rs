use orderwatch_core_types::{AlertCategory, EnrichedOrder};

use super::enrich::{AlertThresholds, RegionProfile};

const CELL_STYLE: &str = "padding: 12px; border-bottom: 1px solid #eee;";
const HEADER_STYLE: &str = "padding: 12px; text-align: left; border-bottom: 2px solid #E8A33C;";
const ACCENT_CELL_STYLE: &str =
    "padding: 12px; border-bottom: 1px solid #eee; color: #E8A33C; font-weight: bold;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub html: String,
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

pub fn subject(category: AlertCategory, profile: &RegionProfile, count: usize) -> String {
    let tag = profile.region.label();
    let s = plural(count);
    match category {
        AlertCategory::OverdueUnshipped => {
            let verb = if count == 1 { "Requires" } else { "Require" };
            format!("⚠️ [{tag}] {count} Unshipped Order{s} {verb} Attention")
        }
        AlertCategory::StuckIncomplete => {
            format!("⏳ [{tag}] {count} Incomplete Order{s} Stuck at Checkout")
        }
        AlertCategory::HasComment => {
            format!("💬 [{tag}] {count} Order{s} With Customer Comments")
        }
    }
}

fn format_total(order: &EnrichedOrder) -> String {
    format!("{}{:.2}", order.currency, order.order.total_inc_tax)
}

fn format_date(order: &EnrichedOrder) -> String {
    order.order.date_created.format("%d/%m/%Y").to_string()
}

fn summary_line(
    category: AlertCategory,
    count: usize,
    thresholds: &AlertThresholds,
) -> String {
    let has = if count == 1 { " has" } else { "s have" };
    match category {
        AlertCategory::OverdueUnshipped => format!(
            "{count} order{has} exceeded the {} hour shipping threshold.",
            thresholds.overdue_hours
        ),
        AlertCategory::StuckIncomplete => format!(
            "{count} checkout{has} been incomplete for {} minutes or longer.",
            thresholds.incomplete_minutes
        ),
        AlertCategory::HasComment => {
            let s = plural(count);
            format!("{count} order{s} carry a customer comment that may need a reply.")
        }
    }
}

fn headers(category: AlertCategory) -> &'static [&'static str] {
    match category {
        AlertCategory::OverdueUnshipped => &["Order", "Customer", "Date", "Hours Open", "Total"],
        AlertCategory::StuckIncomplete => {
            &["Order", "Customer", "Started", "Minutes Open", "Total"]
        }
        AlertCategory::HasComment => &["Order", "Customer", "Status", "Comment"],
    }
}

fn row(category: AlertCategory, order: &EnrichedOrder) -> String {
    let id = format!("#{}", order.id());
    let customer = escape_html(&order.order.customer_name());
    let cells = match category {
        AlertCategory::OverdueUnshipped => vec![
            (CELL_STYLE, id),
            (CELL_STYLE, customer),
            (CELL_STYLE, format_date(order)),
            (ACCENT_CELL_STYLE, format!("{}h", order.age_hours)),
            (CELL_STYLE, escape_html(&format_total(order))),
        ],
        AlertCategory::StuckIncomplete => vec![
            (CELL_STYLE, id),
            (CELL_STYLE, customer),
            (CELL_STYLE, order.order.date_created.format("%d/%m/%Y %H:%M").to_string()),
            (ACCENT_CELL_STYLE, format!("{}m", order.age_minutes)),
            (CELL_STYLE, escape_html(&format_total(order))),
        ],
        AlertCategory::HasComment => vec![
            (CELL_STYLE, id),
            (CELL_STYLE, customer),
            (CELL_STYLE, escape_html(&order.order.status)),
            (CELL_STYLE, escape_html(order.order.customer_message.trim())),
        ],
    };
    let cells: String = cells
        .into_iter()
        .map(|(style, value)| format!("<td style=\"{style}\">{value}</td>"))
        .collect();
    format!("<tr>{cells}</tr>")
}

/// Render the full email for one non-empty category of one store.
pub fn render_alert(
    category: AlertCategory,
    orders: &[EnrichedOrder],
    profile: &RegionProfile,
    thresholds: &AlertThresholds,
    brand_name: &str,
) -> AlertMessage {
    let count = orders.len();
    let header_cells: String = headers(category)
        .iter()
        .map(|header| format!("<th style=\"{HEADER_STYLE}\">{header}</th>"))
        .collect();
    let rows: String = orders.iter().map(|order| row(category, order)).collect();
    let brand = escape_html(brand_name);
    let region = profile.region.label();
    let title = match category {
        AlertCategory::OverdueUnshipped => "Unshipped Orders Alert",
        AlertCategory::StuckIncomplete => "Incomplete Orders Alert",
        AlertCategory::HasComment => "Customer Comments",
    };
    let admin_url = escape_html(&profile.admin_orders_url());
    let summary = summary_line(category, count, thresholds);

    let html = format!(
        "<div style=\"font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto;\">\
<div style=\"background: #4A4A4A; padding: 20px; text-align: center; color: #fff; font-size: 18px;\">{brand}</div>\
<div style=\"padding: 30px; background: #fff;\">\
<h1 style=\"color: #4A4A4A; margin: 0 0 10px 0; font-size: 24px;\">[{region}] {title}</h1>\
<p style=\"color: #666; margin: 0 0 20px 0;\">{summary}</p>\
<table style=\"width: 100%; border-collapse: collapse; margin-bottom: 20px;\">\
<thead><tr style=\"background: #F5F5F5;\">{header_cells}</tr></thead>\
<tbody>{rows}</tbody>\
</table>\
<a href=\"{admin_url}\" style=\"display: inline-block; background: #E8A33C; color: #fff; padding: 12px 24px; text-decoration: none; border-radius: 4px; font-weight: 500;\">View orders</a>\
</div>\
<div style=\"background: #4A4A4A; padding: 15px; text-align: center; color: #999; font-size: 12px;\">{brand} order monitor</div>\
</div>"
    );

    AlertMessage {
        subject: subject(category, profile, count),
        html,
    }
}
