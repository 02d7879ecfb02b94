use std::fmt::Write;

use crate::models::{DashboardReport, DashboardView, FilterOptions, FilterState};

pub const NO_DATA_WARNING: &str = "No data available for the selected filters.";

const BAR_WIDTH: usize = 40;

/// Whole-percent rendering of a ratio, e.g. `0.3` -> `30%`.
pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Euro amount with thousands separators and two decimals, e.g. `€ 1,234.56`.
pub fn format_currency(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::new();
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("€ {sign}{grouped}.{fraction}")
}

fn describe_selection(noun: &str, selected: usize, available: Option<usize>) -> String {
    match available {
        Some(total) if total == selected => format!("all {noun}s"),
        _ if selected == 1 => format!("1 {noun}"),
        _ => format!("{selected} {noun}s"),
    }
}

pub fn render_options(options: &FilterOptions) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Sellers ({}):", options.sellers.len());
    for seller in &options.sellers {
        let _ = writeln!(output, "- {seller}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Customers ({}):", options.customers.len());
    for customer in &options.customers {
        let _ = writeln!(output, "- {customer}");
    }
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Period: {} to {}",
        options.min_date, options.max_date
    );

    output
}

pub fn render_summary(view: &DashboardView) -> String {
    let report = match view {
        DashboardView::NoData => return format!("{NO_DATA_WARNING}\n"),
        DashboardView::Ready(report) => report,
    };

    let mut output = String::new();
    let kpis = &report.kpis;

    let _ = writeln!(output, "Quote Conversion Dashboard");
    let _ = writeln!(output);
    let _ = writeln!(output, "{:<20}{}", "Quotes", kpis.count);
    let _ = writeln!(output, "{:<20}{}", "Conversion ratio", format_percent(kpis.conversion_ratio));
    let _ = writeln!(output, "{:<20}{}", "Average value", format_currency(kpis.avg_value));
    let _ = writeln!(output, "{:<20}{}", "Avg. probability", format_percent(kpis.avg_probability));

    let _ = writeln!(output);
    let _ = writeln!(output, "Conversion ratio per month");
    for month in &report.monthly {
        let filled = (month.conversion_rate * BAR_WIDTH as f64).round() as usize;
        let _ = writeln!(
            output,
            "{}  {:<width$}  {:>4} ({} quotes)",
            month.month_start.format("%Y-%m"),
            "#".repeat(filled.min(BAR_WIDTH)),
            format_percent(month.conversion_rate),
            month.quote_count,
            width = BAR_WIDTH
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Conversion probability vs. margin %");
    let _ = writeln!(
        output,
        "{:<20}{:<28}{:>10}{:>14}{:>14}",
        "Seller", "Customer", "Margin %", "Probability", "Total"
    );
    for point in &report.scatter {
        let _ = writeln!(
            output,
            "{:<20}{:<28}{:>10.1}{:>14}{:>14}",
            point.seller,
            point.customer,
            point.margin_percent,
            format_percent(point.conversion_probability),
            format_currency(point.total_value)
        );
    }

    output
}

pub fn build_report(
    filter: &FilterState,
    options: Option<&FilterOptions>,
    view: &DashboardView,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Quote Conversion Dashboard");
    let _ = writeln!(
        output,
        "Generated for {} and {} (quotes created {} to {})",
        describe_selection("seller", filter.sellers.len(), options.map(|o| o.sellers.len())),
        describe_selection("customer", filter.customers.len(), options.map(|o| o.customers.len())),
        filter.start,
        filter.end
    );
    let _ = writeln!(output);

    let report = match view {
        DashboardView::NoData => {
            let _ = writeln!(output, "> {NO_DATA_WARNING}");
            return output;
        }
        DashboardView::Ready(report) => report,
    };

    write_kpis(&mut output, report);
    write_monthly(&mut output, report);
    write_scatter(&mut output, report);

    output
}

fn write_kpis(output: &mut String, report: &DashboardReport) {
    let kpis = &report.kpis;
    let _ = writeln!(output, "## Key Figures");
    let _ = writeln!(output, "- Quotes: {}", kpis.count);
    let _ = writeln!(output, "- Conversion ratio: {}", format_percent(kpis.conversion_ratio));
    let _ = writeln!(output, "- Average value: {}", format_currency(kpis.avg_value));
    let _ = writeln!(output, "- Avg. probability (model): {}", format_percent(kpis.avg_probability));
    let _ = writeln!(output);
}

fn write_monthly(output: &mut String, report: &DashboardReport) {
    let _ = writeln!(output, "## Conversion Ratio per Month");
    let _ = writeln!(output, "| Month | Quotes | Conversion ratio |");
    let _ = writeln!(output, "|---|---:|---:|");
    for month in &report.monthly {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            month.month_start.format("%Y-%m"),
            month.quote_count,
            format_percent(month.conversion_rate)
        );
    }
    let _ = writeln!(output);
}

fn write_scatter(output: &mut String, report: &DashboardReport) {
    let _ = writeln!(output, "## Conversion Probability vs. Margin %");
    let _ = writeln!(output, "| Seller | Customer | Total | Margin % | Probability |");
    let _ = writeln!(output, "|---|---|---:|---:|---:|");
    for point in &report.scatter {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1} | {} |",
            point.seller,
            point.customer,
            format_currency(point.total_value),
            point.margin_percent,
            format_percent(point.conversion_probability)
        );
    }
}

pub fn export_json(view: &DashboardView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(view)
}
