use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod dataset;
mod error;
mod models;
mod pipeline;
mod report;

use dataset::{Dataset, DatasetHandle};
use error::DashboardError;
use models::FilterState;

#[derive(Parser)]
#[command(name = "quote-dashboard")]
#[command(about = "Quote conversion dashboard over predicted sales outcomes", long_about = None)]
struct Cli {
    /// Quote dataset (CSV)
    #[arg(long, global = true, env = "QUOTE_DASHBOARD_DATA", default_value = "dashboard_data.csv")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sellers, customers and period available for filtering
    Options,
    /// Print KPI tiles and charts for the selected quotes
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Export the dashboard view as JSON for a charting front end
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "dashboard.json")]
        out: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Seller to include (repeatable, defaults to all)
    #[arg(long = "seller", conflicts_with = "no_sellers")]
    sellers: Vec<String>,
    /// Customer to include (repeatable, defaults to all)
    #[arg(long = "customer", conflicts_with = "no_customers")]
    customers: Vec<String>,
    /// First creation date to include (defaults to the earliest quote)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last creation date to include (defaults to the latest quote)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Select no sellers at all
    #[arg(long)]
    no_sellers: bool,
    /// Select no customers at all
    #[arg(long)]
    no_customers: bool,
}

impl FilterArgs {
    fn resolve(self, dataset: &Dataset) -> Result<FilterState, DashboardError> {
        let options = dataset.filter_options();

        let sellers = select(self.sellers, self.no_sellers, &options.sellers, "seller")?;
        let customers = select(self.customers, self.no_customers, &options.customers, "customer")?;

        let start = self.from.unwrap_or(options.min_date);
        let end = self.to.unwrap_or(options.max_date);
        for date in [start, end] {
            if date < options.min_date || date > options.max_date {
                return Err(DashboardError::DateOutOfBounds {
                    date,
                    min: options.min_date,
                    max: options.max_date,
                });
            }
        }
        if start > end {
            return Err(DashboardError::InvalidRange { start, end });
        }

        Ok(FilterState {
            sellers,
            customers,
            start,
            end,
        })
    }
}

/// Selected values must be among the choices the dataset offers.
fn select(
    requested: Vec<String>,
    none: bool,
    available: &[String],
    field: &'static str,
) -> Result<BTreeSet<String>, DashboardError> {
    if none {
        return Ok(BTreeSet::new());
    }
    if requested.is_empty() {
        return Ok(available.iter().cloned().collect());
    }
    if let Some(unknown) = requested.iter().find(|value| !available.contains(*value)) {
        return Err(DashboardError::UnknownSelection {
            field,
            value: unknown.clone(),
        });
    }
    Ok(requested.into_iter().collect())
}

fn main() -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let handle = DatasetHandle::new(cli.data);
    let dataset = handle
        .get()
        .with_context(|| format!("failed to load quote dataset from {}", handle.path().display()))?;

    match cli.command {
        Commands::Options => {
            print!("{}", report::render_options(&dataset.filter_options()));
        }
        Commands::Summary { filters } => {
            let filter = filters.resolve(dataset)?;
            let view = pipeline::build_view(dataset, &filter);
            print!("{}", report::render_summary(&view));
        }
        Commands::Report { filters, out } => {
            let filter = filters.resolve(dataset)?;
            let view = pipeline::build_view(dataset, &filter);
            let options = dataset.filter_options();
            let markdown = report::build_report(&filter, Some(&options), &view);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            info!(out = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
        Commands::Export { filters, out } => {
            let filter = filters.resolve(dataset)?;
            let view = pipeline::build_view(dataset, &filter);
            let json = report::export_json(&view).context("failed to serialize dashboard view")?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write export to {}", out.display()))?;
            println!("Dashboard view exported to {}.", out.display());
        }
    }

    Ok(())
}
