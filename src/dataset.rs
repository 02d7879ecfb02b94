use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::models::{FilterOptions, FilterState, Prediction, QuoteRecord};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
// Ambiguous numeric dates are read month first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m-%d-%Y", "%m/%d/%Y"];

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Verkoper")]
    seller: String,
    #[serde(rename = "klant")]
    customer: String,
    #[serde(rename = "Aanmaakdatum")]
    created_at: String,
    #[serde(rename = "Totaal")]
    total_value: f64,
    #[serde(rename = "marge_%")]
    margin_percent: f64,
    #[serde(rename = "voorspelling")]
    prediction: Prediction,
    #[serde(rename = "zekerheid_conversie")]
    conversion_probability: f64,
}

/// The full, read-only quote record set.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<QuoteRecord>,
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| DashboardError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = index as u64 + 1;
            let raw = result.map_err(|source| DashboardError::Csv { row, source })?;
            let created_at = parse_creation_date(&raw.created_at).ok_or_else(|| {
                DashboardError::InvalidDate {
                    row,
                    value: raw.created_at.clone(),
                }
            })?;

            records.push(QuoteRecord {
                seller: raw.seller,
                customer: raw.customer,
                created_at,
                total_value: raw.total_value,
                margin_percent: raw.margin_percent,
                prediction: raw.prediction,
                conversion_probability: raw.conversion_probability,
            });
        }

        Self::new(records)
    }

    pub fn new(records: Vec<QuoteRecord>) -> Result<Self> {
        let dates = records.iter().map(|record| record.created_at.date());
        let min_date = dates.clone().min().ok_or(DashboardError::EmptyDataset)?;
        let max_date = dates.max().ok_or(DashboardError::EmptyDataset)?;

        Ok(Self {
            records,
            min_date,
            max_date,
        })
    }

    pub fn records(&self) -> &[QuoteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Choices offered by the seller, customer and date controls.
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            sellers: distinct_non_blank(self.records.iter().map(|r| r.seller.as_str())),
            customers: distinct_non_blank(self.records.iter().map(|r| r.customer.as_str())),
            min_date: self.min_date,
            max_date: self.max_date,
        }
    }

    /// Everything selected over the full date range.
    pub fn default_filter(&self) -> FilterState {
        let options = self.filter_options();
        FilterState {
            sellers: options.sellers.into_iter().collect::<BTreeSet<_>>(),
            customers: options.customers.into_iter().collect::<BTreeSet<_>>(),
            start: options.min_date,
            end: options.max_date,
        }
    }
}

/// Lazily loaded handle to the process-wide dataset. The file is read on the
/// first call to [`DatasetHandle::get`] and never again.
pub struct DatasetHandle {
    path: PathBuf,
    cell: OnceCell<Dataset>,
}

impl DatasetHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<&Dataset> {
        self.cell.get_or_try_init(|| {
            let dataset = Dataset::from_path(&self.path)?;
            info!(
                path = %self.path.display(),
                records = dataset.len(),
                "loaded quote dataset"
            );
            Ok(dataset)
        })
    }
}

pub fn parse_creation_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    debug!(value, "creation date did not match any known format");
    None
}

fn distinct_non_blank<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| !value.trim().is_empty())
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}
