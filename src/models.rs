use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Label the model assigns to quotes it expects to be won.
pub const CONVERTED_LABEL: &str = "Conversie";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Prediction {
    Converted,
    Other(String),
}

impl Prediction {
    pub fn is_converted(&self) -> bool {
        matches!(self, Prediction::Converted)
    }
}

impl From<String> for Prediction {
    fn from(label: String) -> Self {
        if label.trim() == CONVERTED_LABEL {
            Prediction::Converted
        } else {
            Prediction::Other(label)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub seller: String,
    pub customer: String,
    pub created_at: NaiveDateTime,
    pub total_value: f64,
    pub margin_percent: f64,
    pub prediction: Prediction,
    pub conversion_probability: f64,
}

/// Active selections of the three filter controls. Both date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub sellers: BTreeSet<String>,
    pub customers: BTreeSet<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub sellers: Vec<String>,
    pub customers: Vec<String>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub count: usize,
    pub conversion_ratio: f64,
    pub avg_value: f64,
    pub avg_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyConversion {
    pub month_start: NaiveDate,
    pub quote_count: usize,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub seller: String,
    pub customer: String,
    pub total_value: f64,
    pub margin_percent: f64,
    pub conversion_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub kpis: Kpis,
    pub monthly: Vec<MonthlyConversion>,
    pub scatter: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardView {
    NoData,
    Ready(DashboardReport),
}
