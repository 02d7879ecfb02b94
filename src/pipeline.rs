use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::models::{
    DashboardReport, DashboardView, FilterState, Kpis, MonthlyConversion, QuoteRecord,
    ScatterPoint,
};

pub fn apply_filters<'a>(
    records: &'a [QuoteRecord],
    filter: &FilterState,
) -> Vec<&'a QuoteRecord> {
    records
        .iter()
        .filter(|record| filter.sellers.contains(&record.seller))
        .filter(|record| filter.customers.contains(&record.customer))
        .filter(|record| {
            let day = record.created_at.date();
            filter.start <= day && day <= filter.end
        })
        .collect()
}

/// Returns `None` for an empty selection so callers never divide by zero.
pub fn compute_kpis(records: &[&QuoteRecord]) -> Option<Kpis> {
    if records.is_empty() {
        return None;
    }

    let count = records.len();
    let converted = records.iter().filter(|r| r.prediction.is_converted()).count();
    let total_value: f64 = records.iter().map(|r| r.total_value).sum();
    let total_probability: f64 = records.iter().map(|r| r.conversion_probability).sum();

    Some(Kpis {
        count,
        conversion_ratio: converted as f64 / count as f64,
        avg_value: total_value / count as f64,
        avg_probability: total_probability / count as f64,
    })
}

/// Conversion rate per calendar month, oldest first. Months without quotes are left out.
pub fn monthly_conversion_series(records: &[&QuoteRecord]) -> Vec<MonthlyConversion> {
    let mut buckets: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();

    for record in records {
        let key = (record.created_at.year(), record.created_at.month());
        let entry = buckets.entry(key).or_insert((0, 0));
        entry.0 += 1;
        if record.prediction.is_converted() {
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .filter_map(|((year, month), (count, converted))| {
            let month_start = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(MonthlyConversion {
                month_start,
                quote_count: count,
                conversion_rate: converted as f64 / count as f64,
            })
        })
        .collect()
}

pub fn scatter_points(records: &[&QuoteRecord]) -> Vec<ScatterPoint> {
    records
        .iter()
        .map(|record| ScatterPoint {
            seller: record.seller.clone(),
            customer: record.customer.clone(),
            total_value: record.total_value,
            margin_percent: record.margin_percent,
            conversion_probability: record.conversion_probability,
        })
        .collect()
}

pub fn build_view(dataset: &Dataset, filter: &FilterState) -> DashboardView {
    let filtered = apply_filters(dataset.records(), filter);
    debug!(
        total = dataset.len(),
        retained = filtered.len(),
        sellers = filter.sellers.len(),
        customers = filter.customers.len(),
        start = %filter.start,
        end = %filter.end,
        "applied filters"
    );

    let Some(kpis) = compute_kpis(&filtered) else {
        warn!("no quotes match the selected filters");
        return DashboardView::NoData;
    };

    DashboardView::Ready(DashboardReport {
        kpis,
        monthly: monthly_conversion_series(&filtered),
        scatter: scatter_points(&filtered),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prediction;
    use std::collections::BTreeSet;

    fn quote(seller: &str, customer: &str, date: (i32, u32, u32), converted: bool) -> QuoteRecord {
        QuoteRecord {
            seller: seller.to_string(),
            customer: customer.to_string(),
            created_at: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            total_value: 1000.0,
            margin_percent: 20.0,
            prediction: if converted {
                Prediction::Converted
            } else {
                Prediction::Other("Geen conversie".to_string())
            },
            conversion_probability: if converted { 0.8 } else { 0.2 },
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_dataset() -> Dataset {
        Dataset::new(vec![
            quote("A", "Acme", (2024, 1, 5), true),
            quote("B", "Acme", (2024, 1, 20), false),
            quote("A", "Globex", (2024, 2, 1), false),
            quote("B", "Globex", (2024, 2, 29), true),
            quote("A", "Acme", (2024, 4, 30), true),
            quote("B", "Initech", (2024, 4, 1), false),
        ])
        .unwrap()
    }

    #[test]
    fn selecting_one_seller_keeps_only_their_quotes() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.sellers = set(&["A"]);

        let filtered = apply_filters(dataset.records(), &filter);
        assert!(filtered.iter().all(|r| r.seller == "A"));

        let expected = dataset.records().iter().filter(|r| r.seller == "A").count();
        let kpis = compute_kpis(&filtered).unwrap();
        assert_eq!(kpis.count, expected);
    }

    #[test]
    fn every_retained_record_satisfies_all_predicates() {
        let dataset = sample_dataset();
        let filter = FilterState {
            sellers: set(&["A", "B"]),
            customers: set(&["Acme", "Globex"]),
            start: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        };

        let filtered = apply_filters(dataset.records(), &filter);
        assert_eq!(filtered.len(), 3);
        for record in &filtered {
            assert!(filter.sellers.contains(&record.seller));
            assert!(filter.customers.contains(&record.customer));
            assert!(record.created_at.date() >= filter.start);
            assert!(record.created_at.date() <= filter.end);
        }
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        filter.end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let filtered = apply_filters(dataset.records(), &filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].customer, "Acme");
    }

    #[test]
    fn filtering_preserves_original_order() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.sellers = set(&["B"]);

        let dates: Vec<_> = apply_filters(dataset.records(), &filter)
            .iter()
            .map(|r| r.created_at.date())
            .collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn empty_seller_selection_yields_no_data() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.sellers.clear();

        assert!(apply_filters(dataset.records(), &filter).is_empty());
        assert_eq!(build_view(&dataset, &filter), DashboardView::NoData);
    }

    #[test]
    fn empty_customer_selection_yields_no_data() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.customers.clear();

        assert!(apply_filters(dataset.records(), &filter).is_empty());
        assert_eq!(build_view(&dataset, &filter), DashboardView::NoData);
    }

    #[test]
    fn kpis_are_none_for_empty_input() {
        assert!(compute_kpis(&[]).is_none());
    }

    #[test]
    fn three_of_ten_converted_in_one_month() {
        let records: Vec<QuoteRecord> = (0..10)
            .map(|i| quote("A", "Acme", (2024, 6, 1 + i), i < 3))
            .collect();
        let refs: Vec<&QuoteRecord> = records.iter().collect();

        let kpis = compute_kpis(&refs).unwrap();
        assert!((kpis.conversion_ratio - 0.3).abs() < 1e-12);

        let monthly = monthly_conversion_series(&refs);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].month_start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(monthly[0].quote_count, 10);
        assert!((monthly[0].conversion_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn kpi_averages_use_filtered_records() {
        let mut records = vec![
            quote("A", "Acme", (2024, 1, 1), true),
            quote("A", "Acme", (2024, 1, 2), false),
        ];
        records[0].total_value = 500.0;
        records[1].total_value = 1500.0;
        let refs: Vec<&QuoteRecord> = records.iter().collect();

        let kpis = compute_kpis(&refs).unwrap();
        assert_eq!(kpis.count, 2);
        assert!((kpis.avg_value - 1000.0).abs() < 1e-9);
        assert!((kpis.avg_probability - 0.5).abs() < 1e-9);
        assert!((kpis.conversion_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn conversion_ratio_bounds() {
        let none: Vec<QuoteRecord> = (1..=4).map(|d| quote("A", "Acme", (2024, 1, d), false)).collect();
        let all: Vec<QuoteRecord> = (1..=4).map(|d| quote("A", "Acme", (2024, 1, d), true)).collect();

        let none_refs: Vec<&QuoteRecord> = none.iter().collect();
        let all_refs: Vec<&QuoteRecord> = all.iter().collect();
        assert_eq!(compute_kpis(&none_refs).unwrap().conversion_ratio, 0.0);
        assert_eq!(compute_kpis(&all_refs).unwrap().conversion_ratio, 1.0);
    }

    #[test]
    fn monthly_series_is_ordered_and_skips_empty_months() {
        let dataset = sample_dataset();
        let filtered = apply_filters(dataset.records(), &dataset.default_filter());
        let monthly = monthly_conversion_series(&filtered);

        let months: Vec<NaiveDate> = monthly.iter().map(|m| m.month_start).collect();
        assert_eq!(
            months,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            ]
        );
        assert!(months.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn month_boundaries_follow_calendar_month_of_creation_date() {
        let records = vec![
            quote("A", "Acme", (2024, 1, 31), true),
            quote("A", "Acme", (2024, 2, 1), false),
        ];
        let refs: Vec<&QuoteRecord> = records.iter().collect();
        let monthly = monthly_conversion_series(&refs);

        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].conversion_rate, 1.0);
        assert_eq!(monthly[1].conversion_rate, 0.0);
    }

    #[test]
    fn monthly_series_agrees_with_overall_ratio() {
        let dataset = sample_dataset();
        let filtered = apply_filters(dataset.records(), &dataset.default_filter());
        let kpis = compute_kpis(&filtered).unwrap();
        let monthly = monthly_conversion_series(&filtered);

        let monthly_converted: f64 = monthly
            .iter()
            .map(|m| m.quote_count as f64 * m.conversion_rate)
            .sum();
        let overall_converted = kpis.count as f64 * kpis.conversion_ratio;
        assert!((monthly_converted - overall_converted).abs() < 1e-9);
        assert_eq!(monthly.iter().map(|m| m.quote_count).sum::<usize>(), kpis.count);
    }

    #[test]
    fn scatter_projects_every_filtered_record() {
        let dataset = sample_dataset();
        let mut filter = dataset.default_filter();
        filter.customers = set(&["Globex"]);

        let filtered = apply_filters(dataset.records(), &filter);
        let points = scatter_points(&filtered);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].seller, "A");
        assert_eq!(points[1].seller, "B");
        assert_eq!(points[1].conversion_probability, 0.8);
        assert_eq!(points[0].margin_percent, 20.0);
    }

    #[test]
    fn build_view_is_idempotent() {
        let dataset = sample_dataset();
        let filter = dataset.default_filter();
        let first = build_view(&dataset, &filter);
        let second = build_view(&dataset, &filter);

        assert_eq!(first, second);
        match first {
            DashboardView::Ready(report) => {
                assert_eq!(report.kpis.count, 6);
                assert_eq!(report.scatter.len(), 6);
            }
            DashboardView::NoData => panic!("expected data for the default filter"),
        }
    }
}
