use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use demand_forecast::records::{DateRange, DEFAULT_STORE};
use demand_forecast::{DemandRecord, RawRecord, RecordStore};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 12, 25)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset)
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(64)]
fn test_statistics_count_and_range(#[case] n: i64) {
    // Shuffled insertion order must not matter
    let records: Vec<DemandRecord> = (0..n)
        .rev()
        .map(|i| DemandRecord::new(day(i), "S1", format!("SKU{}", i % 3), i as f64, i as f64 * 4.0))
        .collect();

    let mut store = RecordStore::new();
    assert!(store.load(records));

    let stats = store.statistics();
    assert_eq!(stats.total_records, n as usize);
    assert_eq!(
        stats.date_range,
        Some(DateRange {
            start: day(0),
            end: day(n - 1)
        })
    );
    assert_eq!(stats.unique_skus, (n as usize).min(3));
    assert_eq!(stats.unique_products, stats.unique_skus);
    assert_relative_eq!(
        stats.sales_stats.total_sales,
        4.0 * (0..n).sum::<i64>() as f64
    );
}

#[test]
fn test_mixed_upload_shapes() {
    let raw: Vec<RawRecord> = serde_json::from_value(json!([
        {
            "sales_date": "2024-01-02 08:30:00",
            "store": "S7",
            "sku": "K1",
            "desc": "Sparkling water",
            "div": "BEV",
            "dept": "WATER",
            "sold_qty": 12,
            "act_sales": "30.0",
            "promotion": true,
            "promotion_discount": 0.1
        },
        {
            "date": "2024-01-01",
            "product_id": "P9",
            "demand_value": "3",
            "price": 2.0
        }
    ]))
    .unwrap();

    let mut store = RecordStore::new();
    assert!(store.load_raw(raw));

    let records = store.records();
    assert_eq!(records[0].product_id(), "P9");
    assert_eq!(records[0].store, DEFAULT_STORE);
    assert_eq!(records[0].act_sales, 6.0);
    assert_eq!(records[1].desc, "Sparkling water");
    assert_eq!(records[1].date().format("%H:%M").to_string(), "08:30");

    let stats = store.statistics();
    assert_eq!(stats.unique_stores, 2);
    assert_eq!(stats.unique_divisions, 2);
    assert_eq!(stats.promotion_stats.total_promotion_days, 1);
    assert_relative_eq!(stats.promotion_stats.promotion_rate, 0.5);
}

#[test]
fn test_dataframe_view() {
    let mut record = DemandRecord::new(day(0), "S1", "A", 2.0, 8.0);
    record.weather_condition = Some("rain".to_string());

    let mut store = RecordStore::new();
    assert!(store.load(vec![record, DemandRecord::new(day(1), "S1", "B", 1.0, 3.0)]));

    let df = store.to_dataframe().unwrap();
    assert_eq!(df.height(), 2);
    assert_eq!(df.column("weather_condition").unwrap().null_count(), 1);
    assert_eq!(df.column("price").unwrap().null_count(), 2);
}

#[test]
fn test_record_round_trips_through_json() {
    let mut record = DemandRecord::new(day(3), "S1", "A", 2.0, 8.0);
    record.seasonality_factor = Some(1.25);

    let text = serde_json::to_string(&record).unwrap();
    assert!(text.contains("\"sales_date\":\"2023-12-28T00:00:00\""));

    let back: DemandRecord = serde_json::from_str(&text).unwrap();
    assert_eq!(back, record);
}
