//! Read-only store and promotion summaries over the loaded records

use crate::records::{DemandRecord, RecordStore};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

const DASHBOARD_WINDOW_DAYS: i64 = 30;
const TOP_SKU_LIMIT: usize = 10;

/// Catalogue entry of one SKU in a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkuSummary {
    pub sku: String,
    pub desc: String,
    pub div: String,
    pub div_desc: String,
    pub dept: String,
    pub dept_desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSku {
    pub sku: String,
    pub total_qty: f64,
}

/// Recent activity of one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDashboard {
    pub store_id: String,
    pub total_skus: usize,
    pub total_sales_30d: f64,
    pub total_qty_30d: f64,
    /// Mean of the per-day sales totals over the window
    pub avg_daily_sales: f64,
    pub promotion_days: usize,
    /// Highest total quantity first, over the whole history
    pub top_selling_skus: Vec<TopSku>,
    pub departments: BTreeMap<String, usize>,
    pub divisions: BTreeMap<String, usize>,
}

/// One promoted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub date: NaiveDateTime,
    pub store: String,
    pub sku: String,
    pub desc: String,
    pub discount: f64,
    pub sales_impact: f64,
    pub qty_impact: f64,
}

/// Distinct stores in first-seen order
pub fn stores(records: &RecordStore) -> Vec<String> {
    let mut seen = BTreeSet::new();
    records
        .records()
        .iter()
        .filter(|r| seen.insert(r.store.as_str()))
        .map(|r| r.store.clone())
        .collect()
}

/// Distinct catalogue rows of a store
pub fn store_skus(records: &RecordStore, store: &str) -> Vec<SkuSummary> {
    let mut seen = HashSet::new();
    let mut skus = Vec::new();
    for record in records.records().iter().filter(|r| r.store == store) {
        let summary = SkuSummary {
            sku: record.sku.clone(),
            desc: record.desc.clone(),
            div: record.div.clone(),
            div_desc: record.div_desc.clone(),
            dept: record.dept.clone(),
            dept_desc: record.dept_desc.clone(),
        };
        if seen.insert(summary.clone()) {
            skus.push(summary);
        }
    }
    skus
}

/// Dashboard for `store`, with the 30-day window ending at `today`;
/// `None` when the store has no records
pub fn store_dashboard(records: &RecordStore, store: &str, today: NaiveDate) -> Option<StoreDashboard> {
    let store_records: Vec<&DemandRecord> =
        records.records().iter().filter(|r| r.store == store).collect();
    if store_records.is_empty() {
        return None;
    }

    let window_start = today - Duration::days(DASHBOARD_WINDOW_DAYS);
    let recent: Vec<&DemandRecord> = store_records
        .iter()
        .copied()
        .filter(|r| r.sales_date.date() >= window_start)
        .collect();

    let mut daily_sales: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in &recent {
        *daily_sales.entry(record.sales_date.date()).or_default() += record.act_sales;
    }
    let avg_daily_sales = if daily_sales.is_empty() {
        0.0
    } else {
        daily_sales.values().sum::<f64>() / daily_sales.len() as f64
    };

    let mut qty_by_sku: HashMap<&str, f64> = HashMap::new();
    let mut departments = BTreeMap::new();
    let mut divisions = BTreeMap::new();
    for record in &store_records {
        *qty_by_sku.entry(record.sku.as_str()).or_default() += record.sold_qty;
        *departments.entry(record.dept.clone()).or_default() += 1;
        *divisions.entry(record.div.clone()).or_default() += 1;
    }

    let total_skus = qty_by_sku.len();
    let mut top_selling_skus: Vec<TopSku> = qty_by_sku
        .into_iter()
        .map(|(sku, total_qty)| TopSku {
            sku: sku.to_string(),
            total_qty,
        })
        .collect();
    top_selling_skus.sort_by(|a, b| {
        b.total_qty
            .total_cmp(&a.total_qty)
            .then_with(|| a.sku.cmp(&b.sku))
    });
    top_selling_skus.truncate(TOP_SKU_LIMIT);

    Some(StoreDashboard {
        store_id: store.to_string(),
        total_skus,
        total_sales_30d: recent.iter().map(|r| r.act_sales).sum(),
        total_qty_30d: recent.iter().map(|r| r.sold_qty).sum(),
        avg_daily_sales,
        promotion_days: recent.iter().filter(|r| r.is_promotion()).count(),
        top_selling_skus,
        departments,
        divisions,
    })
}

/// Every promoted record, in chronological order
pub fn promotions(records: &RecordStore) -> Vec<PromotionEvent> {
    records
        .records()
        .iter()
        .filter(|r| r.is_promotion())
        .map(|r| PromotionEvent {
            date: r.sales_date,
            store: r.store.clone(),
            sku: r.sku.clone(),
            desc: r.desc.clone(),
            discount: r.promotion_discount.unwrap_or(0.0),
            sales_impact: r.act_sales,
            qty_impact: r.sold_qty,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn loaded() -> RecordStore {
        let mut records = vec![
            DemandRecord::new(at(1, 5), "S2", "A", 1.0, 10.0),
            DemandRecord::new(at(3, 1), "S1", "A", 5.0, 50.0),
            DemandRecord::new(at(3, 1), "S1", "B", 7.0, 20.0),
            DemandRecord::new(at(3, 2), "S1", "A", 3.0, 30.0),
            DemandRecord::new(at(1, 2), "S1", "C", 100.0, 100.0),
        ];
        for record in &mut records {
            record.dept = "D1".to_string();
            record.div = "V1".to_string();
        }
        records[2].dept = "D2".to_string();
        records[3].promotion = Some(true);
        records[3].promotion_discount = Some(0.15);

        let mut store = RecordStore::new();
        assert!(store.load(records));
        store
    }

    #[test]
    fn test_stores_first_seen() {
        // sorted by date: S1 (Jan 2) comes before S2 (Jan 5)
        assert_eq!(stores(&loaded()), vec!["S1".to_string(), "S2".to_string()]);
    }

    #[test]
    fn test_store_skus_distinct() {
        let skus = store_skus(&loaded(), "S1");
        let names: Vec<&str> = skus.iter().map(|s| s.sku.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert!(store_skus(&loaded(), "S9").is_empty());
    }

    #[test]
    fn test_dashboard() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let dashboard = store_dashboard(&loaded(), "S1", today).unwrap();

        assert_eq!(dashboard.total_skus, 3);
        assert_eq!(dashboard.total_sales_30d, 100.0);
        assert_eq!(dashboard.total_qty_30d, 15.0);
        // Mar 1: 70, Mar 2: 30
        assert_eq!(dashboard.avg_daily_sales, 50.0);
        assert_eq!(dashboard.promotion_days, 1);
        assert_eq!(dashboard.top_selling_skus[0].sku, "C");
        assert_eq!(dashboard.top_selling_skus[1].total_qty, 8.0);
        assert_eq!(dashboard.departments.get("D1"), Some(&3));
        assert_eq!(dashboard.divisions.get("V1"), Some(&4));

        assert!(store_dashboard(&loaded(), "S9", today).is_none());
    }

    #[test]
    fn test_promotions() {
        let events = promotions(&loaded());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sku, "A");
        assert_eq!(events[0].discount, 0.15);
        assert_eq!(events[0].date, at(3, 2));
    }
}
