//! Feature engineering
//!
//! [`FeatureBuilder`] turns records into [`FeatureRow`]s (calendar fields,
//! filled economic fields, per-entity lags and a 7-day moving average).
//! [`FeatureSpace`] fixes the column schema and categorical encoders at
//! training time and encodes rows into a dense matrix.

use crate::error::Result;
use crate::records::DemandRecord;
use chrono::{Datelike, NaiveDateTime};
use demand_math::{lagged, rolling_mean};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::collections::{BTreeMap, HashMap};

/// Category used for rows without a weather condition
pub const MISSING_WEATHER: &str = "none";

const MA_WINDOW: usize = 7;

/// Features derived for one entity at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub sales_date: NaiveDateTime,
    pub store: String,
    pub sku: String,
    pub year: i32,
    pub month: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub quarter: u32,
    pub price: f64,
    pub promotion: bool,
    pub promotion_discount: f64,
    pub seasonality_factor: f64,
    pub weather_condition: Option<String>,
    pub quantity_lag_1: Option<f64>,
    pub quantity_lag_7: Option<f64>,
    pub quantity_lag_30: Option<f64>,
    pub quantity_ma_7: Option<f64>,
    /// Target
    pub quantity_sold: f64,
}

impl FeatureRow {
    fn set_calendar(&mut self, date: NaiveDateTime) {
        self.sales_date = date;
        self.year = date.year();
        self.month = date.month();
        self.day_of_week = date.weekday().num_days_from_monday();
        self.quarter = (date.month() - 1) / 3 + 1;
    }

    fn history(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::QuantityLag1 => self.quantity_lag_1,
            FeatureColumn::QuantityLag7 => self.quantity_lag_7,
            FeatureColumn::QuantityLag30 => self.quantity_lag_30,
            FeatureColumn::QuantityMa7 => self.quantity_ma_7,
            _ => None,
        }
    }
}

/// One column of the feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Year,
    Month,
    DayOfWeek,
    Quarter,
    Price,
    Promotion,
    PromotionDiscount,
    SeasonalityFactor,
    SkuEncoded,
    QuantityLag1,
    QuantityLag7,
    QuantityLag30,
    QuantityMa7,
    WeatherEncoded,
}

impl FeatureColumn {
    /// Columns present in every schema, in matrix order
    pub const BASE: [FeatureColumn; 9] = [
        FeatureColumn::Year,
        FeatureColumn::Month,
        FeatureColumn::DayOfWeek,
        FeatureColumn::Quarter,
        FeatureColumn::Price,
        FeatureColumn::Promotion,
        FeatureColumn::PromotionDiscount,
        FeatureColumn::SeasonalityFactor,
        FeatureColumn::SkuEncoded,
    ];

    /// History columns, kept only when some training row has a value
    pub const HISTORY: [FeatureColumn; 4] = [
        FeatureColumn::QuantityLag1,
        FeatureColumn::QuantityLag7,
        FeatureColumn::QuantityLag30,
        FeatureColumn::QuantityMa7,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureColumn::Year => "year",
            FeatureColumn::Month => "month",
            FeatureColumn::DayOfWeek => "day_of_week",
            FeatureColumn::Quarter => "quarter",
            FeatureColumn::Price => "price",
            FeatureColumn::Promotion => "promotion",
            FeatureColumn::PromotionDiscount => "promotion_discount",
            FeatureColumn::SeasonalityFactor => "seasonality_factor",
            FeatureColumn::SkuEncoded => "sku_encoded",
            FeatureColumn::QuantityLag1 => "quantity_lag_1",
            FeatureColumn::QuantityLag7 => "quantity_lag_7",
            FeatureColumn::QuantityLag30 => "quantity_lag_30",
            FeatureColumn::QuantityMa7 => "quantity_ma_7",
            FeatureColumn::WeatherEncoded => "weather_condition_encoded",
        }
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed string-to-code map; categories are numbered in sorted order and
/// unseen values get the reserved code `len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    codes: BTreeMap<String, usize>,
}

impl CategoryEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut codes: BTreeMap<String, usize> =
            values.into_iter().map(|v| (v.to_string(), 0)).collect();
        for (code, slot) in codes.values_mut().enumerate() {
            *slot = code;
        }
        Self { codes }
    }

    pub fn encode(&self, value: &str) -> usize {
        self.codes.get(value).copied().unwrap_or(self.unknown_code())
    }

    pub fn unknown_code(&self) -> usize {
        self.codes.len()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Builds feature rows from records
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Feature rows for `records`, in the same order.
    ///
    /// Records are expected in chronological order; lags and the moving
    /// average are computed within each (store, SKU) entity.
    pub fn build(records: &[DemandRecord]) -> Result<Vec<FeatureRow>> {
        let fallback_price = Self::median_price(records);

        let mut rows: Vec<FeatureRow> = records
            .iter()
            .map(|record| Self::base_row(record, fallback_price))
            .collect();

        let mut entities: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            entities
                .entry((record.store.as_str(), record.sku.as_str()))
                .or_default()
                .push(i);
        }

        for positions in entities.values() {
            let quantities: Vec<f64> = positions.iter().map(|&i| records[i].sold_qty).collect();
            let lag_1 = lagged(&quantities, 1)?;
            let lag_7 = lagged(&quantities, 7)?;
            let lag_30 = lagged(&quantities, 30)?;
            let ma_7 = rolling_mean(&quantities, MA_WINDOW)?;

            for (k, &i) in positions.iter().enumerate() {
                let row = &mut rows[i];
                row.quantity_lag_1 = lag_1[k];
                row.quantity_lag_7 = lag_7[k];
                row.quantity_lag_30 = lag_30[k];
                row.quantity_ma_7 = ma_7[k];
            }
        }

        Ok(rows)
    }

    /// Copy of `template` moved to `date`; only calendar fields change
    pub fn synthesize(template: &FeatureRow, date: NaiveDateTime) -> FeatureRow {
        let mut row = template.clone();
        row.set_calendar(date);
        row
    }

    fn base_row(record: &DemandRecord, fallback_price: f64) -> FeatureRow {
        let price = record.price.unwrap_or_else(|| {
            if record.sold_qty != 0.0 {
                record.act_sales / record.sold_qty
            } else {
                fallback_price
            }
        });

        let mut row = FeatureRow {
            sales_date: record.sales_date,
            store: record.store.clone(),
            sku: record.sku.clone(),
            year: 0,
            month: 0,
            day_of_week: 0,
            quarter: 0,
            price,
            promotion: record.promotion.unwrap_or(false),
            promotion_discount: record.promotion_discount.unwrap_or(0.0),
            seasonality_factor: record.seasonality_factor.unwrap_or(1.0),
            weather_condition: record.weather_condition.clone(),
            quantity_lag_1: None,
            quantity_lag_7: None,
            quantity_lag_30: None,
            quantity_ma_7: None,
            quantity_sold: record.sold_qty,
        };
        row.set_calendar(record.sales_date);
        row
    }

    /// Median of every price known before the median fill (explicit or derived)
    fn median_price(records: &[DemandRecord]) -> f64 {
        let known: Vec<f64> = records
            .iter()
            .filter_map(|r| match r.price {
                Some(price) => Some(price),
                None if r.sold_qty != 0.0 => Some(r.act_sales / r.sold_qty),
                None => None,
            })
            .filter(|p| p.is_finite())
            .collect();

        if known.is_empty() {
            return 0.0;
        }
        Data::new(known).median()
    }
}

/// Column schema and encoders fixed at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpace {
    columns: Vec<FeatureColumn>,
    sku_encoder: CategoryEncoder,
    weather_encoder: Option<CategoryEncoder>,
}

impl FeatureSpace {
    /// Select the schema and build the encoders from training rows
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let mut columns = FeatureColumn::BASE.to_vec();
        for column in FeatureColumn::HISTORY {
            if rows.iter().any(|row| row.history(column).is_some()) {
                columns.push(column);
            }
        }

        let sku_encoder = CategoryEncoder::fit(rows.iter().map(|row| row.sku.as_str()));

        let weather_encoder = if rows.iter().any(|row| row.weather_condition.is_some()) {
            columns.push(FeatureColumn::WeatherEncoded);
            Some(CategoryEncoder::fit(rows.iter().map(|row| {
                row.weather_condition.as_deref().unwrap_or(MISSING_WEATHER)
            })))
        } else {
            None
        };

        Self {
            columns,
            sku_encoder,
            weather_encoder,
        }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.as_str().to_string()).collect()
    }

    pub fn sku_encoder(&self) -> &CategoryEncoder {
        &self.sku_encoder
    }

    /// Encode rows into a `rows x columns` matrix following the schema
    pub fn encode(&self, rows: &[FeatureRow]) -> Array2<f64> {
        let mut matrix = Array2::zeros((rows.len(), self.columns.len()));
        for (i, row) in rows.iter().enumerate() {
            for (j, column) in self.columns.iter().enumerate() {
                matrix[[i, j]] = self.value(row, *column);
            }
        }
        matrix
    }

    fn value(&self, row: &FeatureRow, column: FeatureColumn) -> f64 {
        match column {
            FeatureColumn::Year => row.year as f64,
            FeatureColumn::Month => row.month as f64,
            FeatureColumn::DayOfWeek => row.day_of_week as f64,
            FeatureColumn::Quarter => row.quarter as f64,
            FeatureColumn::Price => row.price,
            FeatureColumn::Promotion => {
                if row.promotion {
                    1.0
                } else {
                    0.0
                }
            }
            FeatureColumn::PromotionDiscount => row.promotion_discount,
            FeatureColumn::SeasonalityFactor => row.seasonality_factor,
            FeatureColumn::SkuEncoded => self.sku_encoder.encode(&row.sku) as f64,
            FeatureColumn::QuantityLag1
            | FeatureColumn::QuantityLag7
            | FeatureColumn::QuantityLag30
            | FeatureColumn::QuantityMa7 => row.history(column).unwrap_or(0.0),
            FeatureColumn::WeatherEncoded => match &self.weather_encoder {
                Some(encoder) => encoder.encode(
                    row.weather_condition.as_deref().unwrap_or(MISSING_WEATHER),
                ) as f64,
                None => 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(offset)
    }

    fn series(store: &str, sku: &str, n: usize) -> Vec<DemandRecord> {
        (0..n)
            .map(|i| DemandRecord::new(day(i as i64), store, sku, i as f64, i as f64 * 2.0))
            .collect()
    }

    #[test]
    fn test_calendar_fields() {
        // 2024-01-01 is a Monday
        let rows = FeatureBuilder::build(&series("S", "A", 1)).unwrap();
        assert_eq!(rows[0].year, 2024);
        assert_eq!(rows[0].month, 1);
        assert_eq!(rows[0].day_of_week, 0);
        assert_eq!(rows[0].quarter, 1);

        let moved = FeatureBuilder::synthesize(&rows[0], day(97));
        assert_eq!(moved.month, 4);
        assert_eq!(moved.quarter, 2);
        assert_eq!(moved.day_of_week, 6);
        assert_eq!(moved.price, rows[0].price);
    }

    #[test]
    fn test_lags_stay_within_entity() {
        let mut records = Vec::new();
        for i in 0..40 {
            records.push(DemandRecord::new(day(i), "S1", "A", i as f64, 1.0));
            records.push(DemandRecord::new(day(i), "S1", "B", 1000.0 + i as f64, 1.0));
        }

        let rows = FeatureBuilder::build(&records).unwrap();
        let a: Vec<&FeatureRow> = rows.iter().filter(|r| r.sku == "A").collect();

        assert_eq!(a[0].quantity_lag_1, None);
        assert_eq!(a[5].quantity_lag_1, Some(4.0));
        assert_eq!(a[29].quantity_lag_30, None);
        assert_eq!(a[35].quantity_lag_30, Some(5.0));
        assert_eq!(a[5].quantity_ma_7, None);
        assert_eq!(a[6].quantity_ma_7, Some(3.0));
    }

    #[test]
    fn test_price_fill() {
        let mut records = vec![
            DemandRecord::new(day(0), "S", "A", 2.0, 10.0),
            DemandRecord::new(day(1), "S", "A", 0.0, 0.0),
            DemandRecord::new(day(2), "S", "A", 1.0, 1.0),
        ];
        records[2].price = Some(3.0);

        let rows = FeatureBuilder::build(&records).unwrap();
        assert_eq!(rows[0].price, 5.0);
        assert_eq!(rows[1].price, 4.0);
        assert_eq!(rows[2].price, 3.0);
        assert!(!rows[0].promotion);
        assert_eq!(rows[0].seasonality_factor, 1.0);

        let zero = FeatureBuilder::build(&[DemandRecord::new(day(0), "S", "A", 0.0, 0.0)]).unwrap();
        assert_eq!(zero[0].price, 0.0);
    }

    #[test]
    fn test_encoder_unknown_code() {
        let encoder = CategoryEncoder::fit(["b", "a", "c", "a"]);
        assert_eq!(encoder.len(), 3);
        assert_eq!(encoder.encode("a"), 0);
        assert_eq!(encoder.encode("c"), 2);
        assert_eq!(encoder.encode("zzz"), 3);
    }

    #[test]
    fn test_schema_selection() {
        let short = FeatureBuilder::build(&series("S", "A", 3)).unwrap();
        let space = FeatureSpace::fit(&short);
        assert_eq!(
            space.column_names(),
            vec![
                "year",
                "month",
                "day_of_week",
                "quarter",
                "price",
                "promotion",
                "promotion_discount",
                "seasonality_factor",
                "sku_encoded",
                "quantity_lag_1",
            ]
        );

        let mut records = series("S", "A", 10);
        records[4].weather_condition = Some("rain".to_string());
        let rows = FeatureBuilder::build(&records).unwrap();
        let space = FeatureSpace::fit(&rows);
        assert_eq!(space.columns().len(), 13);
        assert_eq!(space.columns().last(), Some(&FeatureColumn::WeatherEncoded));

        let matrix = space.encode(&rows);
        assert_eq!(matrix.dim(), (10, 13));
        // "none" < "rain"
        assert_eq!(matrix[[0, 12]], 0.0);
        assert_eq!(matrix[[4, 12]], 1.0);
        // missing lag encodes as zero
        assert_eq!(matrix[[0, 9]], 0.0);
    }
}
