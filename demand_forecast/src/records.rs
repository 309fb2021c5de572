//! Record store: canonical demand records and their summary statistics
//!
//! Two upload shapes are accepted. The retail shape carries store, SKU and
//! merchandising metadata; the legacy shape is a flat product/date/demand
//! triple. Both are normalized into [`DemandRecord`], which exposes the
//! legacy names (`date`, `product_id`, `demand_value`) as read views.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Store assigned to legacy records that do not name one
pub const DEFAULT_STORE: &str = "STORE_001";
/// Division assigned to legacy records that do not name one
pub const DEFAULT_DIVISION: &str = "DIV_001";
/// Department assigned to legacy records that do not name one
pub const DEFAULT_DEPARTMENT: &str = "DEPT_001";
/// Unit price assumed for legacy records without sales or price
pub const DEFAULT_LEGACY_PRICE: f64 = 10.0;

/// One observed sales period for a store and SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    /// Sales timestamp; calendar fields use this clock as stored
    pub sales_date: NaiveDateTime,
    pub store: String,
    pub sku: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub div: String,
    #[serde(default)]
    pub div_desc: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub dept_desc: String,
    /// Quantity sold (demand target)
    pub sold_qty: f64,
    /// Actual sales amount
    pub act_sales: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub promotion: Option<bool>,
    #[serde(default)]
    pub promotion_discount: Option<f64>,
    #[serde(default)]
    pub weather_condition: Option<String>,
    #[serde(default)]
    pub seasonality_factor: Option<f64>,
}

impl DemandRecord {
    /// Create a record with the required fields; everything optional is left empty
    pub fn new(
        sales_date: NaiveDateTime,
        store: impl Into<String>,
        sku: impl Into<String>,
        sold_qty: f64,
        act_sales: f64,
    ) -> Self {
        Self {
            sales_date,
            store: store.into(),
            sku: sku.into(),
            desc: String::new(),
            div: String::new(),
            div_desc: String::new(),
            dept: String::new(),
            dept_desc: String::new(),
            sold_qty,
            act_sales,
            price: None,
            promotion: None,
            promotion_discount: None,
            weather_condition: None,
            seasonality_factor: None,
        }
    }

    /// Legacy name for `sales_date`
    pub fn date(&self) -> NaiveDateTime {
        self.sales_date
    }

    /// Legacy name for `sku`
    pub fn product_id(&self) -> &str {
        &self.sku
    }

    /// Legacy name for `sold_qty`
    pub fn demand_value(&self) -> f64 {
        self.sold_qty
    }

    /// Explicit price, or sales divided by quantity (at least one unit)
    pub fn unit_price(&self) -> f64 {
        self.price
            .unwrap_or_else(|| self.act_sales / self.sold_qty.max(1.0))
    }

    /// Whether the record is marked as a promotion day
    pub fn is_promotion(&self) -> bool {
        self.promotion.unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        if self.sku.trim().is_empty() {
            return Err(ForecastError::ValidationError(format!(
                "Record at {} has an empty SKU",
                self.sales_date
            )));
        }

        let checks = [
            ("sold_qty", Some(self.sold_qty)),
            ("act_sales", Some(self.act_sales)),
            ("price", self.price),
        ];
        for (field, value) in checks {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ForecastError::ValidationError(format!(
                        "{} must be a non-negative number, got {} (sku {})",
                        field, value, self.sku
                    )));
                }
            }
        }

        for (field, value) in [
            ("promotion_discount", self.promotion_discount),
            ("seasonality_factor", self.seasonality_factor),
        ] {
            if value.map_or(false, |v| !v.is_finite()) {
                return Err(ForecastError::ValidationError(format!(
                    "{} must be finite (sku {})",
                    field, self.sku
                )));
            }
        }

        Ok(())
    }
}

/// Numeric input that may arrive as a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl NumberInput {
    fn parse(&self, field: &str) -> Result<f64> {
        match self {
            NumberInput::Number(value) => Ok(*value),
            NumberInput::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                ForecastError::ValidationError(format!(
                    "Field '{}' is not a number: '{}'",
                    field, text
                ))
            }),
        }
    }
}

impl From<f64> for NumberInput {
    fn from(value: f64) -> Self {
        NumberInput::Number(value)
    }
}

fn parse_optional(value: &Option<NumberInput>, field: &str) -> Result<Option<f64>> {
    value.as_ref().map(|v| v.parse(field)).transpose()
}

/// Retail upload shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetailInput {
    pub sales_date: String,
    pub store: String,
    pub sku: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub div: String,
    #[serde(default)]
    pub div_desc: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub dept_desc: String,
    pub sold_qty: NumberInput,
    pub act_sales: NumberInput,
    pub price: Option<NumberInput>,
    pub promotion: Option<bool>,
    pub promotion_discount: Option<NumberInput>,
    pub weather_condition: Option<String>,
    pub seasonality_factor: Option<NumberInput>,
}

/// Legacy upload shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyInput {
    pub date: String,
    pub product_id: String,
    pub demand_value: NumberInput,
    pub store: Option<String>,
    pub desc: Option<String>,
    pub div: Option<String>,
    pub div_desc: Option<String>,
    pub dept: Option<String>,
    pub dept_desc: Option<String>,
    pub act_sales: Option<NumberInput>,
    pub price: Option<NumberInput>,
    pub promotion: Option<bool>,
    pub promotion_discount: Option<NumberInput>,
    pub weather_condition: Option<String>,
    pub seasonality_factor: Option<NumberInput>,
}

/// Either upload shape; retail is tried first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRecord {
    Retail(RetailInput),
    Legacy(LegacyInput),
}

impl RawRecord {
    /// Convert into the canonical record, parsing timestamps and numbers
    pub fn into_record(self) -> Result<DemandRecord> {
        match self {
            RawRecord::Retail(input) => Ok(DemandRecord {
                sales_date: parse_timestamp(&input.sales_date)?,
                store: input.store,
                sku: input.sku,
                desc: input.desc,
                div: input.div,
                div_desc: input.div_desc,
                dept: input.dept,
                dept_desc: input.dept_desc,
                sold_qty: input.sold_qty.parse("sold_qty")?,
                act_sales: input.act_sales.parse("act_sales")?,
                price: parse_optional(&input.price, "price")?,
                promotion: input.promotion,
                promotion_discount: parse_optional(&input.promotion_discount, "promotion_discount")?,
                weather_condition: input.weather_condition,
                seasonality_factor: parse_optional(&input.seasonality_factor, "seasonality_factor")?,
            }),
            RawRecord::Legacy(input) => {
                let demand = input.demand_value.parse("demand_value")?;
                let price = parse_optional(&input.price, "price")?;
                let act_sales = match parse_optional(&input.act_sales, "act_sales")? {
                    Some(sales) => sales,
                    None => demand * price.unwrap_or(DEFAULT_LEGACY_PRICE),
                };

                Ok(DemandRecord {
                    sales_date: parse_timestamp(&input.date)?,
                    store: input.store.unwrap_or_else(|| DEFAULT_STORE.to_string()),
                    sku: input.product_id,
                    desc: input.desc.unwrap_or_default(),
                    div: input.div.unwrap_or_else(|| DEFAULT_DIVISION.to_string()),
                    div_desc: input.div_desc.unwrap_or_default(),
                    dept: input.dept.unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string()),
                    dept_desc: input.dept_desc.unwrap_or_default(),
                    sold_qty: demand,
                    act_sales,
                    price,
                    promotion: input.promotion,
                    promotion_discount: parse_optional(&input.promotion_discount, "promotion_discount")?,
                    weather_condition: input.weather_condition,
                    seasonality_factor: parse_optional(&input.seasonality_factor, "seasonality_factor")?,
                })
            }
        }
    }
}

/// Parse an ISO-8601 timestamp or date.
///
/// Offsets (including a trailing `Z`) are accepted and the local clock of
/// the given offset is kept.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ForecastError::ValidationError(format!("Invalid timestamp: '{}'", value)))
}

/// Inclusive timestamp bounds of the loaded data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Sales aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesStats {
    pub total_sales: f64,
    pub avg_sales_per_day: f64,
    pub total_qty_sold: f64,
    pub avg_qty_per_day: f64,
}

/// Distribution of the demand target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Promotion aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionStats {
    pub total_promotion_days: usize,
    pub promotion_rate: f64,
    pub avg_promotion_discount: f64,
}

/// Summary of the loaded records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStatistics {
    pub total_records: usize,
    pub unique_stores: usize,
    pub unique_skus: usize,
    pub unique_products: usize,
    pub unique_divisions: usize,
    pub unique_departments: usize,
    pub date_range: Option<DateRange>,
    pub sales_stats: SalesStats,
    pub demand_stats: DemandStats,
    pub promotion_stats: PromotionStats,
}

/// Canonical record set, sorted by `sales_date`
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<DemandRecord>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded records. Returns `false` if any record is invalid,
    /// in which case the previous contents are kept.
    pub fn load(&mut self, records: Vec<DemandRecord>) -> bool {
        match self.try_load(records) {
            Ok(count) => {
                info!(records = count, "Loaded demand records");
                true
            }
            Err(e) => {
                warn!(error = %e, "Rejected demand records");
                false
            }
        }
    }

    /// Convert upload-shaped records, then [`load`](Self::load) them
    pub fn load_raw(&mut self, inputs: Vec<RawRecord>) -> bool {
        let converted: Result<Vec<DemandRecord>> =
            inputs.into_iter().map(RawRecord::into_record).collect();

        match converted {
            Ok(records) => self.load(records),
            Err(e) => {
                warn!(error = %e, "Failed to convert uploaded records");
                false
            }
        }
    }

    /// Replace the loaded records, reporting why a batch was rejected
    pub fn try_load(&mut self, mut records: Vec<DemandRecord>) -> Result<usize> {
        for record in &records {
            record.validate()?;
        }

        records.sort_by_key(|r| r.sales_date);
        self.records = records;
        Ok(self.records.len())
    }

    /// All records in chronological order
    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    /// Records of one SKU, optionally restricted to one store
    pub fn records_for(&self, sku: &str, store: Option<&str>) -> Vec<&DemandRecord> {
        self.records
            .iter()
            .filter(|r| r.sku == sku && store.map_or(true, |s| r.store == s))
            .collect()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of loaded records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Tabular view of the records.
    ///
    /// `sales_date` is stored as epoch milliseconds; missing promotion and
    /// discount values are filled with `false` and `0.0`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let r = &self.records;
        let millis: Vec<i64> = r
            .iter()
            .map(|rec| Utc.from_utc_datetime(&rec.sales_date).timestamp_millis())
            .collect();

        let df = DataFrame::new(vec![
            Series::new("sales_date", millis),
            Series::new("store", r.iter().map(|x| x.store.as_str()).collect::<Vec<_>>()),
            Series::new("sku", r.iter().map(|x| x.sku.as_str()).collect::<Vec<_>>()),
            Series::new("desc", r.iter().map(|x| x.desc.as_str()).collect::<Vec<_>>()),
            Series::new("div", r.iter().map(|x| x.div.as_str()).collect::<Vec<_>>()),
            Series::new("dept", r.iter().map(|x| x.dept.as_str()).collect::<Vec<_>>()),
            Series::new("sold_qty", r.iter().map(|x| x.sold_qty).collect::<Vec<_>>()),
            Series::new("act_sales", r.iter().map(|x| x.act_sales).collect::<Vec<_>>()),
            Series::new("price", r.iter().map(|x| x.price).collect::<Vec<_>>()),
            Series::new("promotion", r.iter().map(|x| x.is_promotion()).collect::<Vec<_>>()),
            Series::new(
                "promotion_discount",
                r.iter()
                    .map(|x| x.promotion_discount.unwrap_or(0.0))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "weather_condition",
                r.iter()
                    .map(|x| x.weather_condition.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "seasonality_factor",
                r.iter().map(|x| x.seasonality_factor).collect::<Vec<_>>(),
            ),
        ])?;

        Ok(df)
    }

    /// Summary statistics; the empty summary when nothing is loaded
    pub fn statistics(&self) -> DataStatistics {
        if self.records.is_empty() {
            return DataStatistics::default();
        }

        match self.compute_statistics() {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to compute data statistics");
                DataStatistics::default()
            }
        }
    }

    fn compute_statistics(&self) -> Result<DataStatistics> {
        let df = self.to_dataframe()?;

        let qty = df.column("sold_qty")?.f64()?;
        let sales = df.column("act_sales")?.f64()?;
        let discount = df.column("promotion_discount")?.f64()?;
        let promotion_days = df
            .column("promotion")?
            .bool()?
            .into_iter()
            .filter(|flag| *flag == Some(true))
            .count();

        let unique_skus = df.column("sku")?.n_unique()?;
        let total = self.records.len();

        let date_range = match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.sales_date,
                end: last.sales_date,
            }),
            _ => None,
        };

        let stats = DataStatistics {
            total_records: total,
            unique_stores: df.column("store")?.n_unique()?,
            unique_skus,
            unique_products: unique_skus,
            unique_divisions: df.column("div")?.n_unique()?,
            unique_departments: df.column("dept")?.n_unique()?,
            date_range,
            sales_stats: SalesStats {
                total_sales: sales.sum().unwrap_or(0.0),
                avg_sales_per_day: sales.mean().unwrap_or(0.0),
                total_qty_sold: qty.sum().unwrap_or(0.0),
                avg_qty_per_day: qty.mean().unwrap_or(0.0),
            },
            demand_stats: DemandStats {
                mean: qty.mean().unwrap_or(0.0),
                median: qty.median().unwrap_or(0.0),
                std: qty.std(1).filter(|v| v.is_finite()).unwrap_or(0.0),
                min: qty.min().unwrap_or(0.0),
                max: qty.max().unwrap_or(0.0),
            },
            promotion_stats: PromotionStats {
                total_promotion_days: promotion_days,
                promotion_rate: promotion_days as f64 / total as f64,
                avg_promotion_discount: discount.mean().unwrap_or(0.0),
            },
        };

        debug!(
            records = stats.total_records,
            skus = stats.unique_skus,
            "Computed data statistics"
        );
        Ok(stats)
    }
}
