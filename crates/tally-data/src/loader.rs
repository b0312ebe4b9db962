//! CSV ingestion for the sales panel.
//!
//! Reads the three source tables (regional features, department sales, store
//! metadata), merges them with polars and materialises typed [`PanelRow`]s.
//! Absent regressor values (`NA`) are filled with zero; markdown data only
//! exists from late 2011 onwards, so gaps before that are expected.

use crate::error::{DataError, Result};
use crate::panel::{MARKDOWN_COUNT, Panel, PanelRow, StoreType};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Markdown columns in the features table.
const MARKDOWN_COLUMNS: [&str; MARKDOWN_COUNT] =
    ["MarkDown1", "MarkDown2", "MarkDown3", "MarkDown4", "MarkDown5"];

/// Regressor columns whose nulls are replaced with zero after the merge.
const ZERO_FILLED_COLUMNS: [&str; 4] = ["Temperature", "Fuel_Price", "CPI", "Unemployment"];

/// Date formats accepted in the `Date` column.
const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

/// Locations of the three source tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSources {
    /// Regional features: Store, Date, Temperature, Fuel_Price, MarkDown1-5, CPI, Unemployment, IsHoliday
    pub features: PathBuf,
    /// Department sales: Store, Dept, Date, Weekly_Sales, IsHoliday
    pub sales: PathBuf,
    /// Store metadata: Store, Type, Size
    pub stores: PathBuf,
}

impl PanelSources {
    /// Resolve the canonical file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            features: dir.join("Features data set.csv"),
            sales: dir.join("sales data-set.csv"),
            stores: dir.join("stores data-set.csv"),
        }
    }
}

/// Load and merge the source tables into a [`Panel`].
///
/// # Errors
/// Returns an error if a file cannot be read, a required column is missing,
/// a date or store type cannot be parsed, or the merged rows violate the
/// panel's uniqueness invariant.
pub fn load_panel(sources: &PanelSources) -> Result<Panel> {
    let features = read_table(&sources.features)?;
    let sales = read_table(&sources.sales)?;
    let stores = read_table(&sources.stores)?;

    tracing::debug!(
        features = features.height(),
        sales = sales.height(),
        stores = stores.height(),
        "source tables read"
    );

    let merged = merge_tables(sales, features, stores)?;
    let rows = rows_from_frame(&merged)?;

    tracing::info!(rows = rows.len(), "panel loaded");

    Panel::from_rows(rows)
}

/// Read one CSV table, treating `NA` as null.
fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(DataError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_null_values(Some(NullValues::AllColumnsSingle("NA".into()))),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(frame)
}

/// Join sales with features on (Store, Date, IsHoliday) and with stores on Store.
///
/// Sales weeks whose holiday flag disagrees with the features table have no
/// partner and fall out of the inner join. Both flag columns are compared as
/// text so a Boolean-inferred column still matches a String one.
fn merge_tables(sales: DataFrame, features: DataFrame, stores: DataFrame) -> Result<DataFrame> {
    let zero_fill: Vec<Expr> = MARKDOWN_COLUMNS
        .iter()
        .chain(ZERO_FILLED_COLUMNS.iter())
        .map(|name| col(*name).cast(DataType::Float64).fill_null(lit(0.0)))
        .collect();

    let merged = sales
        .lazy()
        .with_column(holiday_key())
        .join(
            features.lazy().with_column(holiday_key()),
            [col("Store"), col("Date"), col("IsHoliday")],
            [col("Store"), col("Date"), col("IsHoliday")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            stores.lazy(),
            [col("Store")],
            [col("Store")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_columns(zero_fill)
        .collect()?;

    Ok(merged)
}

fn holiday_key() -> Expr {
    col("IsHoliday").cast(DataType::String)
}

/// Materialise typed rows from the merged frame.
fn rows_from_frame(df: &DataFrame) -> Result<Vec<PanelRow>> {
    let stores = int_column(df, "Store")?;
    let departments = int_column(df, "Dept")?;
    let dates = string_column(df, "Date")?;
    let sales = float_column(df, "Weekly_Sales")?;
    let holidays = string_column(df, "IsHoliday")?;
    let temperatures = float_column(df, "Temperature")?;
    let fuel_prices = float_column(df, "Fuel_Price")?;
    let cpis = float_column(df, "CPI")?;
    let unemployment = float_column(df, "Unemployment")?;
    let types = string_column(df, "Type")?;
    let sizes = int_column(df, "Size")?;
    let markdowns = MARKDOWN_COLUMNS
        .iter()
        .map(|name| float_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let week_text = required(dates[i].as_deref(), "Date", i)?;
        let holiday_text = required(holidays[i].as_deref(), "IsHoliday", i)?;
        let type_text = required(types[i].as_deref(), "Type", i)?;

        let mut row_markdowns = [0.0; MARKDOWN_COUNT];
        for (slot, column) in row_markdowns.iter_mut().zip(&markdowns) {
            *slot = column[i].unwrap_or(0.0);
        }

        rows.push(PanelRow {
            store: to_u32(required(stores[i], "Store", i)?, "Store")?,
            department: to_u32(required(departments[i], "Dept", i)?, "Dept")?,
            week: parse_week(week_text)?,
            weekly_sales: required(sales[i], "Weekly_Sales", i)?,
            is_holiday: parse_flag(holiday_text)?,
            temperature: temperatures[i].unwrap_or(0.0),
            fuel_price: fuel_prices[i].unwrap_or(0.0),
            markdowns: row_markdowns,
            cpi: cpis[i].unwrap_or(0.0),
            unemployment: unemployment[i].unwrap_or(0.0),
            store_type: type_text.parse::<StoreType>()?,
            store_size: to_u32(required(sizes[i], "Size", i)?, "Size")?,
        });
    }

    Ok(rows)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.as_materialized_series().f64()?.into_iter().collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.as_materialized_series().i64()?.into_iter().collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| DataError::MissingValue {
        column: column.to_string(),
        row,
    })
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| DataError::OutOfRange {
        column: column.to_string(),
        value,
    })
}

/// Parse a week date in any of the accepted formats.
pub(crate) fn parse_week(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| DataError::InvalidDate(text.to_string()))
}

/// Parse a boolean cell written as TRUE/FALSE, true/false or 1/0.
pub(crate) fn parse_flag(text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(DataError::Parse(format!("invalid holiday flag '{other}'"))),
    }
}
