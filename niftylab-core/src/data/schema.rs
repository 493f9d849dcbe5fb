//! Canonical column layouts for ingested CSV files and cached Parquet.
//!
//! Dates and times are read as strings and parsed with chrono on the way into
//! domain types, so the CSV reader never has to guess a date format.

use polars::prelude::*;

/// `index,interval,date,time,open,high,low,close`
pub struct PriceSchema;

impl PriceSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("index".into(), DataType::String),
            Field::new("interval".into(), DataType::String),
            Field::new("date".into(), DataType::String),
            Field::new("time".into(), DataType::String),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
        ])
    }

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        validate_against(df, &Self::schema())
    }
}

/// `date,fii_buy,fii_sell,fii_net,dii_buy,dii_sell,dii_net`
pub struct FlowSchema;

impl FlowSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("date".into(), DataType::String),
            Field::new("fii_buy".into(), DataType::Float64),
            Field::new("fii_sell".into(), DataType::Float64),
            Field::new("fii_net".into(), DataType::Float64),
            Field::new("dii_buy".into(), DataType::Float64),
            Field::new("dii_sell".into(), DataType::Float64),
            Field::new("dii_net".into(), DataType::Float64),
        ])
    }

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        validate_against(df, &Self::schema())
    }
}

/// `title,published_at,impact_score`
pub struct NewsSchema;

impl NewsSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("title".into(), DataType::String),
            Field::new("published_at".into(), DataType::String),
            Field::new("impact_score".into(), DataType::Float64),
        ])
    }

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        validate_against(df, &Self::schema())
    }
}

/// Check that every expected column exists with the expected dtype.
fn validate_against(df: &DataFrame, expected: &Schema) -> Result<(), SchemaError> {
    let actual = df.schema();

    for field in expected.iter_fields() {
        if !actual.contains(field.name()) {
            return Err(SchemaError::MissingColumn(field.name().to_string()));
        }
    }

    for field in expected.iter_fields() {
        let actual_dtype = actual
            .get(field.name())
            .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
        if actual_dtype != field.dtype() {
            return Err(SchemaError::TypeMismatch {
                column: field.name().to_string(),
                expected: field.dtype().clone(),
                actual: actual_dtype.clone(),
            });
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
