//! CSV ingest for prices, institutional flows and news.
//!
//! Files are scanned lazily with polars against the canonical schemas in
//! [`super::schema`], collected, then converted row by row into domain types.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::provider::DataError;
use super::schema::{FlowSchema, NewsSchema, PriceSchema};
use crate::domain::{fill_points, FlowRecord, Interval, NewsItem, PriceBar};
use crate::intraday::recompute_points;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%b-%Y", "%d-%m-%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// Full timestamp, or a bare date at midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// CSV ingestor for the three tabular inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataIngestor;

impl DataIngestor {
    pub fn new() -> Self {
        Self
    }

    fn scan(path: &Path, schema: Schema) -> Result<LazyFrame, DataError> {
        LazyCsvReader::new(path)
            .with_schema(Some(Arc::new(schema)))
            .with_has_header(true)
            .finish()
            .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))
    }

    fn collect(path: &Path, frame: LazyFrame) -> Result<DataFrame, DataError> {
        frame
            .collect()
            .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))
    }

    pub fn scan_prices(&self, path: &Path) -> Result<LazyFrame, DataError> {
        Self::scan(path, PriceSchema::schema())
    }

    pub fn scan_flows(&self, path: &Path) -> Result<LazyFrame, DataError> {
        Self::scan(path, FlowSchema::schema())
    }

    pub fn scan_news(&self, path: &Path) -> Result<LazyFrame, DataError> {
        Self::scan(path, NewsSchema::schema())
    }

    /// Price bars with `points` filled in: daily series close-to-close,
    /// intraday series reset at the first slot of every date.
    ///
    /// Rows with an unparseable date or interval are skipped with a warning.
    pub fn load_prices(&self, path: &Path) -> Result<Vec<PriceBar>, DataError> {
        let df = Self::collect(path, self.scan_prices(path)?)?;
        PriceSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

        let col_err = |e: PolarsError| DataError::Csv(format!("column read: {e}"));
        let index = df.column("index").and_then(|c| c.str()).map_err(col_err)?;
        let interval = df.column("interval").and_then(|c| c.str()).map_err(col_err)?;
        let date = df.column("date").and_then(|c| c.str()).map_err(col_err)?;
        let time = df.column("time").and_then(|c| c.str()).map_err(col_err)?;
        let open = df.column("open").and_then(|c| c.f64()).map_err(col_err)?;
        let high = df.column("high").and_then(|c| c.f64()).map_err(col_err)?;
        let low = df.column("low").and_then(|c| c.f64()).map_err(col_err)?;
        let close = df.column("close").and_then(|c| c.f64()).map_err(col_err)?;

        let mut bars = Vec::with_capacity(df.height());
        let mut skipped = 0usize;
        for i in 0..df.height() {
            let Some(idx) = index.get(i).map(str::trim).filter(|s| !s.is_empty()) else {
                skipped += 1;
                continue;
            };
            let Ok(iv) = interval.get(i).unwrap_or("").parse::<Interval>() else {
                skipped += 1;
                continue;
            };
            let Some(day) = date.get(i).and_then(parse_date) else {
                skipped += 1;
                continue;
            };
            let slot = if iv.is_intraday() {
                time.get(i).and_then(parse_time)
            } else {
                None
            };
            bars.push(PriceBar {
                index: idx.to_string(),
                interval: iv,
                date: day,
                time: slot,
                open: open.get(i).unwrap_or(f64::NAN),
                high: high.get(i).unwrap_or(f64::NAN),
                low: low.get(i).unwrap_or(f64::NAN),
                close: close.get(i).unwrap_or(f64::NAN),
                points: 0.0,
            });
        }
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "price rows skipped");
        }

        finish_points(&mut bars);
        debug!(path = %path.display(), bars = bars.len(), "prices ingested");
        Ok(bars)
    }

    /// Flow records sorted by date. Empty buy/sell cells read as 0; a row
    /// with a missing net value or bad date is skipped.
    pub fn load_flows(&self, path: &Path) -> Result<Vec<FlowRecord>, DataError> {
        let df = Self::collect(path, self.scan_flows(path)?)?;
        FlowSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

        let col_err = |e: PolarsError| DataError::Csv(format!("column read: {e}"));
        let date = df.column("date").and_then(|c| c.str()).map_err(col_err)?;
        let num = |name: &str| df.column(name).and_then(|c| c.f64()).map_err(col_err);
        let (fii_buy, fii_sell, fii_net) = (num("fii_buy")?, num("fii_sell")?, num("fii_net")?);
        let (dii_buy, dii_sell, dii_net) = (num("dii_buy")?, num("dii_sell")?, num("dii_net")?);

        let mut flows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(day), Some(f_net), Some(d_net)) = (
                date.get(i).and_then(parse_date),
                fii_net.get(i),
                dii_net.get(i),
            ) else {
                warn!(path = %path.display(), row = i, "flow row skipped");
                continue;
            };
            flows.push(FlowRecord {
                date: day,
                fii_buy: fii_buy.get(i).unwrap_or(0.0),
                fii_sell: fii_sell.get(i).unwrap_or(0.0),
                fii_net: f_net,
                dii_buy: dii_buy.get(i).unwrap_or(0.0),
                dii_sell: dii_sell.get(i).unwrap_or(0.0),
                dii_net: d_net,
            });
        }
        flows.sort_by_key(|f| f.date);
        debug!(path = %path.display(), flows = flows.len(), "flows ingested");
        Ok(flows)
    }

    /// News items; a missing impact score reads as 0 (neutral).
    pub fn load_news(&self, path: &Path) -> Result<Vec<NewsItem>, DataError> {
        let df = Self::collect(path, self.scan_news(path)?)?;
        NewsSchema::validate(&df).map_err(|e| DataError::ValidationError(e.to_string()))?;

        let col_err = |e: PolarsError| DataError::Csv(format!("column read: {e}"));
        let title = df.column("title").and_then(|c| c.str()).map_err(col_err)?;
        let published = df.column("published_at").and_then(|c| c.str()).map_err(col_err)?;
        let impact = df.column("impact_score").and_then(|c| c.f64()).map_err(col_err)?;

        let mut news = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(at) = published.get(i).and_then(parse_datetime) else {
                warn!(path = %path.display(), row = i, "news row skipped");
                continue;
            };
            news.push(NewsItem {
                title: title.get(i).unwrap_or("").trim().to_string(),
                published_at: at,
                impact_score: impact.get(i).unwrap_or(0.0).clamp(-1.0, 1.0),
            });
        }
        debug!(path = %path.display(), news = news.len(), "news ingested");
        Ok(news)
    }
}

/// Sort bars by series and fill `points`.
pub fn finish_points(bars: &mut Vec<PriceBar>) {
    let (mut daily, mut intraday): (Vec<PriceBar>, Vec<PriceBar>) =
        bars.drain(..).partition(PriceBar::is_daily);

    daily.sort_by(|a, b| (&a.index, a.date).cmp(&(&b.index, b.date)));
    let mut start = 0;
    while start < daily.len() {
        let end = daily[start..]
            .iter()
            .position(|b| b.index != daily[start].index)
            .map_or(daily.len(), |p| start + p);
        fill_points(&mut daily[start..end]);
        start = end;
    }

    recompute_points(&mut intraday);
    bars.extend(daily);
    bars.extend(intraday);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn date_formats() {
        let want = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_date("2024-03-01"), Some(want));
        assert_eq!(parse_date("01-Mar-2024"), Some(want));
        assert_eq!(parse_date(" 01-03-2024 "), Some(want));
        assert_eq!(parse_date("March 1"), None);
        assert_eq!(parse_time("09:15").unwrap().format("%H:%M").to_string(), "09:15");
        assert_eq!(
            parse_datetime("2024-03-01").unwrap(),
            want.and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn loads_prices_and_fills_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "prices.csv",
            "index,interval,date,time,open,high,low,close\n\
             NIFTY,1d,2024-03-04,,22300,22400,22250,22350\n\
             NIFTY,1d,2024-03-01,,22100,22380,22080,22300\n\
             NIFTY,5m,2024-03-04,09:20,22360,22370,22340,22365\n\
             NIFTY,5m,2024-03-04,09:15,22300,22360,22300,22350\n\
             NIFTY,7m,2024-03-04,09:15,1,1,1,1\n",
        );
        let bars = DataIngestor::new().load_prices(&path).unwrap();
        assert_eq!(bars.len(), 4);

        let daily: Vec<&PriceBar> = bars.iter().filter(|b| b.is_daily()).collect();
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(daily[1].points, 50.0);
        assert!(daily[1].time.is_none());

        let slots: Vec<&PriceBar> = bars.iter().filter(|b| !b.is_daily()).collect();
        assert_eq!(slots[0].points, 0.0);
        assert_eq!(slots[1].points, 15.0);
    }

    #[test]
    fn loads_flows_sorted_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "flows.csv",
            "date,fii_buy,fii_sell,fii_net,dii_buy,dii_sell,dii_net\n\
             2024-03-04,,,-1200.5,,,900\n\
             2024-03-01,12000,10500,1500,9000,9400,-400\n\
             bad,1,1,1,1,1,1\n",
        );
        let flows = DataIngestor::new().load_flows(&path).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].fii_buy, 12_000.0);
        assert_eq!(flows[1].fii_buy, 0.0);
        assert_eq!(flows[1].total_net(), -300.5);
    }

    #[test]
    fn loads_news_and_clamps_impact() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "news.csv",
            "title,published_at,impact_score\n\
             RBI holds rates,2024-03-01 10:30:00,0.7\n\
             Crude spikes,2024-03-02,4\n",
        );
        let news = DataIngestor::new().load_news(&path).unwrap();
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].title, "RBI holds rates");
        assert_eq!(news[1].impact_score, 1.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(DataIngestor::new().load_flows(&missing).is_err());
    }
}
