//! CSV export of synthetic series
//!
//! Dates are written as `YYYY-MM-DD`. Missing volume/amount values are
//! written as empty cells.

use crate::{Result, SkinBar};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Column set of an exported file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    /// `timestamps,open,high,low,close,volume,amount`
    Full,
    /// `timestamps,open,high,low,close`
    Ohlc,
}

impl CsvLayout {
    fn header(self) -> &'static [&'static str] {
        match self {
            CsvLayout::Full => &[
                "timestamps",
                "open",
                "high",
                "low",
                "close",
                "volume",
                "amount",
            ],
            CsvLayout::Ohlc => &["timestamps", "open", "high", "low", "close"],
        }
    }
}

/// Shortest round-trip text, keeping a `.0` on whole numbers so readers
/// infer a float column
fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn bar_record(bar: &SkinBar, layout: CsvLayout) -> Vec<String> {
    let mut record = vec![
        bar.timestamp.format("%Y-%m-%d").to_string(),
        format_value(bar.open),
        format_value(bar.high),
        format_value(bar.low),
        format_value(bar.close),
    ];
    if layout == CsvLayout::Full {
        record.push(bar.volume.map(format_value).unwrap_or_default());
        record.push(bar.amount.map(format_value).unwrap_or_default());
    }
    record
}

/// Write one series to any writer
pub fn write_series<W: Write>(writer: W, bars: &[SkinBar], layout: CsvLayout) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(layout.header())?;
    for bar in bars {
        wtr.write_record(bar_record(bar, layout))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a long table of many series
///
/// The full layout puts `skin_id` after the value columns; the OHLC layout
/// leads with it.
pub fn write_universe<W: Write>(
    writer: W,
    universe: &[(String, Vec<SkinBar>)],
    layout: CsvLayout,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header: Vec<&str> = layout.header().to_vec();
    match layout {
        CsvLayout::Full => header.push("skin_id"),
        CsvLayout::Ohlc => header.insert(0, "skin_id"),
    }
    wtr.write_record(&header)?;

    for (id, bars) in universe {
        for bar in bars {
            let mut record = bar_record(bar, layout);
            match layout {
                CsvLayout::Full => record.push(id.clone()),
                CsvLayout::Ohlc => record.insert(0, id.clone()),
            }
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn create<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Write one series to a CSV file, creating parent directories
pub fn write_series_csv<P: AsRef<Path>>(path: P, bars: &[SkinBar], layout: CsvLayout) -> Result<()> {
    write_series(create(path)?, bars, layout)
}

/// Write a universe to a CSV file, creating parent directories
pub fn write_universe_csv<P: AsRef<Path>>(
    path: P,
    universe: &[(String, Vec<SkinBar>)],
    layout: CsvLayout,
) -> Result<()> {
    write_universe(create(path)?, universe, layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars() -> Vec<SkinBar> {
        let day = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        vec![
            SkinBar::flat(day, 10.0).with_volume(5.0),
            SkinBar::flat(day.succ_opt().unwrap(), 10.5),
        ]
    }

    #[test]
    fn full_layout_leaves_missing_activity_empty() {
        let mut out = Vec::new();
        write_series(&mut out, &bars(), CsvLayout::Full).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "timestamps,open,high,low,close,volume,amount\n\
             2021-01-01,10.0,10.0,10.0,10.0,5.0,50.0\n\
             2021-01-02,10.5,10.5,10.5,10.5,,\n"
        );
    }

    #[test]
    fn ohlc_universe_leads_with_id() {
        let universe = vec![("skin_000".to_string(), bars())];
        let mut out = Vec::new();
        write_universe(&mut out, &universe, CsvLayout::Ohlc).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("skin_id,timestamps,open,high,low,close"));
        assert_eq!(lines.next(), Some("skin_000,2021-01-01,10.0,10.0,10.0,10.0"));
    }
}
