//! Workbook output.
//!
//! The workbook has three sheets: `Data` (one row per artifact), `Summary`
//! (aggregate values and grouping tables) and `Charts` (charts drawn from the
//! Summary tables). It is serialized in memory and written to disk in one go.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use rust_xlsxwriter::{Chart, ChartType, Format, Workbook, Worksheet};
use tracing::{info, warn};

use crate::error::{Result, StatsError};
use crate::record::ArtifactRecord;
use crate::stats::{bytes_to_gb, SummaryStats};

pub const DATA_SHEET: &str = "Data";
pub const SUMMARY_SHEET: &str = "Summary";
pub const CHARTS_SHEET: &str = "Charts";

/// Column headers of the Data sheet, in output order.
pub const DATA_COLUMNS: [&str; 7] = [
    "Name",
    "Repository",
    "Size (bytes)",
    "Created",
    "Modified",
    "Downloads",
    "User",
];

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Chart anchor rows on the Charts sheet, all in column B.
const CHART_ROWS: [u32; 3] = [1, 20, 39];

/// Data rows of one grouping table on the Summary sheet, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub first: u32,
    pub last: u32,
}

/// Where each grouping table landed; `None` when the grouping is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SummaryLayout {
    pub years: Option<Span>,
    pub months: Option<Span>,
    pub users: Option<Span>,
}

/// Writes the normalized records and their summary as an xlsx workbook.
pub struct ReportWriter<'a> {
    records: &'a [ArtifactRecord],
    summary: &'a SummaryStats,
}

impl<'a> ReportWriter<'a> {
    pub fn new(records: &'a [ArtifactRecord], summary: &'a SummaryStats) -> Self {
        Self { records, summary }
    }

    /// Builds the complete workbook in memory.
    pub fn build(&self) -> Result<Workbook> {
        let mut workbook = Workbook::new();

        workbook.push_worksheet(self.data_sheet()?);
        let (summary, layout) = self.summary_sheet()?;
        workbook.push_worksheet(summary);
        workbook.push_worksheet(self.charts_sheet(&layout)?);

        Ok(workbook)
    }

    /// Serializes the workbook to xlsx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut workbook = self.build()?;
        Ok(workbook.save_to_buffer()?)
    }

    /// Writes the workbook to a new file at `path`.
    ///
    /// Never touches an existing file: if `path` exists the call fails. If
    /// writing fails midway the partial file is removed.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StatsError::Write(format!(
                    "refusing to overwrite existing file '{}'",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(e.into());
        }

        info!(path = %path.display(), bytes = bytes.len(), "Report written");
        Ok(())
    }

    fn data_sheet(&self) -> Result<Worksheet> {
        let header = Format::new().set_bold();
        let datetime = Format::new().set_num_format(DATETIME_FORMAT);

        let mut sheet = Worksheet::new();
        sheet.set_name(DATA_SHEET)?;

        for (col, title) in DATA_COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (i, record) in self.records.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, &record.name)?;
            sheet.write_string(row, 1, &record.repository)?;
            sheet.write_number(row, 2, record.size as f64)?;
            if let Some(created) = &record.created {
                sheet.write_datetime_with_format(row, 3, created, &datetime)?;
            }
            if let Some(modified) = &record.modified {
                sheet.write_datetime_with_format(row, 4, modified, &datetime)?;
            }
            sheet.write_number(row, 5, record.downloads as f64)?;
            sheet.write_string(row, 6, &record.user)?;
        }

        sheet.set_freeze_panes(1, 0)?;
        sheet.set_column_width(0, 40)?;
        sheet.set_column_width(1, 24)?;
        sheet.set_column_width(2, 14)?;
        sheet.set_column_width(3, 20)?;
        sheet.set_column_width(4, 20)?;
        sheet.set_column_width(6, 20)?;

        Ok(sheet)
    }

    pub(crate) fn summary_sheet(&self) -> Result<(Worksheet, SummaryLayout)> {
        let header = Format::new().set_bold();
        let gb = Format::new().set_num_format("0.00");
        let stats = self.summary;

        let mut sheet = Worksheet::new();
        sheet.set_name(SUMMARY_SHEET)?;
        sheet.set_column_width(0, 32)?;
        sheet.set_column_width(1, 14)?;
        sheet.set_column_width(2, 12)?;

        sheet.write_string_with_format(0, 0, "Metric", &header)?;
        sheet.write_string_with_format(0, 1, "Value", &header)?;
        let values: [(&str, f64, Option<&Format>); 5] = [
            ("Total Artifacts", stats.total_count as f64, None),
            ("Total Size (bytes)", stats.total_size as f64, None),
            ("Total Size (GB)", bytes_to_gb(stats.total_size), Some(&gb)),
            ("Zero Downloads", stats.zero_downloads as f64, None),
            ("Excluded From Time Groupings", stats.excluded_from_time as f64, None),
        ];
        for (i, (label, value, format)) in values.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *label)?;
            match format {
                Some(format) => sheet.write_number_with_format(row, 1, *value, format)?,
                None => sheet.write_number(row, 1, *value)?,
            };
        }

        // Tables follow the value block, one blank row apart.
        let mut row = values.len() as u32 + 2;

        sheet.write_string_with_format(row, 0, "Download Range", &header)?;
        sheet.write_string_with_format(row, 1, "Count", &header)?;
        for (label, count) in stats.download_range_counts() {
            row += 1;
            sheet.write_string(row, 0, label)?;
            sheet.write_number(row, 1, count as f64)?;
        }
        row += 2;

        sheet.write_string_with_format(row, 0, "Year", &header)?;
        sheet.write_string_with_format(row, 1, "Uploads", &header)?;
        sheet.write_string_with_format(row, 2, "Size (GB)", &header)?;
        let years_header = row;
        for (year, count) in &stats.by_year {
            row += 1;
            let size = stats.size_by_year.get(year).copied().unwrap_or(0);
            sheet.write_number(row, 0, *year)?;
            sheet.write_number(row, 1, *count as f64)?;
            sheet.write_number_with_format(row, 2, bytes_to_gb(size), &gb)?;
        }
        let years = span_after(years_header, row);
        row += 2;

        sheet.write_string_with_format(row, 0, "Month", &header)?;
        sheet.write_string_with_format(row, 1, "Uploads", &header)?;
        let months_header = row;
        for (month, count) in &stats.by_month {
            row += 1;
            sheet.write_string(row, 0, month.to_string())?;
            sheet.write_number(row, 1, *count as f64)?;
        }
        let months = span_after(months_header, row);
        row += 2;

        sheet.write_string_with_format(row, 0, "User", &header)?;
        sheet.write_string_with_format(row, 1, "Uploads", &header)?;
        let users_header = row;
        for (user, count) in &stats.by_user {
            row += 1;
            sheet.write_string(row, 0, user)?;
            sheet.write_number(row, 1, *count as f64)?;
        }
        let users = span_after(users_header, row);

        Ok((
            sheet,
            SummaryLayout {
                years,
                months,
                users,
            },
        ))
    }

    fn charts_sheet(&self, layout: &SummaryLayout) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(CHARTS_SHEET)?;

        let charts = [
            (layout.years, ChartType::Column, "Yearly Uploads", "Year"),
            (layout.users, ChartType::Column, "Uploads by User", "User"),
            (layout.months, ChartType::Line, "Monthly Uploads", "Month"),
        ];

        let mut drawn = 0;
        for ((span, kind, title, axis), anchor) in charts.into_iter().zip(CHART_ROWS) {
            let Some(span) = span else {
                warn!(chart = title, "No data for chart, skipping");
                continue;
            };

            let mut chart = Chart::new(kind);
            chart
                .add_series()
                .set_categories((SUMMARY_SHEET, span.first, 0, span.last, 0))
                .set_values((SUMMARY_SHEET, span.first, 1, span.last, 1));
            chart.title().set_name(title);
            chart.x_axis().set_name(axis);
            chart.y_axis().set_name("Uploads");
            chart.legend().set_hidden();
            chart.set_width(720).set_height(340);

            sheet.insert_chart(anchor, 1, &chart)?;
            drawn += 1;
        }

        if drawn == 0 {
            sheet.write_string(0, 0, "No artifacts to chart")?;
        }

        Ok(sheet)
    }
}

/// Span of the rows written below `header`, if any were.
fn span_after(header: u32, last: u32) -> Option<Span> {
    (last > header).then_some(Span {
        first: header + 1,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(user: &str, created: Option<(i32, u32, u32)>) -> ArtifactRecord {
        ArtifactRecord {
            name: "a.jar".to_string(),
            repository: "libs".to_string(),
            size: 1024,
            created: created.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(8, 30, 0)),
            modified: None,
            downloads: 2,
            user: user.to_string(),
        }
    }

    #[test]
    fn test_summary_layout_positions() {
        let records = vec![
            record("alice", Some((2023, 1, 1))),
            record("bob", Some((2023, 2, 1))),
            record("alice", Some((2024, 1, 1))),
        ];
        let stats = SummaryStats::from_records(&records);
        let writer = ReportWriter::new(&records, &stats);

        let (_, layout) = writer.summary_sheet().unwrap();

        // 1 header + 5 values + blank, then 1 header + 6 buckets + blank
        assert_eq!(layout.years, Some(Span { first: 16, last: 17 }));
        assert_eq!(layout.months, Some(Span { first: 20, last: 22 }));
        assert_eq!(layout.users, Some(Span { first: 25, last: 26 }));
    }

    #[test]
    fn test_empty_groupings_have_no_span() {
        let records = vec![record("alice", None)];
        let stats = SummaryStats::from_records(&records);
        let writer = ReportWriter::new(&records, &stats);

        let (_, layout) = writer.summary_sheet().unwrap();

        assert!(layout.years.is_none());
        assert!(layout.months.is_none());
        assert_eq!(layout.users, Some(Span { first: 20, last: 20 }));
    }

    #[test]
    fn test_span_after() {
        assert_eq!(span_after(4, 4), None);
        assert_eq!(span_after(4, 6), Some(Span { first: 5, last: 6 }));
    }
}
