// Spreadsheet export of the summary table, and reading it back.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::debug;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, XlsxError};
use snafu::prelude::*;

use crate::report::*;

const SHEET_NAME: &str = "Resumen";

fn build_workbook(table: &SummaryTable, headers: &[String]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    // A fixed creation date keeps the file identical across runs.
    let created = ExcelDateTime::from_ymd(2025, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let header_format = Format::new().set_bold();
    let percent_format = Format::new().set_num_format("0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    for (col, h) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, h.as_str(), &header_format)?;
    }
    worksheet.set_column_width(0, 26)?;
    for col in 1..headers.len() {
        worksheet.set_column_width(col as u16, 16)?;
    }

    for (idx, row) in table.iter().enumerate() {
        let r = (idx + 1) as u32;
        worksheet.write_string(r, 0, row.province.as_str())?;
        worksheet.write_number(r, 1, row.votes_a as f64)?;
        worksheet.write_number(r, 2, row.votes_b as f64)?;
        worksheet.write_number(r, 3, row.reference_count as f64)?;
        worksheet.write_number_with_format(r, 4, round2(row.derived_percent), &percent_format)?;
    }
    Ok(workbook)
}

/// Writes one row per province under a header row, replacing any existing file.
pub fn write_summary_xlsx(table: &SummaryTable, headers: &[String], path: &Path) -> ReportResult<()> {
    let p = path.display().to_string();
    let mut workbook =
        build_workbook(table, headers).context(WritingSpreadsheetSnafu { path: p.clone() })?;
    workbook
        .save(path)
        .context(WritingSpreadsheetSnafu { path: p })?;
    Ok(())
}

fn read_string(cell: Option<&DataType>, path: &str, lineno: usize) -> ReportResult<String> {
    match cell {
        Some(DataType::String(s)) => Ok(s.clone()),
        x => SpreadsheetCellSnafu {
            path,
            lineno,
            content: format!("{:?}", x),
        }
        .fail(),
    }
}

fn read_count(cell: Option<&DataType>, path: &str, lineno: usize) -> ReportResult<u64> {
    match cell {
        Some(DataType::Float(f)) if *f >= 0.0 && f.fract() == 0.0 => Ok(*f as u64),
        Some(DataType::Int(i)) if *i >= 0 => Ok(*i as u64),
        x => SpreadsheetCellSnafu {
            path,
            lineno,
            content: format!("{:?}", x),
        }
        .fail(),
    }
}

fn read_percent(cell: Option<&DataType>, path: &str, lineno: usize) -> ReportResult<f64> {
    match cell {
        Some(DataType::Float(f)) => Ok(round2(*f)),
        Some(DataType::Int(i)) => Ok(*i as f64),
        x => SpreadsheetCellSnafu {
            path,
            lineno,
            content: format!("{:?}", x),
        }
        .fail(),
    }
}

/// Rebuilds a summary table from a file written by `write_summary_xlsx`.
pub fn read_summary_xlsx(path: &Path) -> ReportResult<SummaryTable> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> =
        open_workbook(path).context(ReadingSpreadsheetSnafu { path: p.clone() })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptySpreadsheetSnafu { path: p.clone() })?
        .context(ReadingSpreadsheetSnafu { path: p.clone() })?;

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptySpreadsheetSnafu { path: p.clone() })?;
    debug!("read_summary_xlsx: header: {:?}", header);

    let mut rows: Vec<SummaryRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        // Line numbers as displayed by spreadsheet programs.
        let lineno = idx + 2;
        let pr = SummaryRow {
            province: read_string(row.first(), &p, lineno)?,
            votes_a: read_count(row.get(1), &p, lineno)?,
            votes_b: read_count(row.get(2), &p, lineno)?,
            reference_count: read_count(row.get(3), &p, lineno)?,
            derived_percent: read_percent(row.get(4), &p, lineno)?,
        };
        debug!("read_summary_xlsx: row: {:?}", pr);
        rows.push(pr);
    }
    Ok(SummaryTable { rows })
}
