use log::{debug, info, warn};

use province_tally::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use text_diff::print_diff;

use crate::report::config_reader::*;
use crate::report::field_matcher::FieldMatcher;
use crate::report::io_pdf::{list_source_documents, PageTextSource, PdfPageText};

pub mod chart;
pub mod composer;
pub mod config_reader;
pub mod field_matcher;
pub mod io_pdf;
pub mod io_xlsx;
pub mod layout;

#[derive(Debug, Snafu)]
pub enum ReportError {
    // Per-document failures: the document is skipped.
    #[snafu(display("Error reading document {path}"))]
    DocumentRead {
        source: pdf_extract::OutputError,
        path: String,
    },
    #[snafu(display("Document {path} has {page_count} pages, page index {page} is missing"))]
    MissingPage {
        path: String,
        page: usize,
        page_count: usize,
    },
    #[snafu(display("Text extraction failed on {path}: {message}"))]
    ExtractionPanicked { path: String, message: String },
    #[snafu(display("Could not find the votes of {candidate} in {path}"))]
    FieldMatch { path: String, candidate: String },

    #[snafu(display("{source}"))]
    EmptyResult { source: TallyErrors },

    // Outputs
    #[snafu(display("Error creating output directory {path}"))]
    CreatingOutputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing spreadsheet {path}"))]
    WritingSpreadsheet {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error rendering chart {path}"))]
    RenderingChart {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Error writing report {path}"))]
    WritingReport {
        source: lopdf::Error,
        path: String,
    },
    #[snafu(display("Error loading image {path} into the report"))]
    LoadingImage {
        source: image::ImageError,
        path: String,
    },
    #[snafu(display("Error reading font {path}"))]
    ReadingFont {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{path} is not a usable TrueType font"))]
    InvalidFont { path: String },

    // Inputs and configuration
    #[snafu(display("Error listing input directory {path}"))]
    ListingInputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid pattern for candidate {candidate}"))]
    InvalidPattern {
        source: regex::Error,
        candidate: String,
    },
    #[snafu(display("Error opening spreadsheet {path}"))]
    ReadingSpreadsheet {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Spreadsheet {path} has no worksheet"))]
    EmptySpreadsheet { path: String },
    #[snafu(display("Unexpected cell in {path}, line {lineno}: {content}"))]
    SpreadsheetCell {
        path: String,
        lineno: usize,
        content: String,
    },
    #[snafu(display("The summary table differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl ReportError {
    /// Failures that only concern one source document. The batch carries on
    /// without that document.
    pub fn is_document_level(&self) -> bool {
        matches!(
            self,
            ReportError::DocumentRead { .. }
                | ReportError::MissingPage { .. }
                | ReportError::ExtractionPanicked { .. }
                | ReportError::FieldMatch { .. }
        )
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// The files written by a successful run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportOutputs {
    pub spreadsheet: PathBuf,
    pub chart: PathBuf,
    pub report: PathBuf,
}

fn read_record(
    source: &dyn PageTextSource,
    matcher: &FieldMatcher,
    path: &Path,
    province: &str,
    page: usize,
) -> ReportResult<ExtractedRecord> {
    let text = source.page_text(path, page)?;
    debug!("read_record: {:?}: {} characters", path, text.len());
    matcher.extract_record(&path.display().to_string(), province, &text)
}

/// Reads every source document of the input directory and keeps the ones
/// where both candidates were found.
pub fn collect_records(
    config: &ReportConfig,
    source: &dyn PageTextSource,
) -> ReportResult<ProvinceRecords> {
    config.validate()?;
    let input = &config.input_settings;
    let docs = list_source_documents(
        Path::new(&input.input_directory),
        &input.label_rules(),
        &input.document_extension,
    )?;
    let matcher = FieldMatcher::new(&config.candidate_a().name, &config.candidate_b().name)?;

    let mut records = ProvinceRecords::new();
    for doc in docs.iter() {
        debug!("collect_records: reading {:?} as {}", doc.path, doc.province);
        match read_record(source, &matcher, &doc.path, &doc.province, input.page_index) {
            Ok(record) => {
                if let Some(previous) = records.insert(record) {
                    warn!(
                        "Province {} appears in several documents, keeping {:?} over {:?}",
                        doc.province, doc.path, previous
                    );
                }
            }
            Err(e) if e.is_document_level() => {
                warn!("Skipping {:?}: {}", doc.path, e);
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        "Extracted vote totals for {} of {} documents",
        records.len(),
        docs.len()
    );
    Ok(records)
}

fn ensure_parent_dir(path: &Path) -> ReportResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(CreatingOutputDirSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    Ok(())
}

/// A plain text rendering of the summary table, one line per province.
pub fn format_table(table: &SummaryTable, headers: &[String]) -> String {
    let mut lines: Vec<Vec<String>> = vec![headers.to_vec()];
    for row in table.iter() {
        lines.push(vec![
            row.province.clone(),
            row.votes_a.to_string(),
            row.votes_b.to_string(),
            row.reference_count.to_string(),
            format!("{:.2}", row.derived_percent),
        ]);
    }
    let num_cols = lines.iter().map(|l| l.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..num_cols)
        .map(|c| {
            lines
                .iter()
                .filter_map(|l| l.get(c))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    let mut res = String::new();
    for line in lines.iter() {
        let cells: Vec<String> = line
            .iter()
            .enumerate()
            .map(|(c, s)| {
                if c == 0 {
                    format!("{:<w$}", s, w = widths[c])
                } else {
                    format!("{:>w$}", s, w = widths[c])
                }
            })
            .collect();
        res.push_str(cells.join("  ").trim_end());
        res.push('\n');
    }
    res
}

/// Compares the computed table with a previously exported spreadsheet.
pub fn check_reference(
    table: &SummaryTable,
    headers: &[String],
    reference_path: &Path,
) -> ReportResult<()> {
    let reference = io_xlsx::read_summary_xlsx(reference_path)?;
    if &reference != table {
        warn!("Found differences with the reference {:?}", reference_path);
        print_diff(
            format_table(&reference, headers).as_str(),
            format_table(table, headers).as_str(),
            "\n",
        );
        return ReferenceMismatchSnafu {
            path: reference_path.display().to_string(),
        }
        .fail();
    }
    info!("Summary table matches the reference {:?}", reference_path);
    Ok(())
}

/// Aggregates the records and writes the spreadsheet, the chart and the report.
///
/// Nothing is written when the summary table is empty.
pub fn build_outputs(
    config: &ReportConfig,
    records: &ProvinceRecords,
    reference_path: Option<&Path>,
) -> ReportResult<ReportOutputs> {
    info!("Computing the summary table");
    let table = aggregate(records, &config.reference_table()).context(EmptyResultSnafu {})?;
    let template = &config.template;
    println!("{}", format_table(&table, &template.column_headers));

    let out = &config.output_settings;
    // A configured font that cannot be used must fail the run before any file is written.
    let font = chart::load_font(out.chart_font_path.as_deref().map(Path::new))?;
    let outputs = ReportOutputs {
        spreadsheet: PathBuf::from(&out.spreadsheet_path),
        chart: PathBuf::from(&out.chart_path),
        report: PathBuf::from(&out.report_path),
    };

    ensure_parent_dir(&outputs.spreadsheet)?;
    io_xlsx::write_summary_xlsx(&table, &template.column_headers, &outputs.spreadsheet)?;
    info!("Wrote spreadsheet {:?}", outputs.spreadsheet);

    info!("Rendering chart");
    let settings = chart::ChartSettings::new(template, font);
    ensure_parent_dir(&outputs.chart)?;
    chart::render_chart(&table, &settings, &outputs.chart)?;
    info!("Wrote chart {:?}", outputs.chart);

    info!("Composing report");
    ensure_parent_dir(&outputs.report)?;
    composer::compose_report(
        &table,
        &outputs.chart,
        template,
        out.cover_image_path.as_deref().map(Path::new),
        &outputs.report,
    )?;
    info!("Wrote report {:?}", outputs.report);

    if let Some(p) = reference_path {
        check_reference(&table, &template.column_headers, p)?;
    }
    Ok(outputs)
}

pub fn run_report_with(
    config: &ReportConfig,
    source: &dyn PageTextSource,
    reference_path: Option<&Path>,
) -> ReportResult<ReportOutputs> {
    info!(
        "Extracting vote totals from {:?}",
        config.input_settings.input_directory
    );
    let records = collect_records(config, source)?;
    build_outputs(config, &records, reference_path)
}

pub fn run_report(config: &ReportConfig, reference_path: Option<&Path>) -> ReportResult<ReportOutputs> {
    run_report_with(config, &PdfPageText, reference_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves page text from memory, keyed by file name.
    struct StaticPages(HashMap<String, String>);

    impl PageTextSource for StaticPages {
        fn page_text(&self, path: &Path, page: usize) -> ReportResult<String> {
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            match self.0.get(&name) {
                Some(t) => Ok(t.clone()),
                None => MissingPageSnafu {
                    path: name,
                    page,
                    page_count: 0_usize,
                }
                .fail(),
            }
        }
    }

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn page(a: &str, b: &str) -> String {
        format!(
            "RESULTADOS\nLUISA GONZALEZ {} 45,12 %\nDANIEL NOBOA AZIN {} 54,88 %\n",
            a, b
        )
    }

    fn setup(docs: &[(&str, Option<String>)]) -> (TempDir, ReportConfig, StaticPages) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data global");
        fs::create_dir_all(&input).unwrap();
        let mut pages = HashMap::new();
        for (name, text) in docs {
            fs::write(input.join(name), b"").unwrap();
            if let Some(t) = text {
                pages.insert(name.to_string(), t.clone());
            }
        }
        let mut config = ReportConfig::default();
        config.input_settings.input_directory = input.display().to_string();
        config.output_settings.rebase(&dir.path().join("outputs"));
        config.output_settings.cover_image_path = None;
        (dir, config, StaticPages(pages))
    }

    #[test]
    fn skips_failed_documents() {
        init();
        let (_dir, config, pages) = setup(&[
            (
                "elecciones-generales-2025-azuay.pdf",
                Some(page("1.234.567", "1.500.000")),
            ),
            (
                "elecciones-generales-2025-guayas.pdf",
                Some("LUISA GONZALEZ 10 50,00 %".to_string()),
            ),
            ("elecciones-generales-2025-manabi.pdf", None),
        ]);
        let records = collect_records(&config, &pages).unwrap();
        assert_eq!(records.len(), 1);
        let azuay = records.get("Azuay").unwrap();
        assert_eq!(azuay.votes_a, 1234567);
        assert_eq!(azuay.votes_b, 1500000);
    }

    #[test]
    fn empty_result_writes_nothing() {
        init();
        let (_dir, config, pages) = setup(&[(
            "elecciones-generales-2025-azuay.pdf",
            Some("no results on this page".to_string()),
        )]);
        let res = run_report_with(&config, &pages, None);
        assert!(matches!(res, Err(ReportError::EmptyResult { .. })));
        let out = &config.output_settings;
        assert!(!Path::new(&out.spreadsheet_path).exists());
        assert!(!Path::new(&out.chart_path).exists());
        assert!(!Path::new(&out.report_path).exists());
    }

    #[test]
    fn full_run_writes_all_outputs() {
        init();
        let (_dir, config, pages) = setup(&[
            (
                "elecciones-generales-2025-azuay.pdf",
                Some(page("300.000", "250.000")),
            ),
            (
                "elecciones-generales-2025-los rios.pdf",
                Some(page("200.000", "180.000")),
            ),
            ("notes.txt", None),
        ]);
        let outputs = run_report_with(&config, &pages, None).unwrap();
        assert!(outputs.spreadsheet.exists());
        assert!(outputs.chart.exists());
        assert!(outputs.report.exists());

        let table = io_xlsx::read_summary_xlsx(&outputs.spreadsheet).unwrap();
        let names: Vec<&str> = table.iter().map(|r| r.province.as_str()).collect();
        assert_eq!(names, vec!["Azuay", "Los Rios"]);
        assert_eq!(table.rows[0].reference_count, 92210);
        assert_eq!(table.rows[0].derived_percent, 16.77);
        assert_eq!(table.rows[1].reference_count, 88121);
        assert_eq!(table.rows[1].derived_percent, 23.19);
    }

    #[test]
    fn runs_are_repeatable() {
        init();
        let (dir, config, pages) = setup(&[(
            "elecciones-generales-2025-pichincha.pdf",
            Some(page("700.000", "900.000")),
        )]);
        let first = run_report_with(&config, &pages, None).unwrap();
        let t1 = io_xlsx::read_summary_xlsx(&first.spreadsheet).unwrap();
        let kept = dir.path().join("first.xlsx");
        fs::copy(&first.spreadsheet, &kept).unwrap();
        // Creation timestamps have a one second resolution.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = run_report_with(&config, &pages, Some(&kept)).unwrap();
        let t2 = io_xlsx::read_summary_xlsx(&second.spreadsheet).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(fs::read(&kept).unwrap(), fs::read(&second.spreadsheet).unwrap());
    }

    #[test]
    fn unusable_font_writes_nothing() {
        init();
        let (dir, mut config, pages) = setup(&[(
            "elecciones-generales-2025-pichincha.pdf",
            Some(page("700.000", "900.000")),
        )]);
        let font = dir.path().join("broken.ttf");
        fs::write(&font, b"not a font").unwrap();
        config.output_settings.chart_font_path = Some(font.display().to_string());
        let res = run_report_with(&config, &pages, None);
        assert!(matches!(res, Err(ReportError::InvalidFont { .. })));
        let out = &config.output_settings;
        assert!(!Path::new(&out.spreadsheet_path).exists());
        assert!(!Path::new(&out.chart_path).exists());
        assert!(!Path::new(&out.report_path).exists());
    }

    #[test]
    fn collect_records_checks_candidates() {
        init();
        let (_dir, mut config, pages) = setup(&[(
            "elecciones-generales-2025-azuay.pdf",
            Some(page("1", "2")),
        )]);
        config.candidates.truncate(1);
        let res = collect_records(&config, &pages);
        assert!(matches!(res, Err(ReportError::Whatever { .. })));
    }

    #[test]
    fn reference_mismatch_fails() {
        init();
        let (dir, config, pages) = setup(&[(
            "elecciones-generales-2025-pichincha.pdf",
            Some(page("700.000", "900.000")),
        )]);
        let other = SummaryTable {
            rows: vec![SummaryRow {
                province: "Pichincha".to_string(),
                votes_a: 1,
                votes_b: 1,
                reference_count: 1,
                derived_percent: 50.0,
            }],
        };
        let reference = dir.path().join("reference.xlsx");
        io_xlsx::write_summary_xlsx(&other, &config.template.column_headers, &reference).unwrap();
        let res = run_report_with(&config, &pages, Some(&reference));
        assert!(matches!(res, Err(ReportError::ReferenceMismatch { .. })));
    }

    #[test]
    fn text_table() {
        let table = SummaryTable {
            rows: vec![SummaryRow {
                province: "Azuay".to_string(),
                votes_a: 10,
                votes_b: 2000,
                reference_count: 5,
                derived_percent: 0.25,
            }],
        };
        let headers: Vec<String> = ["P", "A", "B", "R", "%"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            format_table(&table, &headers),
            "P       A     B  R     %\nAzuay  10  2000  5  0.25\n"
        );
    }

    #[test]
    fn document_level_errors() {
        let e = ReportError::FieldMatch {
            path: "x.pdf".to_string(),
            candidate: "A".to_string(),
        };
        assert!(e.is_document_level());
        let e = ReportError::ExtractionPanicked {
            path: "x.pdf".to_string(),
            message: "unexpected encoding".to_string(),
        };
        assert!(e.is_document_level());
        let e = ReportError::EmptyResult {
            source: TallyErrors::EmptyResult,
        };
        assert!(!e.is_document_level());
    }
}
