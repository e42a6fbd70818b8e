// The PDF report: a cover page, then the title, the chart, the summary table
// and the analysis paragraph.

use image::RgbImage;
use log::{debug, warn};
use snafu::prelude::*;

use crate::report::layout::*;
use crate::report::*;

const COVER_IMAGE_WIDTH: f32 = 70.0 * MM;
const COVER_IMAGE_TOP: f32 = 20.0 * MM;
const CHART_WIDTH: f32 = 130.0 * MM;

// Column widths of the summary table, scaled down when wider than the page.
const COLUMN_WIDTHS: [f32; 5] = [45.0 * MM, 35.0 * MM, 35.0 * MM, 40.0 * MM, 45.0 * MM];
const HEADER_HEIGHT: f32 = 10.0 * MM;
const ROW_HEIGHT: f32 = 8.0 * MM;
const TABLE_FONT_SIZE: f32 = 10.0;
const ALTERNATE_FILL: [f32; 3] = [230.0 / 255.0, 230.0 / 255.0, 230.0 / 255.0];
const PLAIN_FILL: [f32; 3] = [1.0, 1.0, 1.0];

/// The analysis sentence for the row with the largest derived percent.
pub fn analysis_text(template: &ReportTemplate, row: &SummaryRow) -> String {
    template
        .analysis_template
        .replace("{province}", &row.province)
        .replace("{percent}", &format!("{:.2}", row.derived_percent))
}

fn load_image(path: &Path) -> ReportResult<RgbImage> {
    let img = image::open(path).context(LoadingImageSnafu {
        path: path.display().to_string(),
    })?;
    Ok(img.to_rgb8())
}

fn scaled_height(img: &RgbImage, width: f32) -> f32 {
    width * img.height() as f32 / img.width().max(1) as f32
}

fn cover_page(canvas: &mut PdfCanvas, template: &ReportTemplate, cover: Option<&Path>) {
    canvas.add_page();
    let cover_img = match cover {
        Some(p) if p.exists() => match load_image(p) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Leaving out the cover image: {}", e);
                None
            }
        },
        Some(p) => {
            warn!("Cover image {:?} not found, leaving it out", p);
            None
        }
        None => None,
    };
    if let Some(img) = cover_img {
        let h = scaled_height(&img, COVER_IMAGE_WIDTH);
        let name = canvas.add_image(img);
        canvas.ln(COVER_IMAGE_TOP - MARGIN);
        canvas.place_image(
            &name,
            (PAGE_WIDTH - COVER_IMAGE_WIDTH) / 2.0,
            COVER_IMAGE_WIDTH,
            h,
        );
    }
    // The institutional text starts below the image area in any case.
    let text_top = COVER_IMAGE_TOP + 85.0 * MM;
    if canvas.cursor() < text_top {
        let gap = text_top - canvas.cursor();
        canvas.ln(gap);
    }

    for (idx, line) in template.institution_lines.iter().enumerate() {
        let size = if idx == 0 { 17.0 } else { 16.0 };
        canvas.text_line(line, FontStyle::Bold, size, Align::Center);
    }
    canvas.ln(10.0 * MM);
    for line in wrap_text(&template.subject, FontStyle::Regular, 13.0, canvas.content_width()) {
        canvas.text_line(&line, FontStyle::Regular, 13.0, Align::Center);
    }
}

fn table_cells(row: &SummaryRow) -> [String; 5] {
    [
        row.province.clone(),
        group_thousands(row.votes_a),
        group_thousands(row.votes_b),
        group_thousands(row.reference_count),
        format!("{:.2}%", row.derived_percent),
    ]
}

fn table_header(canvas: &mut PdfCanvas, headers: &[String], x_start: f32, widths: &[f32]) {
    let mut x = x_start;
    for (h, w) in headers.iter().zip(widths.iter()) {
        canvas.cell(&Cell {
            x,
            width: *w,
            height: HEADER_HEIGHT,
            text: h,
            style: FontStyle::Bold,
            size: TABLE_FONT_SIZE,
            align: Align::Center,
            fill: None,
            border: true,
        });
        x += w;
    }
    canvas.ln(HEADER_HEIGHT);
}

fn summary_table(canvas: &mut PdfCanvas, table: &SummaryTable, headers: &[String]) {
    let total: f32 = COLUMN_WIDTHS.iter().sum();
    let scale = (canvas.content_width() / total).min(1.0);
    let widths: Vec<f32> = COLUMN_WIDTHS.iter().map(|w| w * scale).collect();
    let x_start = MARGIN + (canvas.content_width() - total * scale) / 2.0;

    canvas.ensure_space(HEADER_HEIGHT + ROW_HEIGHT);
    table_header(canvas, headers, x_start, &widths);
    for (idx, row) in table.iter().enumerate() {
        if canvas.ensure_space(ROW_HEIGHT) {
            debug!("summary_table: page break before {}", row.province);
            table_header(canvas, headers, x_start, &widths);
        }
        let fill = if idx % 2 == 1 { ALTERNATE_FILL } else { PLAIN_FILL };
        let mut x = x_start;
        for (col, (text, w)) in table_cells(row).iter().zip(widths.iter()).enumerate() {
            canvas.cell(&Cell {
                x,
                width: *w,
                height: ROW_HEIGHT,
                text,
                style: FontStyle::Regular,
                size: TABLE_FONT_SIZE,
                align: if col == 0 { Align::Left } else { Align::Right },
                fill: Some(fill),
                border: true,
            });
            x += w;
        }
        canvas.ln(ROW_HEIGHT);
    }
}

/// Lays out the whole report in memory.
pub fn build_report(
    table: &SummaryTable,
    chart: &RgbImage,
    template: &ReportTemplate,
    cover: Option<&Path>,
) -> ReportResult<PdfCanvas> {
    let max_row = table
        .max_row()
        .ok_or(TallyErrors::EmptyResult)
        .context(EmptyResultSnafu {})?;
    debug!("build_report: largest derived percent: {:?}", max_row);

    let mut canvas = PdfCanvas::new();
    cover_page(&mut canvas, template, cover);

    canvas.add_page();
    for line in wrap_text(&template.title, FontStyle::Bold, 11.0, canvas.content_width()) {
        canvas.text_line(&line, FontStyle::Bold, 11.0, Align::Center);
    }
    canvas.ln(8.0 * MM);

    let chart_height = scaled_height(chart, CHART_WIDTH);
    let name = canvas.add_image(chart.clone());
    canvas.place_image(
        &name,
        (PAGE_WIDTH - CHART_WIDTH) / 2.0,
        CHART_WIDTH,
        chart_height,
    );
    canvas.ln(10.0 * MM);

    summary_table(&mut canvas, table, &template.column_headers);

    canvas.ln(10.0 * MM);
    canvas.text_line(&template.analysis_heading, FontStyle::Bold, 12.0, Align::Left);
    canvas.paragraph(&analysis_text(template, max_row), FontStyle::Regular, 11.0);
    Ok(canvas)
}

/// Writes the report next to the already rendered chart, replacing any existing file.
pub fn compose_report(
    table: &SummaryTable,
    chart_path: &Path,
    template: &ReportTemplate,
    cover: Option<&Path>,
    path: &Path,
) -> ReportResult<()> {
    if table.is_empty() {
        return Err(TallyErrors::EmptyResult).context(EmptyResultSnafu {});
    }
    let chart = load_image(chart_path)?;
    let canvas = build_report(table, &chart, template, cover)?;
    let p = path.display().to_string();
    debug!("compose_report: {} pages", canvas.page_count());
    let mut doc = canvas
        .into_document(&template.title)
        .context(WritingReportSnafu { path: p.clone() })?;
    doc.compress();
    doc.save(path)
        .map_err(lopdf::Error::from)
        .context(WritingReportSnafu { path: p })?;
    Ok(())
}
