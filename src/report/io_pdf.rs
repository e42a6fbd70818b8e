// Reading the source documents.

use log::{debug, warn};
use snafu::prelude::*;

use crate::report::*;

/// Gives access to the text of one page of a source document.
pub trait PageTextSource {
    /// The text of the zero-based page `page`. The document is released
    /// before returning, whether or not the page could be read.
    fn page_text(&self, path: &Path, page: usize) -> ReportResult<String>;
}

/// Reads PDF documents that carry a text layer.
pub struct PdfPageText;

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl PageTextSource for PdfPageText {
    fn page_text(&self, path: &Path, page: usize) -> ReportResult<String> {
        let p = path.display().to_string();
        // The extractor panics on some malformed documents.
        let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(path)
        }));
        let pages = match extracted {
            Ok(res) => res.context(DocumentReadSnafu { path: p.clone() })?,
            Err(payload) => {
                return ExtractionPanickedSnafu {
                    path: p,
                    message: panic_message(payload),
                }
                .fail()
            }
        };
        let page_count = pages.len();
        debug!("page_text: {} has {} pages", p, page_count);
        pages.into_iter().nth(page).context(MissingPageSnafu {
            path: p,
            page,
            page_count,
        })
    }
}

/// A source document and the province it covers.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub province: String,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}

/// The documents of `dir` with the given extension, sorted by file name.
/// Files whose name leaves no province label are skipped.
pub fn list_source_documents(
    dir: &Path,
    rules: &LabelRules,
    extension: &str,
) -> ReportResult<Vec<SourceDocument>> {
    let dir_s = dir.display().to_string();
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).context(ListingInputDirSnafu { path: dir_s.clone() })? {
        let entry = entry.context(ListingInputDirSnafu { path: dir_s.clone() })?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, extension) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut res: Vec<SourceDocument> = Vec::new();
    for path in paths {
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => {
                warn!("Skipping {:?}: the file name is not valid UTF-8", path);
                continue;
            }
        };
        match province_tally::label::province_label(&file_name, rules) {
            Some(province) => res.push(SourceDocument { path, province }),
            None => warn!("Skipping {:?}: no province in the file name", path),
        }
    }
    debug!("list_source_documents: {:?}", res);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use tempfile::TempDir;

    /// Writes a PDF with one line of Helvetica text per page.
    fn write_pdf(path: &Path, page_lines: &[&str]) {
        write_pdf_with_encoding(path, page_lines, "WinAnsiEncoding");
    }

    fn write_pdf_with_encoding(path: &Path, page_lines: &[&str], encoding: &str) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => Object::Name(encoding.as_bytes().to_vec()),
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for line in page_lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn reads_second_page() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("elecciones-generales-2025-azuay.pdf");
        write_pdf(
            &p,
            &[
                "RESUMEN GENERAL",
                "LUISA GONZALEZ 294.576 41,69 % DANIEL NOBOA AZIN 412.003 58,31 %",
            ],
        );
        let text = PdfPageText.page_text(&p, 1).unwrap();
        assert!(text.contains("GONZALEZ"), "text: {:?}", text);
        assert!(!text.contains("RESUMEN"));

        let matcher = crate::report::field_matcher::FieldMatcher::new(
            "LUISA GONZALEZ",
            "DANIEL NOBOA AZIN",
        )
        .unwrap();
        let r = matcher.extract_record("azuay.pdf", "Azuay", &text).unwrap();
        assert_eq!(r.votes_a, 294576);
        assert_eq!(r.votes_b, 412003);
    }

    #[test]
    fn missing_page() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("one-page.pdf");
        write_pdf(&p, &["ONLY PAGE"]);
        let e = PdfPageText.page_text(&p, 1).unwrap_err();
        assert!(matches!(
            e,
            ReportError::MissingPage {
                page: 1,
                page_count: 1,
                ..
            }
        ));
        assert!(e.is_document_level());
    }

    #[test]
    fn unreadable_document() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("broken.pdf");
        fs::write(&p, b"this is not a pdf").unwrap();
        let e = PdfPageText.page_text(&p, 1).unwrap_err();
        assert!(matches!(e, ReportError::DocumentRead { .. }));
        assert!(e.is_document_level());
    }

    #[test]
    fn extractor_panic_is_document_level() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("guayas.pdf");
        write_pdf_with_encoding(&p, &["RESUMEN", "LUISA GONZALEZ 1 1,00 %"], "FooEncoding");
        let e = PdfPageText.page_text(&p, 1).unwrap_err();
        assert!(matches!(e, ReportError::ExtractionPanicked { .. }), "{:?}", e);
        assert!(e.is_document_level());
    }

    #[test]
    fn broken_document_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data global");
        fs::create_dir_all(&input).unwrap();
        write_pdf(
            &input.join("elecciones-generales-2025-azuay.pdf"),
            &[
                "RESUMEN GENERAL",
                "LUISA GONZALEZ 294.576 41,69 % DANIEL NOBOA AZIN 412.003 58,31 %",
            ],
        );
        write_pdf_with_encoding(
            &input.join("elecciones-generales-2025-guayas.pdf"),
            &[
                "RESUMEN GENERAL",
                "LUISA GONZALEZ 100 50,00 % DANIEL NOBOA AZIN 100 50,00 %",
            ],
            "FooEncoding",
        );
        let mut config = ReportConfig::default();
        config.input_settings.input_directory = input.display().to_string();
        let records = crate::report::collect_records(&config, &PdfPageText).unwrap();
        assert_eq!(records.len(), 1);
        let azuay = records.get("Azuay").unwrap();
        assert_eq!(azuay.votes_a, 294576);
        assert_eq!(azuay.votes_b, 412003);
    }

    #[test]
    fn lists_documents_in_name_order() {
        let dir = TempDir::new().unwrap();
        for name in [
            "elecciones-generales-2025-pichincha.pdf",
            "elecciones-generales-2025-azuay.PDF",
            "elecciones-generales-2025-.pdf",
            "elecciones-generales-2025-guayas.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.pdf")).unwrap();
        let rules = LabelRules::new(&["elecciones-generales-2025-"], &[".pdf", ".PDF"]);
        let docs = list_source_documents(dir.path(), &rules, "pdf").unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.province.as_str()).collect();
        assert_eq!(names, vec!["Azuay", "Pichincha"]);
    }

    #[test]
    fn missing_directory() {
        let dir = TempDir::new().unwrap();
        let e = list_source_documents(&dir.path().join("nope"), &LabelRules::default(), "pdf")
            .unwrap_err();
        assert!(matches!(e, ReportError::ListingInputDir { .. }));
        assert!(!e.is_document_level());
    }
}
