use crate::report::*;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    #[serde(rename = "inputDirectory")]
    pub input_directory: String,
    #[serde(rename = "documentExtension")]
    pub document_extension: String,
    /// Literal text removed from the file names to obtain the province labels.
    #[serde(rename = "labelPrefixes")]
    pub label_prefixes: Vec<String>,
    #[serde(rename = "labelSuffixes")]
    pub label_suffixes: Vec<String>,
    /// Zero-based index of the page holding the results.
    #[serde(rename = "pageIndex")]
    pub page_index: usize,
}

impl InputSettings {
    pub fn label_rules(&self) -> LabelRules {
        LabelRules {
            prefixes: self.label_prefixes.clone(),
            suffixes: self.label_suffixes.clone(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        let rules = LabelRules::default();
        InputSettings {
            input_directory: "data global".to_string(),
            document_extension: "pdf".to_string(),
            label_prefixes: rules.prefixes,
            label_suffixes: rules.suffixes,
            page_index: 1,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportCandidate {
    /// The name as printed in the result documents.
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    #[serde(rename = "spreadsheetPath")]
    pub spreadsheet_path: String,
    #[serde(rename = "chartPath")]
    pub chart_path: String,
    #[serde(rename = "reportPath")]
    pub report_path: String,
    #[serde(rename = "coverImagePath")]
    pub cover_image_path: Option<String>,
    /// TrueType font for the chart labels. Common system fonts are tried when absent.
    #[serde(rename = "chartFontPath")]
    pub chart_font_path: Option<String>,
}

impl OutputSettings {
    /// Moves the three output files into `dir`, keeping their file names.
    pub fn rebase(&mut self, dir: &Path) {
        for p in [
            &mut self.spreadsheet_path,
            &mut self.chart_path,
            &mut self.report_path,
        ] {
            let file_name = Path::new(p.as_str())
                .file_name()
                .map(|s| s.to_os_string())
                .unwrap_or_default();
            *p = dir.join(file_name).display().to_string();
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            spreadsheet_path: "outputs/resumen_resultados.xlsx".to_string(),
            chart_path: "graficos/influencia_adultos_mayores.png".to_string(),
            report_path: "outputs/informe_final.pdf".to_string(),
            cover_image_path: Some("resources/imagen_portada.png".to_string()),
            chart_font_path: None,
        }
    }
}

/// The fixed text of the report. Only the analysis sentence depends on the data,
/// through the `{province}` and `{percent}` placeholders.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportTemplate {
    #[serde(rename = "institutionLines")]
    pub institution_lines: Vec<String>,
    pub subject: String,
    pub title: String,
    #[serde(rename = "chartTitle")]
    pub chart_title: String,
    #[serde(rename = "chartAxisLabel")]
    pub chart_axis_label: String,
    /// Province, votes of each candidate, reference count, derived percent.
    #[serde(rename = "columnHeaders")]
    pub column_headers: Vec<String>,
    #[serde(rename = "analysisHeading")]
    pub analysis_heading: String,
    #[serde(rename = "analysisTemplate")]
    pub analysis_template: String,
}

impl Default for ReportTemplate {
    fn default() -> Self {
        ReportTemplate {
            institution_lines: vec![
                "UNIVERSIDAD CENTRAL DEL ECUADOR".to_string(),
                "FACULTAD DE INGENIERIA Y CIENCIAS APLICADAS".to_string(),
                "SISTEMAS DE INFORMACION".to_string(),
                "LEGISLACI\u{d3}N".to_string(),
            ],
            subject: "INFLUENCIA DE LOS ADULTOS MAYORES O IGUAL A 65 A\u{d1}OS EN LA SEGUNDA VUELTA - ELECCIONES ECUADOR 2025".to_string(),
            title: "INFLUENCIA RELATIVA DE ADULTOS MAYORES EN LA REELECCI\u{d3}N DEL PRESIDENTE DANIEL NOBOA".to_string(),
            chart_title: "Influencia relativa de adultos mayores por provincia".to_string(),
            chart_axis_label: "% Adultos Mayores / Total de Votos".to_string(),
            column_headers: vec![
                "Provincia".to_string(),
                "Votos Luisa".to_string(),
                "Votos Noboa".to_string(),
                "Adultos Mayores".to_string(),
                "% Adultos Mayores vs Votos".to_string(),
            ],
            analysis_heading: "An\u{e1}lisis Autom\u{e1}tico".to_string(),
            analysis_template: "La provincia con mayor proporci\u{f3}n de adultos mayores en relaci\u{f3}n al total de votos es {province}, con un {percent}% del total. Esto indica una influencia electoral significativa por parte de este grupo etario.".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    #[serde(rename = "inputSettings")]
    pub input_settings: InputSettings,
    /// Exactly two candidates. The first one fills the first vote column.
    pub candidates: Vec<ReportCandidate>,
    #[serde(rename = "referenceTable")]
    pub reference_table: BTreeMap<String, u64>,
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub template: ReportTemplate,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            input_settings: InputSettings::default(),
            candidates: vec![
                ReportCandidate {
                    name: "LUISA GONZALEZ".to_string(),
                },
                ReportCandidate {
                    name: "DANIEL NOBOA AZIN".to_string(),
                },
            ],
            reference_table: ReferenceTable::elderly_population_2025()
                .iter()
                .map(|(name, count)| (name.clone(), *count))
                .collect(),
            output_settings: OutputSettings::default(),
            template: ReportTemplate::default(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> ReportResult<()> {
        if self.candidates.len() != 2 {
            whatever!(
                "Exactly two candidates are required, found {}",
                self.candidates.len()
            )
        }
        if self.template.column_headers.len() != 5 {
            whatever!(
                "Five column headers are required, found {:?}",
                self.template.column_headers
            )
        }
        Ok(())
    }

    pub fn candidate_a(&self) -> &ReportCandidate {
        &self.candidates[0]
    }

    pub fn candidate_b(&self) -> &ReportCandidate {
        &self.candidates[1]
    }

    pub fn reference_table(&self) -> ReferenceTable {
        self.reference_table
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect()
    }
}

/// Reads a JSON configuration. Missing sections take their default values.
pub fn read_config(path: &str) -> ReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: read content: {:?}", contents);
    let config: ReportConfig = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    config.validate()?;
    Ok(config)
}
