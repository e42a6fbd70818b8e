use clap::Parser;

/// Builds the elderly-population influence report from per-province election result documents.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration. Sections that are left out take the built-in
    /// values: the two candidates of the 2025 runoff and the 2025 elderly-population table.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) A spreadsheet written by a previous run. If provided, the computed
    /// summary table is checked against it and the run fails on any difference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory) The directory containing the result documents. Overrides the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (directory) If specified, the spreadsheet, the chart and the report are all written to
    /// this directory, keeping their configured file names.
    #[clap(short, long, value_parser)]
    pub out_dir: Option<String>,

    /// (zero-based index, default 1) The page of each document holding the results.
    #[clap(long, value_parser)]
    pub page: Option<usize>,

    /// (file path) The image placed on the cover page.
    #[clap(long, value_parser)]
    pub cover: Option<String>,

    /// (file path) A TrueType font for the chart labels.
    #[clap(long, value_parser)]
    pub font: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
