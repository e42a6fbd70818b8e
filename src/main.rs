mod args;
mod report;

use clap::Parser;
use log::{debug, error, info};
use snafu::ErrorCompat;
use std::path::Path;

use crate::args::Args;
use crate::report::config_reader::{read_config, ReportConfig};
use crate::report::{run_report, ReportResult};

fn load_config(args: &Args) -> ReportResult<ReportConfig> {
    let mut config = match args.config.as_ref() {
        Some(p) => read_config(p)?,
        None => ReportConfig::default(),
    };
    if let Some(input) = args.input.as_ref() {
        config.input_settings.input_directory = input.clone();
    }
    if let Some(page) = args.page {
        config.input_settings.page_index = page;
    }
    if let Some(dir) = args.out_dir.as_ref() {
        config.output_settings.rebase(Path::new(dir));
    }
    if let Some(cover) = args.cover.as_ref() {
        config.output_settings.cover_image_path = Some(cover.clone());
    }
    if let Some(font) = args.font.as_ref() {
        config.output_settings.chart_font_path = Some(font.clone());
    }
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    let res = load_config(&args).and_then(|config| {
        debug!("config: {:?}", config);
        run_report(&config, args.reference.as_deref().map(Path::new))
    });

    match res {
        Ok(outputs) => {
            info!(
                "Done: {:?}, {:?}, {:?}",
                outputs.spreadsheet, outputs.chart, outputs.report
            );
        }
        Err(e) => {
            error!("{}", e);
            for cause in ErrorCompat::iter_chain(&e).skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
