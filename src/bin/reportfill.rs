//! reportfill CLI - overlays inspection data onto a fixed-layout PDF template

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use reportfill::{ReportFillError, ReportFiller, TemplateSpec, load_values};

#[derive(Parser)]
#[command(name = "reportfill")]
#[command(version)]
#[command(about = "Fill a PDF report template from inspection JSON", long_about = None)]
struct Cli {
    /// Blank template PDF
    #[arg(long, value_name = "PDF")]
    template: PathBuf,

    /// Inspection record JSON
    #[arg(long, value_name = "FILE")]
    json: PathBuf,

    /// Field position spec JSON
    #[arg(long, value_name = "FILE")]
    spec: PathBuf,

    /// Output PDF
    #[arg(long, value_name = "PDF", default_value = "output_pdf.pdf")]
    out: PathBuf,

    /// Outline every field box with its name
    #[arg(long)]
    debug: bool,

    /// Timeout for each remote image fetch, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    image_timeout: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), ReportFillError> {
    let started = Instant::now();
    for path in [&cli.template, &cli.json, &cli.spec] {
        if !path.exists() {
            return Err(ReportFillError::MissingInput(path.clone()));
        }
    }

    let spec = TemplateSpec::load(&cli.spec)?;
    let values = load_values(&cli.json)?;
    log::debug!("{} field(s) in spec, {} value(s) shaped", spec.fields.len(), values.len());

    let filler = ReportFiller::builder()
        .debug(cli.debug)
        .image_timeout(Duration::from_secs(cli.image_timeout))
        .build()?;
    let report = filler.fill_to_file(&cli.template, &spec, &values, &cli.out)?;
    if report.failed_pages() > 0 {
        log::warn!("{} page(s) kept without overlay", report.failed_pages());
    }

    println!(
        "Done: {}  (elapsed: {:.2}s)",
        cli.out.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
