use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fhir::{BundleType, CodeConverters, RegistryScope};
use simhosp_core::config::load_mapping_file;
use simhosp_core::constants::{
    BUNDLE_TYPE_ENV, DEFAULT_LOG_DIRECTIVES, MAPPING_PATH_ENV, REGISTRY_SCOPE_ENV,
};
use simhosp_core::{BundleService, CoreConfig, parse_records, read_records};
use simhosp_ir::ClinicalRecord;

#[derive(Parser)]
#[command(name = "simhosp")]
#[command(about = "Translate synthetic clinical records into FHIR R4 bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one bundle per clinical record to stdout
    Bundle {
        /// JSON file holding one record or an array of records (`-` for stdin)
        input: PathBuf,
        /// Bundle type: batch or collection
        #[arg(long, env = BUNDLE_TYPE_ENV, default_value = "batch")]
        bundle_type: BundleType,
        /// Deduplication scope: per-bundle or session
        #[arg(long, env = REGISTRY_SCOPE_ENV, default_value = "per-bundle")]
        registry_scope: RegistryScope,
        /// YAML code mapping file
        #[arg(long, env = MAPPING_PATH_ENV)]
        mapping: Option<PathBuf>,
        /// Pretty-print each bundle
        #[arg(long)]
        pretty: bool,
    },
    /// Validate a YAML code mapping file
    CheckMapping {
        /// Mapping file to check
        file: PathBuf,
    },
}

/// Entry point for the simhosp CLI.
///
/// Bundles go to stdout; logs go to stderr so the output can be piped.
///
/// # Environment Variables
/// - `SIMHOSP_BUNDLE_TYPE`: default for `--bundle-type`
/// - `SIMHOSP_REGISTRY_SCOPE`: default for `--registry-scope`
/// - `SIMHOSP_FHIR_MAPPING`: default for `--mapping`
/// - `RUST_LOG`: tracing filter
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in DEFAULT_LOG_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bundle {
            input,
            bundle_type,
            registry_scope,
            mapping,
            pretty,
        } => {
            let config = CoreConfig::new(bundle_type, registry_scope, mapping)?;
            let mut service = BundleService::from_config(&config)?;

            let records = read_input(&input)?;
            let mut out = io::stdout().lock();
            for record in &records {
                let bundle = service.generate(record)?;
                writeln!(out, "{}", BundleService::render(&bundle, pretty)?)?;
            }
            tracing::info!("-- Wrote {} bundles", records.len());
        }
        Commands::CheckMapping { file } => {
            let mapping = load_mapping_file(&file)?;
            CodeConverters::from_mapping(&mapping)?;
            println!("{} is a valid code mapping", file.display());
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> anyhow::Result<Vec<ClinicalRecord>> {
    if input == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read records from stdin")?;
        return Ok(parse_records(&text)?);
    }
    Ok(read_records(input)?)
}
