use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use parcel_ingest::address::normalize;
use parcel_ingest::config::Config;
use parcel_ingest::domain::{CandidateRecord, RawRecord};
use parcel_ingest::error::Result;
use parcel_ingest::geocode::GeocodingResolver;
use parcel_ingest::logging;
use parcel_ingest::pipeline::IngestionPipeline;

#[derive(Parser)]
#[command(name = "parcel_ingest")]
#[command(about = "Property parcel ingestion and reconciliation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a JSON file of raw records through the pipeline
    Process {
        /// Path to a JSON array of raw records
        #[arg(long)]
        input: PathBuf,
        /// Optional JSON map of source_record_id to candidate lists for
        /// entity resolution
        #[arg(long)]
        candidates: Option<PathBuf>,
    },
    /// Normalize a single address string and print the result
    Normalize {
        address: String,
    },
    /// Geocode a single address string using the live providers
    Geocode {
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Guard must outlive the run so buffered file logs flush on exit
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    match cli.command {
        Commands::Process { input, candidates } => {
            let records = load_records(&input)?;
            let candidate_map = match candidates {
                Some(path) => load_candidates(&path)?,
                None => HashMap::new(),
            };

            let geocoder = Arc::new(GeocodingResolver::new(&config.geocoding)?);
            let pipeline = IngestionPipeline::new(geocoder);

            println!("🔄 Processing {} raw records...", records.len());
            let mut succeeded = 0usize;
            let mut failed = 0usize;
            let mut merged = 0usize;

            for raw in &records {
                let record_candidates = candidate_map
                    .get(&raw.source_record_id)
                    .map(Vec::as_slice);
                match pipeline.process(raw, record_candidates).await {
                    Ok(processed) => {
                        succeeded += 1;
                        if processed.canonical_id.is_some() {
                            merged += 1;
                        }
                        println!(
                            "   {} <- {}:{} (quality {:.3})",
                            processed.property_id,
                            processed.source_system,
                            processed.source_record_id,
                            processed.quality.score
                        );
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(
                            source = %raw.source_system,
                            source_id = %raw.source_record_id,
                            error = %e,
                            "record failed"
                        );
                    }
                }
            }

            println!("\n📊 Run results:");
            println!("   Total records: {}", records.len());
            println!("   Succeeded: {}", succeeded);
            println!("   Merged into existing: {}", merged);
            println!("   Failed: {}", failed);
        }
        Commands::Normalize { address } => {
            let normalized = normalize(&address);
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }
        Commands::Geocode { address } => {
            let resolver = GeocodingResolver::new(&config.geocoding)?;
            let normalized = normalize(&address);
            let query = normalized.formatted_address.as_deref().unwrap_or(&address);
            match resolver.geocode(query, None, None, None).await {
                Some(result) => {
                    info!(source = %result.source, "geocode succeeded");
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                None => {
                    println!("⚠️  No provider could geocode '{}'", address);
                }
            }
        }
    }

    Ok(())
}

fn load_records(path: &PathBuf) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)?;
    Ok(records)
}

fn load_candidates(path: &PathBuf) -> Result<HashMap<String, Vec<CandidateRecord>>> {
    let content = std::fs::read_to_string(path)?;
    let map: HashMap<String, Vec<CandidateRecord>> = serde_json::from_str(&content)?;
    Ok(map)
}
