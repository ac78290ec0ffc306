use change_detection::{
    ChangeDetectionResult, ChangeDetectionService, MemoryStore, Pipeline, WmsFetcher,
    config::DetectionConfig,
    imagery,
};
use clap::{Parser, Subcommand};
use cli::DetectionBatch;
use color_eyre::eyre::{Result, eyre};
use geo_common::DetectionRequest;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect changes in one extent between two dates
    Detect {
        /// Extent as minX,minY,maxX,maxY
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        bounds: Vec<f64>,
        /// Capture date of the "before" snapshot (YYYY-MM-DD)
        #[arg(long)]
        before: String,
        /// Capture date of the "after" snapshot (YYYY-MM-DD)
        #[arg(long)]
        after: String,
        /// Service configuration file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where to write the full JSON result
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Where to write the difference mask PNG
        #[arg(long)]
        difference_png: Option<PathBuf>,
    },
    /// Run every job of a batch file
    Process {
        /// Path to the batch file (.toml or .json)
        #[arg(short, long)]
        batch: PathBuf,
    },
    /// Compare two local image files without fetching imagery
    Diff {
        #[arg(long)]
        before: PathBuf,
        #[arg(long)]
        after: PathBuf,
        /// Where to write the difference mask PNG
        #[arg(long)]
        difference_png: Option<PathBuf>,
    },
    /// List the free imagery services
    Services {
        /// Probe every WMS service and report availability
        #[arg(long)]
        check_health: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Detect {
            bounds,
            before,
            after,
            config,
            output,
            difference_png,
        } => {
            let request = DetectionRequest {
                bounds: bounds.clone(),
                before_date: before.clone(),
                after_date: after.clone(),
            };
            detect(&request, config.as_deref(), output.as_deref(), difference_png.as_deref()).await?;
        }
        Commands::Process { batch } => {
            process_batch(batch).await?;
        }
        Commands::Diff {
            before,
            after,
            difference_png,
        } => {
            diff_files(before, after, difference_png.as_deref()).await?;
        }
        Commands::Services { check_health } => {
            list_services(*check_health).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DetectionConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DetectionConfig::from_file(path)?
        }
        None => DetectionConfig::default(),
    };
    Ok(config.apply_env())
}

fn build_service(config: DetectionConfig) -> Result<ChangeDetectionService<WmsFetcher, MemoryStore>> {
    let store = config.cache.store();
    Ok(ChangeDetectionService::new(WmsFetcher::new(config.wms)?, store))
}

fn summarize(result: &ChangeDetectionResult) {
    info!(
        "{:.2}% of pixels changed, {} region(s)",
        result.change_percentage,
        result.changed_areas.len()
    );
    for (i, area) in result.changed_areas.iter().enumerate() {
        info!("  region {}: {} (confidence {:.2})", i + 1, area.bounds, area.confidence);
    }
}

async fn detect(
    request: &DetectionRequest,
    config_path: Option<&Path>,
    output: Option<&Path>,
    difference_png: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    info!("Fetching imagery from {} ({})", config.wms.base_url, config.wms.layer);

    let service = build_service(config)?;
    let result = service.detect(request).await?;
    summarize(&result);

    match output {
        Some(path) => {
            std::fs::write(path, result.to_json_pretty()?)?;
            info!("Result saved to {:?}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&result.changed_areas)?),
    }

    if let Some(path) = difference_png {
        std::fs::write(path, &result.difference_image)?;
        info!("Difference mask saved to {:?}", path);
    }

    Ok(())
}

async fn process_batch(batch_path: &Path) -> Result<()> {
    let batch = DetectionBatch::from_file(batch_path)?;
    info!("Loaded batch with {} job(s)", batch.jobs.len());

    let config = load_config(batch.config.as_deref().map(Path::new))?;
    let service = build_service(config)?;

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(batch.output_dir())?;

    let mut failed = Vec::new();
    for job in &batch.jobs {
        info!("Processing job '{}'", job.name);

        let result = match service.detect(&job.request()).await {
            Ok(result) => result,
            Err(e) => {
                error!("Job '{}' failed: {}", job.name, e);
                failed.push(job.name.clone());
                continue;
            }
        };
        summarize(&result);

        std::fs::write(job.result_path(batch.output_dir()), result.to_json_pretty()?)?;
        std::fs::write(job.difference_path(batch.output_dir()), &result.difference_image)?;
    }

    if !failed.is_empty() {
        return Err(eyre!("{} of {} job(s) failed: {}", failed.len(), batch.jobs.len(), failed.join(", ")));
    }

    info!("Batch completed, results in {}", batch.output_dir);
    Ok(())
}

async fn diff_files(before: &Path, after: &Path, difference_png: Option<&Path>) -> Result<()> {
    let before_bytes = std::fs::read(before)?;
    let after_bytes = std::fs::read(after)?;

    let analysis = tokio::task::spawn_blocking(move || Pipeline::default().analyze(&before_bytes, &after_bytes))
        .await??;

    info!(
        "Compared {}x{} pixels: {} changed ({:.2}%), {} region(s)",
        analysis.width,
        analysis.height,
        analysis.changed_pixel_count,
        analysis.change_percentage,
        analysis.changed_areas.len()
    );
    println!("{}", serde_json::to_string_pretty(&analysis.changed_areas)?);

    if let Some(path) = difference_png {
        std::fs::write(path, &analysis.difference_image)?;
        info!("Difference mask saved to {:?}", path);
    }

    Ok(())
}

async fn list_services(check_health: bool) -> Result<()> {
    let catalog = if check_health {
        info!("Probing WMS services");
        let client = imagery::health_client()?;
        serde_json::to_value(imagery::available_services(&client).await)?
    } else {
        serde_json::json!({
            "wms": imagery::free_wms_services(),
            "tiles": imagery::free_tile_services(),
        })
    };
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
