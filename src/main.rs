use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use subprobe::{
    proxy::{CrawlerConfig, GeoClassifier, GeoLocator, ProbeProgress, SourceCrawler},
    Pipeline, Settings,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Aggregate subscription sources, probe every endpoint and write ranked subscriptions
#[derive(Parser)]
#[command(name = "subprobe")]
#[command(about = "Aggregate subscription sources, probe endpoints and write ranked subscriptions")]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, default_value = "settings.json")]
    config: PathBuf,

    /// GeoLite2/GeoIP2 country database; countries are unknown if it is missing
    #[arg(short, long, default_value = "GeoLite2-Country.mmdb")]
    geoip: PathBuf,

    /// Maximum number of probes in flight
    #[arg(short = 'n', long, default_value = "200")]
    concurrency: usize,

    /// Seed for the brand/emoji draws
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("subprobe=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let settings = Settings::load(&cli.config)?;
    info!(config = %cli.config.display(), sources = settings.locators().len(), "settings loaded");

    let classifier = GeoClassifier::from_locator(GeoLocator::open_optional(&cli.geoip));
    let pipeline = Pipeline::new(&settings, cli.concurrency, classifier);
    pipeline.writer().setup_directories()?;

    println!("📥 Collecting descriptors from {} sources...", settings.locators().len());
    let crawler = SourceCrawler::with_config(CrawlerConfig::new())?;
    let (descriptors, crawl_results) = crawler.crawl_all(settings.locators()).await;
    let failed = crawl_results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        warn!(failed, total = crawl_results.len(), "some sources could not be fetched");
    }
    println!("🔬 {} unique descriptors ready for probing", descriptors.len());

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let summary = pipeline
        .process(descriptors, &mut rng, print_progress)
        .await?;

    if summary.nothing_found() {
        println!("🔴 0 reachable endpoints found, nothing written");
    } else {
        println!(
            "✅ {} of {} endpoints reachable, {} files written to {}",
            summary.reachable,
            summary.probed,
            summary.files.len(),
            settings.out_dir.display()
        );
    }
    println!(
        "✨ Finished in {:.2} seconds",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_progress(progress: ProbeProgress) {
    let mut stderr = io::stderr().lock();
    let _ = write!(
        stderr,
        "\r🧪 Probed {}/{} | ✅ Reachable: {}",
        progress.completed, progress.total, progress.reachable
    );
    if progress.is_complete() {
        let _ = writeln!(stderr);
    }
}
