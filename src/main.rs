use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use siteharvest::config::DEFAULT_USER_AGENT;
use siteharvest::core::http::HttpTransport;
use siteharvest::core::perceptual::FingerprintAlgorithm;
use siteharvest::{CrawlConfig, FilterConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "siteharvest",
    version,
    about = "Harvest candidate photos from a public website for human review"
)]
struct Cli {
    /// Page to start crawling from (http or https)
    #[arg(long, value_name = "URL")]
    start_url: String,

    /// Maximum number of pages to visit
    #[arg(long, default_value_t = 200)]
    max_pages: usize,

    /// Maximum link depth from the start page
    #[arg(long, default_value_t = 3)]
    max_depth: usize,

    /// Minimum delay between requests, in milliseconds
    #[arg(long, default_value_t = 800)]
    rate_limit_ms: u64,

    /// Directory for images, manifest.json and review.html
    #[arg(long, value_name = "DIR", default_value = "./candidates")]
    output_dir: PathBuf,

    /// Comma-separated hostnames images may be downloaded from
    #[arg(long, value_name = "HOSTS", default_value = "")]
    allow_domains: String,

    /// User agent sent with every request and matched against robots.txt
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Smallest accepted image file, in bytes
    #[arg(long, default_value_t = FilterConfig::default().min_bytes)]
    min_bytes: usize,

    /// Smallest accepted longest side, in pixels
    #[arg(long, default_value_t = FilterConfig::default().min_longest_side)]
    min_side: u32,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Perceptual hash used to group near-duplicates
    #[arg(long, value_enum, default_value_t = FingerprintAlgorithm::Phash)]
    fingerprint: FingerprintAlgorithm,

    /// Log every skipped page and image
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<CrawlConfig> {
        let mut config = CrawlConfig::new(&self.start_url, self.output_dir)?
            .with_max_pages(self.max_pages)?
            .with_allowed_domains(&self.allow_domains);
        config.max_depth = self.max_depth;
        config.rate_limit = Duration::from_millis(self.rate_limit_ms);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.user_agent = self.user_agent;
        config.filter = FilterConfig {
            min_bytes: self.min_bytes,
            min_longest_side: self.min_side,
        };
        config.fingerprint = self.fingerprint;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        "info,siteharvest=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .format_target(false)
        .init();

    let config = cli.into_config()?;
    println!(
        "▶ Crawling {} (max {} pages, depth {})",
        config.start_url, config.max_pages, config.max_depth
    );
    println!(
        "▶ Image hosts: {}",
        config.allowlist.domains().collect::<Vec<_>>().join(", ")
    );

    let transport = HttpTransport::new(&config.user_agent, config.timeout, config.allowlist.clone())
        .context("Failed to build HTTP client")?;
    let summary = benchmark("harvest", || siteharvest::run(&config, transport))
        .with_context(|| format!("Harvest into {:?} failed", config.output_dir))?;

    println!();
    println!("✅ Crawl complete. Pages visited: {}", summary.pages_visited);
    println!(
        "   Candidates written: {} (from {} accepted, {} stale file(s) pruned)",
        summary.candidates_written, summary.candidates_found, summary.pruned
    );
    println!("   Manifest: {}", summary.manifest_path.display());
    println!("   Review page: {}", summary.review_path.display());
    println!("⚠️  Human review is required before using any image in production.");
    Ok(())
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
