use crate::config::CrawlConfig;
use crate::core::duplicate::DuplicateDetector;
use crate::core::http::Transport;
use crate::core::manifest::{ManifestError, ManifestWriter};
use crate::core::scanner::{CrawlError, Crawler};
use log::info;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pages_visited: usize,
    pub candidates_found: usize,
    pub candidates_written: usize,
    pub pruned: usize,
    pub manifest_path: PathBuf,
    pub review_path: PathBuf,
}

/// Crawl, collapse near-duplicates, then write the manifest, approved
/// placeholder and review page. Clustering only starts once the crawl is
/// complete.
pub fn run<T: Transport>(config: &CrawlConfig, transport: T) -> Result<RunSummary, PipelineError> {
    let report = Crawler::new(config.clone(), transport)?.run()?;
    let pages_visited = report.visited.len();
    let candidates_found = report.candidates.len();

    let survivors = DuplicateDetector::default().cluster(report.candidates);
    info!(
        "{} candidate(s) collapsed into {} cluster(s)",
        candidates_found,
        survivors.len()
    );

    let output = ManifestWriter::new(&config.output_dir).write(&survivors)?;

    Ok(RunSummary {
        pages_visited,
        candidates_found,
        candidates_written: output.entries.len(),
        pruned: output.pruned.len(),
        manifest_path: output.manifest_path,
        review_path: output.review_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::core::hash::content_digest;
    use crate::core::http::RetryPolicy;
    use crate::core::manifest::ManifestEntry;
    use crate::core::perceptual::FingerprintAlgorithm;
    use crate::core::testing::{FakeSite, Reply, encode, horizontal_split, vertical_split};
    use image::ImageFormat;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CrawlConfig {
        let mut config = CrawlConfig::new("https://example.com", dir.path())
            .unwrap()
            .with_allowed_domains("cdn.example.net");
        config.rate_limit = Duration::ZERO;
        config.retry = RetryPolicy::default().without_backoff();
        config.filter = FilterConfig {
            min_bytes: 0,
            min_longest_side: 32,
        };
        config.fingerprint = FingerprintAlgorithm::Ahash;
        config
    }

    struct Fixture {
        site: FakeSite,
        png: Vec<u8>,
        bmp: Vec<u8>,
        other: Vec<u8>,
    }

    /// Two pages: the home page shows a PNG, the gallery shows the same
    /// picture as a heavier BMP plus an unrelated image.
    fn fixture() -> Fixture {
        let png = encode(&vertical_split(64, 64), ImageFormat::Png);
        let bmp = encode(&vertical_split(64, 64), ImageFormat::Bmp);
        let other = encode(&horizontal_split(64, 64), ImageFormat::Png);
        assert!(bmp.len() > png.len());

        let site = FakeSite::new()
            .route(
                "https://example.com/",
                Reply::html(
                    r#"<a href="/gallery">Gallery</a>
                       <img src="/img/split.png" alt="Split">"#,
                ),
            )
            .route(
                "https://example.com/gallery",
                Reply::html(
                    r#"<img src="https://cdn.example.net/split.bmp" alt="Split, full size">
                       <div style="background-image: url(/img/other.png)"></div>"#,
                ),
            )
            .route("https://example.com/img/split.png", Reply::image(png.clone()))
            .route("https://cdn.example.net/split.bmp", Reply::image(bmp.clone()))
            .route("https://example.com/img/other.png", Reply::image(other.clone()));

        Fixture {
            site,
            png,
            bmp,
            other,
        }
    }

    fn read_manifest(summary: &RunSummary) -> Vec<ManifestEntry> {
        serde_json::from_str(&fs::read_to_string(&summary.manifest_path).unwrap()).unwrap()
    }

    #[test]
    fn test_end_to_end_run() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = fixture();

        let summary = run(&config(&temp_dir), &fixture.site).unwrap();
        assert_eq!(summary.pages_visited, 2);
        assert_eq!(summary.candidates_found, 3);
        assert_eq!(summary.candidates_written, 2);

        let manifest = read_manifest(&summary);
        assert_eq!(manifest.len(), 2);

        assert_eq!(manifest[0].phash_cluster_id, "cluster-001");
        assert_eq!(manifest[0].id, content_digest(&fixture.bmp));
        assert_eq!(manifest[0].filename, format!("{}.bmp", content_digest(&fixture.bmp)));
        assert_eq!(manifest[0].source_page, "https://example.com/gallery");
        assert_eq!(manifest[0].alt, "Split, full size");
        assert_eq!(manifest[0].bytes, fixture.bmp.len());

        assert_eq!(manifest[1].phash_cluster_id, "cluster-002");
        assert_eq!(manifest[1].id, content_digest(&fixture.other));

        // The losing PNG is pruned; only survivors stay on disk.
        let png_name = format!("{}.png", content_digest(&fixture.png));
        assert!(!temp_dir.path().join(png_name).exists());
        for entry in &manifest {
            assert!(temp_dir.path().join(&entry.filename).exists());
        }
        assert!(summary.review_path.exists());
        assert!(temp_dir.path().join("approved-manifest.json").exists());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();

        let first = run(&config(&temp_dir), &fixture().site).unwrap();
        let manifest = fs::read(&first.manifest_path).unwrap();
        let review = fs::read(&first.review_path).unwrap();

        let second = run(&config(&temp_dir), &fixture().site).unwrap();
        assert_eq!(fs::read(&second.manifest_path).unwrap(), manifest);
        assert_eq!(fs::read(&second.review_path).unwrap(), review);
        assert_eq!(second.candidates_written, first.candidates_written);
    }

    #[test]
    fn test_stale_files_from_previous_run_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let stale = temp_dir.path().join("00000000deadbeef.jpg");
        fs::write(&stale, b"old run").unwrap();

        let summary = run(&config(&temp_dir), &fixture().site).unwrap();
        assert!(!stale.exists());
        assert!(summary.pruned >= 1);
    }

    #[test]
    fn test_duplicate_bytes_keep_first_url() {
        let temp_dir = TempDir::new().unwrap();
        let png = encode(&vertical_split(64, 64), ImageFormat::Png);
        let site = FakeSite::new()
            .route(
                "https://example.com/",
                Reply::html(r#"<img src="/first.png" alt="first"><img src="/second.png" alt="second">"#),
            )
            .route("https://example.com/first.png", Reply::image(png.clone()))
            .route("https://example.com/second.png", Reply::image(png.clone()));

        let summary = run(&config(&temp_dir), &site).unwrap();
        let manifest = read_manifest(&summary);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].source_image_url, "https://example.com/first.png");
        assert_eq!(manifest[0].alt, "first");

        let images = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
            .count();
        assert_eq!(images, 1);
    }

    #[test]
    fn test_empty_site_still_writes_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let site = FakeSite::new().route("https://example.com/", Reply::html("<p>No photos yet</p>"));

        let summary = run(&config(&temp_dir), &site).unwrap();
        assert_eq!(summary.candidates_written, 0);
        assert_eq!(fs::read_to_string(&summary.manifest_path).unwrap(), "[]\n");
    }

    #[test]
    fn test_unwritable_output_dir_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let mut config = config(&temp_dir);
        config.output_dir = blocker.join("out");
        let site = FakeSite::new();

        assert!(matches!(run(&config, &site), Err(PipelineError::Crawl(_))));
        assert!(site.requests().is_empty());
    }
}
