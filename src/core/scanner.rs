use crate::config::CrawlConfig;
use crate::core::candidate::Candidate;
use crate::core::extract::{ExtractError, Extractor, ImageRef};
use crate::core::hash::{ContentStore, StoreError, content_digest};
use crate::core::http::{Session, Transport};
use crate::core::image::{self as intake, ImageFilter, Rejection};
use crate::core::perceptual::Fingerprinter;
use crate::core::robots::RobotsPolicy;
use crate::core::urls::{canonical_page, canonicalize};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Extractor setup failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// What a finished crawl produced.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Canonical URLs of visited pages, in visit order.
    pub visited: Vec<String>,
    /// Accepted images, in discovery order.
    pub candidates: Vec<Candidate>,
    /// Distinct image URLs considered, accepted or not.
    pub images_seen: usize,
}

enum Intake {
    Accepted(Candidate),
    Rejected(Rejection),
}

/// Breadth-first crawl of one site, harvesting candidate images as it goes.
pub struct Crawler<T> {
    config: CrawlConfig,
    session: Session<T>,
    extractor: Extractor,
    filter: ImageFilter,
    fingerprinter: Fingerprinter,
    store: ContentStore,
}

impl<T: Transport> Crawler<T> {
    pub fn new(config: CrawlConfig, transport: T) -> Result<Self, CrawlError> {
        let session = Session::new(transport, config.rate_limit, config.retry);
        let store = ContentStore::open(&config.output_dir)?;
        Ok(Self {
            extractor: Extractor::new()?,
            filter: ImageFilter::new(config.filter),
            fingerprinter: Fingerprinter::new(config.fingerprint),
            session,
            store,
            config,
        })
    }

    pub fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let robots = RobotsPolicy::fetch(&mut self.session, &self.config.start_url);
        let base_host = self.config.base_host().to_string();
        info!(
            "Crawling {} with {:?} fingerprints",
            self.config.start_url,
            self.fingerprinter.algorithm()
        );

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();
        queue.push_back((canonicalize(&self.config.start_url), 0));

        let mut visited: HashSet<String> = HashSet::new();
        let mut report = CrawlReport::default();
        let mut seen_images: HashSet<String> = HashSet::new();

        while report.visited.len() < self.config.max_pages {
            let Some((page_url, depth)) = queue.pop_front() else {
                break;
            };
            let key = canonical_page(&page_url);
            if visited.contains(&key) || depth > self.config.max_depth {
                continue;
            }
            if !robots.allows(&self.config.user_agent, &key) {
                debug!("Skipping {}: disallowed by robots.txt", key);
                continue;
            }

            let fetched = self.session.fetch(&page_url);
            visited.insert(key.clone());
            report.visited.push(key.clone());

            let resp = match fetched {
                Ok(resp) => resp,
                Err(e) => {
                    debug!("Skipping page {}: {}", key, e);
                    continue;
                }
            };
            if !resp.is_html() {
                debug!("Not parsing {}: content type {:?}", key, resp.content_type);
                continue;
            }

            info!("crawl {} (depth={})", key, depth);
            let content = self.extractor.extract(&resp.text(), &page_url, &base_host);

            if depth < self.config.max_depth {
                for link in content.links {
                    if !visited.contains(&canonical_page(&link)) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            for image in content.images {
                if !seen_images.insert(image.url.to_string()) {
                    continue;
                }
                match self.harvest_image(&key, &image)? {
                    Intake::Accepted(candidate) => {
                        info!(
                            "  img {} {}x{} {} bytes",
                            candidate.filename, candidate.width, candidate.height, candidate.byte_size
                        );
                        report.candidates.push(candidate);
                    }
                    Intake::Rejected(reason) => debug!("  skip {}: {}", image.url, reason),
                }
            }

            spinner.set_message(format!(
                "{} page(s) visited, {} candidate(s)",
                report.visited.len(),
                report.candidates.len()
            ));
        }

        report.images_seen = seen_images.len();
        spinner.finish_and_clear();
        info!(
            "Crawl finished: {} page(s), {} image URL(s), {} candidate(s), {} request(s)",
            report.visited.len(),
            report.images_seen,
            report.candidates.len(),
            self.session.request_count()
        );
        Ok(report)
    }

    /// Download, decode, filter and store one image. Only storage failures
    /// are errors; everything else is a rejection.
    fn harvest_image(&mut self, page: &str, image: &ImageRef) -> Result<Intake, StoreError> {
        let url = &image.url;
        if !self.config.allowlist.permits(url) {
            return Ok(Intake::Rejected(Rejection::DisallowedHost));
        }
        if let Err(reason) = intake::prefilter(url) {
            return Ok(Intake::Rejected(reason));
        }

        let bytes = match self.session.fetch(url) {
            Ok(resp) => resp.body,
            Err(e) => return Ok(Intake::Rejected(e.into())),
        };
        if intake::is_svg(&bytes) {
            return Ok(Intake::Rejected(Rejection::Vector));
        }
        let decoded = match intake::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(reason) => return Ok(Intake::Rejected(reason)),
        };

        if let Err(reason) = self
            .filter
            .check(url, bytes.len(), decoded.width, decoded.height)
        {
            return Ok(Intake::Rejected(reason));
        }
        let extension = intake::choose_extension(url, decoded.format);

        let fingerprint = self.fingerprinter.fingerprint(&decoded.image);
        let id = content_digest(&bytes);
        let filename = format!("{}.{}", id, extension);
        self.store.persist(&filename, &bytes)?;

        Ok(Intake::Accepted(Candidate {
            id,
            filename,
            source_page: page.to_string(),
            source_image_url: url.to_string(),
            alt: image.alt.clone(),
            width: decoded.width,
            height: decoded.height,
            byte_size: bytes.len(),
            fingerprint,
            cluster_id: None,
        }))
    }
}
