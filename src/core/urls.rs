use std::collections::BTreeSet;
use url::Url;

/// Scheme + host + path, with query and fragment removed.
pub fn canonicalize(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_query(None);
    canonical.set_fragment(None);
    canonical
}

/// String form of [`canonicalize`], used as the frontier's visited key.
pub fn canonical_page(url: &Url) -> String {
    canonicalize(url).to_string()
}

/// Resolve an attribute value against the page URL.
///
/// Empty values and `data:` / `javascript:` pseudo-URLs yield `None`.
pub fn normalize_url(page_url: &Url, value: &str) -> Option<Url> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("data:") || lowered.starts_with("javascript:") {
        return None;
    }
    page_url.join(raw).ok()
}

/// Last non-empty path segment, e.g. `photo.jpg` for `/a/photo.jpg?w=2`.
pub fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
}

/// Lower-cased extension of the last path segment, without the dot.
pub fn path_extension(url: &Url) -> Option<String> {
    let name = file_name(url);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Hostnames that images may be downloaded from.
///
/// A host matches an entry exactly or as a subdomain of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    domains: BTreeSet<String>,
}

impl Allowlist {
    pub fn parse(domains: &str, start_url: &Url) -> Self {
        let mut set: BTreeSet<String> = domains
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if let Some(host) = start_url.host_str() {
            set.insert(host.to_ascii_lowercase());
        }
        Self { domains: set }
    }

    pub fn permits_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn permits(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| self.permits_host(host))
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}
