use crate::core::http::{Response, Session, Transport};
use log::{debug, info, warn};
use robotstxt::DefaultMatcher;
use url::Url;

/// The site's published crawl policy for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsPolicy {
    AllowAll,
    DisallowAll,
    Rules(String),
}

impl RobotsPolicy {
    pub fn robots_url(site: &Url) -> Option<Url> {
        site.join("/robots.txt").ok()
    }

    /// Fetch `/robots.txt` once through the session.
    ///
    /// An unreachable robots file allows everything; the crawl is still
    /// bounded by the page and depth limits.
    pub fn fetch<T: Transport>(session: &mut Session<T>, site: &Url) -> Self {
        let Some(robots_url) = Self::robots_url(site) else {
            return RobotsPolicy::AllowAll;
        };

        match session.polite_get(&robots_url) {
            Ok(resp) => {
                let policy = Self::from_response(&resp);
                info!("robots.txt {} (HTTP {}): {}", robots_url, resp.status, policy.describe());
                policy
            }
            Err(e) => {
                warn!("Could not fetch {}: {}; proceeding without robots rules", robots_url, e);
                RobotsPolicy::AllowAll
            }
        }
    }

    pub fn from_response(resp: &Response) -> Self {
        match resp.status {
            200..=299 => RobotsPolicy::Rules(resp.text()),
            401 | 403 => RobotsPolicy::DisallowAll,
            400..=499 => RobotsPolicy::AllowAll,
            _ => RobotsPolicy::DisallowAll,
        }
    }

    pub fn allows(&self, user_agent: &str, url: &str) -> bool {
        match self {
            RobotsPolicy::AllowAll => true,
            RobotsPolicy::DisallowAll => false,
            RobotsPolicy::Rules(body) => {
                let mut matcher = DefaultMatcher::default();
                let allowed =
                    matcher.one_agent_allowed_by_robots(body, product_token(user_agent), url);
                if !allowed {
                    debug!("robots.txt disallows {}", url);
                }
                allowed
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            RobotsPolicy::AllowAll => "allow all",
            RobotsPolicy::DisallowAll => "disallow all",
            RobotsPolicy::Rules(_) => "rules loaded",
        }
    }
}

/// `siteharvest/0.1 (+info)` matches robots groups named `siteharvest`.
fn product_token(user_agent: &str) -> &str {
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}
