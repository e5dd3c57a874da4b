use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::feed::fetcher::{self, FetchError};
use crate::storage::{Database, DatabaseError};
use crate::util::is_valid_domain;

use super::fallback;

/// Largest icon body accepted from the remote service
const MAX_ICON_BYTES: usize = 1024 * 1024;

/// Where the bytes returned by [`IconResolver::lookup`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSource {
    LocalFile,
    Store,
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIcon {
    pub data: Vec<u8>,
    pub source: IconSource,
}

#[derive(Debug, Clone)]
pub struct IconSettings {
    /// Remote favicon service; `{domain}` is replaced by the domain
    pub service_url: String,
    pub timeout: Duration,
    /// Directory of `<domain>.png` / `<domain>.ico` files checked first
    pub icon_dir: Option<PathBuf>,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            service_url: "https://www.google.com/s2/favicons?domain={domain}".to_string(),
            timeout: Duration::from_secs(10),
            icon_dir: None,
        }
    }
}

/// Memory of one icon-refresh pass.
///
/// Created at the start of a pass and dropped at its end, so a domain that
/// failed is retried on the next pass.
#[derive(Debug, Default)]
pub struct IconPass {
    failed: HashSet<String>,
    done: HashSet<String>,
}

impl IconPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failed(&self, domain: &str) -> bool {
        self.failed.contains(domain)
    }
}

/// What refreshing one domain did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconRefresh {
    /// New bytes fetched and stored
    Fetched,
    /// Already stored, already handled or failed in this pass, or invalid
    Skipped,
    /// Remote fetch failed; nothing stored
    Failed,
}

/// Totals for one icon-refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconPassReport {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Domains abandoned because of a store error
    pub errors: usize,
}

/// Domain-keyed icon cache: local file, store row, remote service, then the
/// built-in glyph.
pub struct IconResolver {
    db: Database,
    client: reqwest::Client,
    settings: IconSettings,
}

impl IconResolver {
    pub fn new(db: Database, client: reqwest::Client, settings: IconSettings) -> Self {
        Self {
            db,
            client,
            settings,
        }
    }

    /// Icon bytes for `domain`. Never fails; the generic icon is the last resort.
    pub async fn resolve(&self, domain: &str) -> Vec<u8> {
        self.lookup(domain).await.data
    }

    pub async fn lookup(&self, domain: &str) -> ResolvedIcon {
        let domain = domain.trim().to_lowercase();
        if !is_valid_domain(&domain) {
            tracing::debug!(domain = %domain, "Invalid icon domain, using fallback");
            return Self::generic();
        }

        if let Some(data) = self.local_icon(&domain).await {
            return ResolvedIcon {
                data,
                source: IconSource::LocalFile,
            };
        }

        match self.db.get_icon(&domain).await {
            Ok(Some(icon)) => {
                return ResolvedIcon {
                    data: icon.data,
                    source: IconSource::Store,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(domain = %domain, error = %e, "Icon lookup failed"),
        }

        match self.fetch_remote(&domain).await {
            Ok(data) => {
                if let Err(e) = self.db.upsert_icon(&domain, &data).await {
                    tracing::warn!(domain = %domain, error = %e, "Failed to store icon");
                }
                ResolvedIcon {
                    data,
                    source: IconSource::Remote,
                }
            }
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "Remote icon unavailable");
                Self::generic()
            }
        }
    }

    /// Refresh the stored icon of every feed's domain.
    ///
    /// Per-domain store errors are logged and the pass moves on.
    pub async fn refresh_all(&self, force: bool) -> Result<IconPassReport, DatabaseError> {
        let domains = self.db.list_feed_domains().await?;
        let mut pass = IconPass::new();
        let mut report = IconPassReport::default();

        for domain in &domains {
            match self.refresh_domain(domain, force, &mut pass).await {
                Ok(IconRefresh::Fetched) => report.fetched += 1,
                Ok(IconRefresh::Skipped) => report.skipped += 1,
                Ok(IconRefresh::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::warn!(domain = %domain, error = %e, "Icon refresh failed");
                    report.errors += 1;
                }
            }
        }

        tracing::debug!(
            domains = domains.len(),
            fetched = report.fetched,
            failed = report.failed,
            "Icon pass complete"
        );
        Ok(report)
    }

    /// Fetch and store the icon for one domain within `pass`.
    ///
    /// Without `force`, domains that already have a stored icon are left alone.
    pub async fn refresh_domain(
        &self,
        domain: &str,
        force: bool,
        pass: &mut IconPass,
    ) -> Result<IconRefresh, DatabaseError> {
        let domain = domain.trim().to_lowercase();
        if !is_valid_domain(&domain) || pass.failed.contains(&domain) || pass.done.contains(&domain)
        {
            return Ok(IconRefresh::Skipped);
        }

        if !force && self.db.get_icon(&domain).await?.is_some() {
            pass.done.insert(domain);
            return Ok(IconRefresh::Skipped);
        }

        match self.fetch_remote(&domain).await {
            Ok(data) => {
                let icon_id = self.db.upsert_icon(&domain, &data).await?;
                tracing::debug!(domain = %domain, icon_id, bytes = data.len(), "Icon stored");
                pass.done.insert(domain);
                Ok(IconRefresh::Fetched)
            }
            Err(e) => {
                tracing::info!(domain = %domain, error = %e, "Failed to fetch icon");
                pass.failed.insert(domain);
                Ok(IconRefresh::Failed)
            }
        }
    }

    async fn local_icon(&self, domain: &str) -> Option<Vec<u8>> {
        let dir = self.settings.icon_dir.as_ref()?;
        for ext in ["png", "ico"] {
            let path = dir.join(format!("{domain}.{ext}"));
            match tokio::fs::read(&path).await {
                Ok(data) if !data.is_empty() => return Some(data),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read icon file")
                }
            }
        }
        None
    }

    /// Remote fetch; an empty body counts as a failure.
    async fn fetch_remote(&self, domain: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.settings.service_url.replace("{domain}", domain);
        let data =
            fetcher::fetch_bytes(&self.client, &url, self.settings.timeout, MAX_ICON_BYTES).await?;
        if data.is_empty() {
            return Err(FetchError::Parse("empty icon body".to_string()));
        }
        Ok(data)
    }

    fn generic() -> ResolvedIcon {
        ResolvedIcon {
            data: fallback::generic_icon(),
            source: IconSource::Fallback,
        }
    }
}
