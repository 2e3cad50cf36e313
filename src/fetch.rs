//! Download conference websites into the source cache.

use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::{conference::Conference, config::{FetchConfig, Paths}};

/// Pseudo-id that selects every conference in the index.
pub const ALL_CONFERENCES: &str = "_all";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { url: String, path: PathBuf },
    /// Nothing to download; not a failure.
    Skipped { reason: String },
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_failure(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FetchSummary {
    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success { .. } => self.succeeded += 1,
            FetchOutcome::Skipped { .. } => self.skipped += 1,
            FetchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct Fetcher {
    http: Client,
    paths: Paths,
}

impl Fetcher {
    pub fn new(paths: Paths, cfg: &FetchConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(cfg.timeout())
            .user_agent(cfg.user_agent())
            .build()?;
        Ok(Self { http, paths })
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, conference_id: &str, year: i64) -> FetchOutcome {
        let conf = match Conference::load(&self.paths, conference_id) {
            Ok(c) => c,
            Err(e) => return FetchOutcome::Failed { reason: e.to_string() },
        };
        let Some(url) = conf.website_for(year) else {
            return FetchOutcome::Skipped {
                reason: format!("no website found for conference '{conference_id}' year {year}"),
            };
        };
        let path = self.paths.source_file(year, conference_id);
        match self.download(url, &path).await {
            Ok(()) => FetchOutcome::Success { url: url.to_string(), path },
            Err(reason) => FetchOutcome::Failed { reason },
        }
    }

    /// Fetch every id in order; `on_result` sees each outcome as it lands.
    pub async fn fetch_all(
        &self,
        conference_ids: &[String],
        year: i64,
        mut on_result: impl FnMut(&str, &FetchOutcome),
    ) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for id in conference_ids {
            let outcome = self.fetch(id, year).await;
            on_result(id, &outcome);
            summary.record(&outcome);
        }
        summary
    }

    async fn download(&self, url: &str, path: &Path) -> Result<(), String> {
        debug!(%url, "GET");
        let body = async {
            self.http.get(url).send().await?.error_for_status()?.text().await
        }
        .await
        .map_err(|e| format!("error downloading {url}: {e}"))?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await
                .map_err(|e| format!("error creating {}: {e}", dir.display()))?;
        }
        tokio::fs::write(path, body).await
            .map_err(|e| format!("error saving file to {}: {e}", path.display()))
    }
}
