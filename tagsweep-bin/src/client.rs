use crate::options::{Config, HeaderMapExt};
use anyhow::{Context, Result};
use http::HeaderMap;
use std::time::Duration;
use tagsweep_lib::{DirectoryBuilder, HttpDirectory};

/// Creates a directory client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<HttpDirectory> {
    let endpoint = cfg
        .endpoint
        .clone()
        .context("No directory endpoint given; use `--endpoint` or `TAGSWEEP_ENDPOINT`")?;
    let timeout = (cfg.timeout > 0).then(|| Duration::from_secs(cfg.timeout));
    let headers = HeaderMap::from_header_pairs(&cfg.header)?;

    DirectoryBuilder::builder()
        .endpoint(endpoint)
        .page_size(cfg.page_size)
        .timeout(timeout)
        .user_agent(cfg.user_agent.clone())
        .custom_headers(headers)
        .token(cfg.token.clone())
        .build()
        .directory()
        .context("Failed to create directory client")
}
