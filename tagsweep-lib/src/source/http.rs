//! Tag directory reachable over HTTP.
//!
//! The directory exposes two endpoints below its base URL:
//!
//! - `GET items?limit=N[&marker=M]` returns
//!   `{"items": [{"name": .., "handle": ..}], "is_truncated": bool, "marker": ..}`
//! - `GET items/{name}/tags` returns `{"tags": [{"key": .., "value": ..}]}`
#![allow(clippy::module_name_repetitions)]

use async_trait::async_trait;
use http::{
    StatusCode,
    header::{self, HeaderMap, HeaderValue},
};
use log::{debug, trace};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use typed_builder::TypedBuilder;
use url::Url;

use super::{Page, PageSource, TagLookup};
use crate::retry::RetryExt;
use crate::{ErrorKind, Item, LookupError, Result, Tag, TagSet};

/// Default number of items requested per page, 10.
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Default user agent, `tagsweep-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("tagsweep/", env!("CARGO_PKG_VERSION"));

/// Builder for [`HttpDirectory`].
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `DirectoryBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `DirectoryBuilder`.
"))]
pub struct DirectoryBuilder {
    /// Base URL of the directory.
    #[builder(!default)]
    endpoint: Url,

    /// Number of items requested per page.
    #[builder(default = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Timeout for each request. `None` means no timeout.
    timeout: Option<Duration>,

    /// User-agent used for all requests.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Additional headers sent with every request.
    custom_headers: HeaderMap,

    /// Bearer token for the directory.
    token: Option<SecretString>,
}

impl DirectoryBuilder {
    /// Instantiates an [`HttpDirectory`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - the endpoint cannot be used as a base URL
    /// - the user-agent is not a valid header value
    /// - the page size is zero
    /// - the HTTP client cannot be built
    pub fn directory(self) -> Result<HttpDirectory> {
        let Self {
            endpoint,
            page_size,
            timeout,
            user_agent,
            custom_headers,
            token,
        } = self;

        if endpoint.cannot_be_a_base() {
            return Err(ErrorKind::InvalidEndpoint(
                endpoint.to_string(),
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        if page_size == 0 {
            return Err(ErrorKind::InvalidPage(
                "page size must not be zero".to_string(),
            ));
        }

        let mut headers = custom_headers;
        headers.insert(header::USER_AGENT, HeaderValue::try_from(&user_agent)?);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let builder = reqwest::ClientBuilder::new().default_headers(headers);
        let client = match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        }
        .build()
        .map_err(ErrorKind::BuildClient)?;

        Ok(HttpDirectory {
            client,
            endpoint,
            page_size,
            token,
        })
    }
}

/// Tag directory backed by an HTTP API.
///
/// `HttpDirectory` answers tag lookups itself; enumeration is done by the
/// [`HttpPages`] cursor returned from [`HttpDirectory::pages`].
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    endpoint: Url,
    page_size: usize,
    token: Option<SecretString>,
}

impl HttpDirectory {
    /// Start a new enumeration from the first page
    #[must_use]
    pub fn pages(&self) -> HttpPages {
        HttpPages {
            directory: self.clone(),
            marker: None,
            done: false,
        }
    }

    /// Base URL of the directory
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // Cannot fail, checked by `DirectoryBuilder::directory`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn fetch_page(&self, marker: Option<&str>) -> Result<PageResponse> {
        let mut url = self.url(&["items"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }

        trace!("Fetching page {url}");
        let response = self
            .get(url)
            .send()
            .await
            .map_err(ErrorKind::NetworkRequest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ErrorKind::RejectedStatusCode(status));
        }

        response
            .json::<PageResponse>()
            .await
            .map_err(|e| ErrorKind::InvalidPage(e.to_string()))
    }
}

#[async_trait]
impl TagLookup for HttpDirectory {
    async fn lookup(&self, item: &Item) -> std::result::Result<TagSet, LookupError> {
        let url = self.url(&["items", &item.name, "tags"]);
        trace!("Looking up tags of {item}");

        let response = self.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body = response
            .json::<TagsResponse>()
            .await
            .map_err(|e| LookupError::permanent(format!("Cannot decode tags: {e}")))?;
        Ok(body.tags.into_iter().collect())
    }
}

/// Cursor over the pages of an [`HttpDirectory`]
#[derive(Debug)]
pub struct HttpPages {
    directory: HttpDirectory,
    marker: Option<String>,
    done: bool,
}

#[async_trait]
impl PageSource for HttpPages {
    async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let response = self.directory.fetch_page(self.marker.as_deref()).await?;
        let has_more = response.is_truncated;

        if has_more {
            match response.marker {
                Some(marker) if self.marker.as_deref() != Some(marker.as_str()) => {
                    self.marker = Some(marker);
                }
                Some(marker) => {
                    return Err(ErrorKind::InvalidPage(format!(
                        "directory returned the same marker `{marker}` twice"
                    )));
                }
                None => {
                    return Err(ErrorKind::InvalidPage(
                        "truncated page without a marker".to_string(),
                    ));
                }
            }
        } else {
            self.done = true;
        }

        debug!(
            "Enumerated page with {} items (more: {has_more})",
            response.items.len()
        );
        Ok(Some(Page::new(response.items, has_more)))
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    items: Vec<Item>,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<Tag>,
}

fn request_error(e: reqwest::Error) -> LookupError {
    if e.should_retry() {
        LookupError::transient(e)
    } else {
        LookupError::permanent(e)
    }
}

fn status_error(status: StatusCode) -> LookupError {
    let message = format!("Directory responded with status code {status}");
    if status.should_retry() {
        LookupError::Transient(message)
    } else {
        LookupError::Permanent(message)
    }
}
