//! Sumo Logic collector client
//!
//! A [`Collector`] wraps one remote collector: its name, the API credentials
//! and lazily fetched views of the collector listing and of its sources.
//! Every mutating call invalidates the source cache, and [`Collector::refresh`]
//! re-reads both listings.
//!
//! Calls that take a `timeout` are retried with a linear backoff until the
//! deadline elapses (see [`retry`]); without one a failure is returned after a
//! single attempt.

pub mod api;
pub mod cache;
pub mod error;
pub mod model;
pub mod retry;

pub use api::{
    ApiRequest, Credentials, RawResponse, SumoApi, DEFAULT_API_ENDPOINT, DEFAULT_REQUEST_TIMEOUT,
};
pub use cache::Cached;
pub use error::{Result, SumoError};
pub use model::{CollectorInfo, CollectorList, Source, SourceList, SourceSpec};
pub use retry::RetryPolicy;

use crate::config::SumoConfig;
use model::SourceEnvelope;
use regex::Regex;
use reqwest::header::ETAG;
use std::time::Duration;
use tracing::debug;

/// How a collector name from the listing is matched against ours
#[derive(Debug, Clone)]
enum NameMatcher {
    Exact(String),
    /// Also accepts `<name>-<13 digit millisecond timestamp>`
    Timestamped { name: String, pattern: Regex },
}

impl NameMatcher {
    fn new(name: &str, timestamped: bool) -> Result<Self> {
        if !timestamped {
            return Ok(NameMatcher::Exact(name.to_string()));
        }
        let pattern = Regex::new(&format!("^{}-[0-9]{{13}}$", regex::escape(name)))?;
        Ok(NameMatcher::Timestamped {
            name: name.to_string(),
            pattern,
        })
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            NameMatcher::Exact(name) => candidate == name,
            NameMatcher::Timestamped { name, pattern } => {
                candidate == name || pattern.is_match(candidate)
            }
        }
    }
}

/// Client for one Sumo Logic collector and its sources
#[derive(Debug)]
pub struct Collector {
    name: String,
    matcher: NameMatcher,
    api: SumoApi,
    collectors_limit: Option<u32>,
    read_timeout: Option<RetryPolicy>,
    collectors: Cached<CollectorList>,
    sources: Cached<Vec<Source>>,
}

impl Collector {
    pub fn new(name: impl Into<String>, api: SumoApi) -> Self {
        let name = name.into();
        Self {
            matcher: NameMatcher::Exact(name.clone()),
            name,
            api,
            collectors_limit: None,
            read_timeout: None,
            collectors: Cached::new(),
            sources: Cached::new(),
        }
    }

    /// Build a collector client from the API settings
    pub fn from_config(config: &SumoConfig, name: impl Into<String>) -> Result<Self> {
        let api = SumoApi::new(
            config.api_endpoint.clone(),
            Credentials::new(config.username.clone(), config.password.clone()),
            Duration::from_secs(config.request_timeout),
        )?;

        Collector::new(name, api)
            .collectors_limit(config.api_collectors_limit)
            .read_timeout(RetryPolicy::from_secs(config.timeout))
            .match_timestamped_names(config.match_timestamped_names)
    }

    /// Request at most `limit` collectors per listing
    pub fn collectors_limit(mut self, limit: Option<u32>) -> Self {
        self.collectors_limit = limit;
        self
    }

    /// Retry budget used for the cached listings
    pub fn read_timeout(mut self, policy: Option<RetryPolicy>) -> Self {
        self.read_timeout = policy;
        self
    }

    pub fn match_timestamped_names(mut self, enabled: bool) -> Result<Self> {
        self.matcher = NameMatcher::new(&self.name, enabled)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api(&self) -> &SumoApi {
        &self.api
    }

    /// Fetch the collector listing, bypassing the cache
    pub async fn list_collectors(&self, timeout: Option<RetryPolicy>) -> Result<CollectorList> {
        fetch_collectors(&self.api, self.collectors_limit, timeout).await
    }

    /// Cached collector listing
    pub async fn collectors(&mut self) -> Result<&[CollectorInfo]> {
        let Self {
            ref api,
            ref mut collectors,
            collectors_limit,
            read_timeout,
            ..
        } = *self;
        let list = collectors
            .get_or_try_fetch(|| fetch_collectors(api, collectors_limit, read_timeout))
            .await?;
        Ok(&list.collectors)
    }

    /// The listing entry of this collector, if it exists
    pub async fn metadata(&mut self) -> Result<Option<&CollectorInfo>> {
        let Self {
            ref api,
            ref matcher,
            ref mut collectors,
            collectors_limit,
            read_timeout,
            ..
        } = *self;
        let list = collectors
            .get_or_try_fetch(|| fetch_collectors(api, collectors_limit, read_timeout))
            .await?;
        Ok(list.collectors.iter().find(|c| matcher.matches(&c.name)))
    }

    pub async fn exists(&mut self) -> Result<bool> {
        Ok(self.metadata().await?.is_some())
    }

    /// Remote id of this collector
    pub async fn id(&mut self) -> Result<u64> {
        let id = self.metadata().await?.map(|c| c.id);
        id.ok_or_else(|| SumoError::CollectorNotFound(self.name.clone()))
    }

    /// Cached sources of this collector
    pub async fn sources(&mut self) -> Result<&[Source]> {
        let id = self.id().await?;
        let Self {
            ref api,
            ref mut sources,
            read_timeout,
            ..
        } = *self;
        let list = sources
            .get_or_try_fetch(|| fetch_sources(api, id, read_timeout))
            .await?;
        Ok(list.as_slice())
    }

    /// Whether a source named `name` exists. False when the collector itself
    /// does not exist.
    pub async fn source_exists(&mut self, name: &str) -> Result<bool> {
        if !self.exists().await? {
            return Ok(false);
        }
        Ok(self.sources().await?.iter().any(|s| s.name == name))
    }

    pub async fn source(&mut self, name: &str) -> Result<Option<&Source>> {
        Ok(self.sources().await?.iter().find(|s| s.name == name))
    }

    /// Remote id of the source named `name`
    pub async fn source_id(&mut self, name: &str) -> Result<u64> {
        let id = self.source(name).await?.map(|s| s.id);
        id.ok_or_else(|| SumoError::SourceNotFound {
            name: name.to_string(),
            collector: self.name.clone(),
        })
    }

    /// Create a source. The response body is returned unparsed.
    pub async fn add_source(
        &mut self,
        spec: &SourceSpec,
        timeout: Option<RetryPolicy>,
    ) -> Result<RawResponse> {
        let id = self.id().await?;
        let request = ApiRequest::post(self.api.url(&format!("collectors/{}/sources", id)))
            .json(&SourceEnvelope::create(spec))?;

        debug!(collector = %self.name, source = %spec.name, "Adding source");
        let response = self.api.request(&request, timeout).await;
        self.sources.invalidate();
        response
    }

    /// Replace source `source_id` with `spec`.
    ///
    /// Every attempt fetches the current etag and sends it as `If-Match`, so
    /// the write only lands on the version that was just read.
    pub async fn update_source(
        &mut self,
        source_id: u64,
        spec: &SourceSpec,
        timeout: Option<RetryPolicy>,
    ) -> Result<RawResponse> {
        let id = self.id().await?;
        let url = self.api.url(&format!("collectors/{}/sources/{}", id, source_id));
        let request = ApiRequest::put(url.as_str()).json(&SourceEnvelope::update(spec, source_id))?;

        debug!(collector = %self.name, source = %spec.name, source_id, "Updating source");
        let api = &self.api;
        let (url, request) = (&url, &request);
        let response = retry::run(timeout, move || async move {
            let etag = fetch_etag(api, url, source_id).await?;
            api.execute(&request.clone().if_match(etag)).await
        })
        .await;
        self.sources.invalidate();
        response
    }

    /// Delete source `source_id`
    pub async fn delete_source(
        &mut self,
        source_id: u64,
        timeout: Option<RetryPolicy>,
    ) -> Result<RawResponse> {
        let id = self.id().await?;
        let request =
            ApiRequest::delete(self.api.url(&format!("collectors/{}/sources/{}", id, source_id)));

        debug!(collector = %self.name, source_id, "Deleting source");
        let response = self.api.request(&request, timeout).await;
        self.sources.invalidate();
        response
    }

    /// Current etag of source `source_id`
    pub async fn etag(&mut self, source_id: u64, timeout: Option<RetryPolicy>) -> Result<String> {
        let id = self.id().await?;
        let url = self.api.url(&format!("collectors/{}/sources/{}", id, source_id));
        let api = &self.api;
        let url = &url;
        retry::run(timeout, move || fetch_etag(api, url, source_id)).await
    }

    /// Drop both caches and read them again from the API
    pub async fn refresh(&mut self) -> Result<()> {
        self.collectors.invalidate();
        self.sources.invalidate();
        self.sources().await?;
        Ok(())
    }
}

async fn fetch_collectors(
    api: &SumoApi,
    limit: Option<u32>,
    timeout: Option<RetryPolicy>,
) -> Result<CollectorList> {
    let path = match limit {
        Some(limit) => format!("collectors?limit={}", limit),
        None => "collectors".to_string(),
    };
    api.request_json(&ApiRequest::get(api.url(&path)), timeout)
        .await
}

async fn fetch_sources(
    api: &SumoApi,
    collector_id: u64,
    timeout: Option<RetryPolicy>,
) -> Result<Vec<Source>> {
    let request = ApiRequest::get(api.url(&format!("collectors/{}/sources", collector_id)));
    let list: SourceList = api.request_json(&request, timeout).await?;
    Ok(list.sources)
}

/// Single attempt: read one source and return its `ETag` header
async fn fetch_etag(api: &SumoApi, url: &str, source_id: u64) -> Result<String> {
    let response = api.execute(&ApiRequest::get(url)).await?;
    response
        .header(ETAG.as_str())
        .map(str::to_string)
        .ok_or(SumoError::MissingEtag(source_id))
}
