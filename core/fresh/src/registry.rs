//! Client for the OCI Distribution v2 tags protocol.
//!
//! Handles the Bearer token challenge dance, `Link` header pagination,
//! response size caps and Docker Hub host/path normalisation. Rate limiting
//! (HTTP 429) surfaces as the [`RateLimited`] marker so callers can skip the
//! whole host for the remainder of their cycle.
use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use reqwest::header::HeaderMap;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;

use clustermap_context::Context;
use clustermap_context::ShutdownInterrupt;

/// String set as the user agent in HTTP requests.
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Page size requested from the tags endpoint.
const TAGS_PAGE_SIZE: u32 = 1000;

/// Maximum accepted body size for tag list and token responses.
pub const TAGS_BODY_LIMIT: usize = 1024 * 1024;

/// The registry host asked us to back off.
#[derive(Debug, thiserror::Error)]
#[error("registry host '{host}' rate limited the request")]
pub struct RateLimited {
    pub host: String,
}

/// Check an error chain for the [`RateLimited`] marker.
pub fn is_rate_limited(error: &anyhow::Error) -> bool {
    error.is::<RateLimited>() || error.chain().any(|cause| cause.is::<RateLimited>())
}

/// A response body exceeded the accepted size limit.
#[derive(Debug, thiserror::Error)]
#[error("upstream response body exceeded the {limit} byte limit")]
pub struct BodyTooLarge {
    pub limit: usize,
}

/// Client for OCI registries and Helm HTTP repositories.
pub struct RegistryClient {
    http: Client,

    /// HTTP scheme used to reach registries. Only tests downgrade this.
    scheme: &'static str,

    /// Bearer tokens cached per registry host.
    ///
    /// Tokens survive across repositories and pages to keep auth round-trips
    /// down; a 401 on a request made with a cached token evicts it and
    /// re-authenticates once.
    tokens: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

impl RegistryClient {
    /// Initialise the shared registry client.
    pub fn new() -> Result<RegistryClient> {
        let http = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("unable to initialise registry HTTP client")?;
        Ok(RegistryClient {
            http,
            scheme: "https",
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// A client speaking plain HTTP, for tests against local mock registries.
    #[cfg(test)]
    pub(crate) fn insecure() -> Result<RegistryClient> {
        let mut client = RegistryClient::new()?;
        client.scheme = "http";
        Ok(client)
    }

    /// The underlying HTTP client, shared with the Helm index fetcher.
    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// List every tag of a repository, following pagination.
    ///
    /// `repository` is the path below `/v2/`, for example `fluxcd/flux2`.
    pub async fn list_tags(&self, context: &Context, host: &str, repository: &str) -> Result<Vec<String>> {
        let host = normalise_host(host);
        let repository = normalise_repository(&host, repository);
        let mut url = Url::parse(&format!(
            "{}://{}/v2/{}/tags/list?n={}",
            self.scheme, host, repository, TAGS_PAGE_SIZE,
        ))
        .with_context(|| format!("invalid registry URL for host '{}'", host))?;

        let mut tags = Vec::new();
        loop {
            let request = self.http.get(url.clone());
            let response = self.send_authenticated(context, &host, request).await?;
            let next = next_link(response.headers(), &url)?;
            let body = capped_body(response, TAGS_BODY_LIMIT).await?;
            let page: TagsPage = serde_json::from_slice(&body)
                .with_context(|| format!("malformed tags response from '{}'", host))?;
            tags.extend(page.tags.unwrap_or_default());
            match next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(tags)
    }

    /// Send a registry request, answering a Bearer challenge if one comes back.
    async fn send_authenticated(
        &self,
        context: &Context,
        host: &str,
        request: RequestBuilder,
    ) -> Result<Response> {
        let cached = self.tokens.lock().await.get(host).cloned();
        let mut attempt = request
            .try_clone()
            .context("registry request cannot be retried")?;
        if let Some(token) = &cached {
            attempt = attempt.bearer_auth(token);
        }
        let response = send_with_cancel(context, attempt).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            anyhow::bail!(RateLimited { host: host.into() });
        }
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(host, response);
        }

        // A 401 with a cached token means the token expired: drop it and
        // authenticate from scratch against the advertised realm.
        if cached.is_some() {
            self.tokens.lock().await.remove(host);
        }
        let challenge = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer_challenge)
            .with_context(|| format!("registry '{}' returned 401 without a Bearer challenge", host))?;
        let token = self.fetch_token(context, host, &challenge).await?;

        let retry = request
            .try_clone()
            .context("registry request cannot be retried")?
            .bearer_auth(&token);
        let response = send_with_cancel(context, retry).await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            anyhow::bail!(RateLimited { host: host.into() });
        }
        check_status(host, response)
    }

    /// Fetch a Bearer token from the challenge realm and cache it per host.
    async fn fetch_token(
        &self,
        context: &Context,
        host: &str,
        challenge: &BearerChallenge,
    ) -> Result<String> {
        let mut request = self.http.get(&challenge.realm);
        if let Some(service) = &challenge.service {
            request = request.query(&[("service", service)]);
        }
        if let Some(scope) = &challenge.scope {
            request = request.query(&[("scope", scope)]);
        }
        let response = send_with_cancel(context, request).await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            anyhow::bail!(RateLimited { host: host.into() });
        }
        let response = check_status(host, response)?;
        let body = capped_body(response, TAGS_BODY_LIMIT).await?;
        let token: TokenResponse = serde_json::from_slice(&body)
            .with_context(|| format!("malformed token response for '{}'", host))?;
        let token = token
            .token
            .or(token.access_token)
            .with_context(|| format!("token response for '{}' carried no token", host))?;
        self.tokens.lock().await.insert(host.to_string(), token.clone());
        Ok(token)
    }
}

/// A parsed `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Eq, PartialEq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

/// Parse a `WWW-Authenticate: Bearer` challenge header value.
///
/// Values may be quoted and whitespace is tolerated around `=`.
pub fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let rest = header.trim();
    let rest = if rest.len() >= 6 && rest[..6].eq_ignore_ascii_case("bearer") {
        &rest[6..]
    } else {
        return None;
    };

    let mut realm = None;
    let mut service = None;
    let mut scope = None;
    for part in split_challenge_params(rest) {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => continue,
        };
        let value = value.trim_matches('"').to_string();
        match key.to_ascii_lowercase().as_str() {
            "realm" => realm = Some(value),
            "service" => service = Some(value),
            "scope" => scope = Some(value),
            _ => (),
        }
    }
    realm.map(|realm| BearerChallenge {
        realm,
        service,
        scope,
    })
}

/// Split challenge parameters on commas outside of quoted values.
fn split_challenge_params(params: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for character in params.chars() {
        match character {
            '"' => {
                in_quotes = !in_quotes;
                current.push(character);
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(character),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Resolve the `rel="next"` pagination link, if the response carries one.
///
/// Relative links resolve against the scheme and host of the current URL.
pub fn next_link(headers: &HeaderMap, current: &Url) -> Result<Option<Url>> {
    let header = match headers.get(reqwest::header::LINK) {
        Some(header) => header.to_str().unwrap_or(""),
        None => return Ok(None),
    };
    for part in header.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") && !part.contains("rel=next") {
            continue;
        }
        let start = match part.find('<') {
            Some(start) => start,
            None => continue,
        };
        let end = match part.find('>') {
            Some(end) => end,
            None => continue,
        };
        let target = &part[start + 1..end];
        let next = current
            .join(target)
            .with_context(|| format!("invalid pagination link '{}'", target))?;
        return Ok(Some(next));
    }
    Ok(None)
}

/// Rewrite Docker Hub's registry host to its API endpoint.
pub fn normalise_host(host: &str) -> String {
    match host {
        "docker.io" => String::from("registry-1.docker.io"),
        host => host.to_string(),
    }
}

/// Official Docker Hub images live below the implicit `library/` namespace.
pub fn normalise_repository(host: &str, repository: &str) -> String {
    if host == "registry-1.docker.io" && !repository.contains('/') {
        return format!("library/{}", repository);
    }
    repository.to_string()
}

/// Send a request, aborting promptly on process shutdown.
pub(crate) async fn send_with_cancel(context: &Context, request: RequestBuilder) -> Result<Response> {
    tokio::select! {
        biased;
        _ = context.cancel.cancelled() => Err(ShutdownInterrupt.into()),
        response = request.send() => response.map_err(anyhow::Error::from),
    }
}

/// Fail non-success statuses with the host recorded for the log line.
fn check_status(host: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("registry '{}' responded with status {}", host, status);
    }
    Ok(response)
}

/// Read a response body, failing when it exceeds the size limit.
pub(crate) async fn capped_body(response: Response, limit: usize) -> Result<Vec<u8>> {
    if let Some(length) = response.content_length() {
        if length > limit as u64 {
            anyhow::bail!(BodyTooLarge { limit });
        }
    }
    let body = response.bytes().await?;
    if body.len() > limit {
        anyhow::bail!(BodyTooLarge { limit });
    }
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests;
