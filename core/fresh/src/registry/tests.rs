use clustermap_context::Context;

use super::is_rate_limited;
use super::next_link;
use super::normalise_host;
use super::normalise_repository;
use super::parse_bearer_challenge;
use super::RegistryClient;

#[test]
fn challenge_quoted_values() {
    let challenge = parse_bearer_challenge(
        r#"Bearer realm="https://auth.example/token",service="registry",scope="repository:foo/bar:pull""#,
    )
    .unwrap();
    assert_eq!(challenge.realm, "https://auth.example/token");
    assert_eq!(challenge.service.as_deref(), Some("registry"));
    assert_eq!(challenge.scope.as_deref(), Some("repository:foo/bar:pull"));
}

#[test]
fn challenge_whitespace_and_bare_values() {
    let challenge =
        parse_bearer_challenge("Bearer realm = https://auth.example/token , service = registry")
            .unwrap();
    assert_eq!(challenge.realm, "https://auth.example/token");
    assert_eq!(challenge.service.as_deref(), Some("registry"));
    assert_eq!(challenge.scope, None);
}

#[test]
fn challenge_requires_bearer_scheme() {
    assert!(parse_bearer_challenge("Basic realm=\"x\"").is_none());
    assert!(parse_bearer_challenge("Bearer service=\"registry\"").is_none());
}

#[test]
fn link_header_resolution() {
    let current = reqwest::Url::parse("https://ghcr.io/v2/foo/tags/list?n=1000").unwrap();
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::LINK,
        "</v2/foo/tags/list?n=1000&last=1.0.0>; rel=\"next\"".parse().unwrap(),
    );
    let next = next_link(&headers, &current).unwrap().unwrap();
    assert_eq!(
        next.as_str(),
        "https://ghcr.io/v2/foo/tags/list?n=1000&last=1.0.0",
    );

    let empty = reqwest::header::HeaderMap::new();
    assert!(next_link(&empty, &current).unwrap().is_none());
}

#[test]
fn docker_hub_normalisation() {
    assert_eq!(normalise_host("docker.io"), "registry-1.docker.io");
    assert_eq!(normalise_host("ghcr.io"), "ghcr.io");
    assert_eq!(normalise_repository("registry-1.docker.io", "nginx"), "library/nginx");
    assert_eq!(
        normalise_repository("registry-1.docker.io", "grafana/grafana"),
        "grafana/grafana",
    );
    assert_eq!(normalise_repository("ghcr.io", "nginx"), "nginx");
}

#[tokio::test]
async fn token_challenge_flow() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    let challenge = format!(
        "Bearer realm=\"{}/token\",service=\"registry\",scope=\"repository:foo/bar:pull\"",
        server.url(),
    );

    let denied = server
        .mock("GET", "/v2/foo/bar/tags/list")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", mockito::Matcher::Missing)
        .with_status(401)
        .with_header("www-authenticate", &challenge)
        .create_async()
        .await;
    let token = server
        .mock("GET", "/token")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("service".into(), "registry".into()),
            mockito::Matcher::UrlEncoded("scope".into(), "repository:foo/bar:pull".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"token":"XYZ"}"#)
        .create_async()
        .await;
    let allowed = server
        .mock("GET", "/v2/foo/bar/tags/list")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", "Bearer XYZ")
        .with_status(200)
        .with_body(r#"{"name":"foo/bar","tags":["1.0.0","1.0.1","1.1.0-rc1"]}"#)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    let tags = client.list_tags(&context, &host, "foo/bar").await.unwrap();
    assert_eq!(tags, vec!["1.0.0", "1.0.1", "1.1.0-rc1"]);

    denied.assert_async().await;
    token.assert_async().await;
    allowed.assert_async().await;
}

#[tokio::test]
async fn cached_token_reused_across_repositories() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    let challenge = format!("Bearer realm=\"{}/token\"", server.url());

    server
        .mock("GET", "/v2/foo/one/tags/list")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", mockito::Matcher::Missing)
        .with_status(401)
        .with_header("www-authenticate", &challenge)
        .create_async()
        .await;
    server
        .mock("GET", "/token")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"access_token":"CACHED"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/foo/one/tags/list")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", "Bearer CACHED")
        .with_status(200)
        .with_body(r#"{"tags":["1.0.0"]}"#)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/v2/foo/two/tags/list")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", "Bearer CACHED")
        .with_status(200)
        .with_body(r#"{"tags":["2.0.0"]}"#)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    client.list_tags(&context, &host, "foo/one").await.unwrap();
    let tags = client.list_tags(&context, &host, "foo/two").await.unwrap();
    assert_eq!(tags, vec!["2.0.0"]);
    second.assert_async().await;
}

#[tokio::test]
async fn pagination_concatenates_pages() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();

    server
        .mock("GET", "/v2/foo/tags/list")
        .match_query(mockito::Matcher::Exact("n=1000".into()))
        .with_status(200)
        .with_header(
            "link",
            "</v2/foo/tags/list?n=1000&last=1.0.0>; rel=\"next\"",
        )
        .with_body(r#"{"tags":["0.9.0","1.0.0"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/foo/tags/list")
        .match_query(mockito::Matcher::Exact("n=1000&last=1.0.0".into()))
        .with_status(200)
        .with_body(r#"{"tags":["1.1.0"]}"#)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    let tags = client.list_tags(&context, &host, "foo").await.unwrap();
    assert_eq!(tags, vec!["0.9.0", "1.0.0", "1.1.0"]);
}

#[tokio::test]
async fn rate_limit_surfaces_marker() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    server
        .mock("GET", "/v2/foo/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    let error = client.list_tags(&context, &host, "foo").await.unwrap_err();
    assert!(is_rate_limited(&error));
}

#[tokio::test]
async fn oversized_body_rejected() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    let body = format!(r#"{{"tags":["{}"]}}"#, "x".repeat(super::TAGS_BODY_LIMIT));
    server
        .mock("GET", "/v2/foo/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    let error = client.list_tags(&context, &host, "foo").await.unwrap_err();
    assert!(error.is::<super::BodyTooLarge>());
}

#[tokio::test]
async fn missing_tags_field_tolerated() {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    server
        .mock("GET", "/v2/foo/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name":"foo","tags":null}"#)
        .create_async()
        .await;

    let client = RegistryClient::insecure().unwrap();
    let context = Context::fixture();
    let tags = client.list_tags(&context, &host, "foo").await.unwrap();
    assert!(tags.is_empty());
}
