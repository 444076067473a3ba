use clustermap_context::Context;
use clustermap_models::ImageRef;

use crate::registry::RegistryClient;

use super::ImagesCache;

fn image(server: &mockito::ServerGuard, repository: &str, tag: &str) -> ImageRef {
    ImageRef {
        registry: server.host_with_port(),
        repository: repository.to_string(),
        tag: tag.to_string(),
    }
}

#[tokio::test]
async fn variant_aware_resolution() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/library/nginx/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tags":["1.20-alpine","1.21-alpine","1.21","1.22-slim"]}"#)
        .expect(1)
        .create_async()
        .await;

    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let context = Context::fixture();
    let deployed = image(&server, "library/nginx", "1.20-alpine");
    cache.check(&context, vec![deployed.clone()]).await;
    assert_eq!(cache.latest(&deployed), "1.21-alpine");
}

#[tokio::test]
async fn repository_queried_once_for_multiple_tags() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/library/nginx/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tags":["1.20","1.21","1.20-alpine","1.21-alpine"]}"#)
        .expect(1)
        .create_async()
        .await;

    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let context = Context::fixture();
    let plain = image(&server, "library/nginx", "1.20");
    let alpine = image(&server, "library/nginx", "1.20-alpine");
    cache.check(&context, vec![plain.clone(), alpine.clone()]).await;

    assert_eq!(cache.latest(&plain), "1.21");
    assert_eq!(cache.latest(&alpine), "1.21-alpine");
    mock.assert_async().await;
}

#[tokio::test]
async fn versionless_tag_resolves_to_sentinel() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/library/caddy/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tags":["latest","2.8.4"]}"#)
        .create_async()
        .await;

    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let context = Context::fixture();
    let deployed = image(&server, "library/caddy", "latest");
    cache.check(&context, vec![deployed.clone()]).await;
    assert_eq!(cache.latest(&deployed), "-");
}

#[tokio::test]
async fn rate_limited_host_sentinels_all_tags() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/v2/org/alpha/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/v2/org/beta/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tags":["9.9.9"]}"#)
        .expect(0)
        .create_async()
        .await;

    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let context = Context::fixture();
    let alpha = image(&server, "org/alpha", "1.0.0");
    let beta = image(&server, "org/beta", "1.0.0");
    cache.check(&context, vec![alpha.clone(), beta.clone()]).await;

    assert_eq!(cache.latest(&alpha), "-");
    assert_eq!(cache.latest(&beta), "-");
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn gate_holds_between_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/org/app/tags/list")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tags":["1.0.1"]}"#)
        .expect(1)
        .create_async()
        .await;

    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let context = Context::fixture();
    let deployed = image(&server, "org/app", "1.0.0");
    cache.check(&context, vec![deployed.clone()]).await;
    cache.check(&context, vec![deployed.clone()]).await;
    assert_eq!(cache.latest(&deployed), "1.0.1");
    mock.assert_async().await;
}

#[tokio::test]
async fn unknown_image_reads_sentinel() {
    let cache = ImagesCache::new(RegistryClient::insecure().unwrap());
    let image = ImageRef::parse("ghcr.io/org/never-checked:1.0.0");
    assert_eq!(cache.latest(&image), "-");
}
