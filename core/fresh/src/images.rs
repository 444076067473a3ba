//! Background checked cache of latest image tags per deployed variant.
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use clustermap_context::Context;
use clustermap_models::ImageRef;

use crate::gate::CheckGate;
use crate::registry::is_rate_limited;
use crate::registry::RegistryClient;
use crate::variant::highest_matching_tag;
use crate::variant::UNKNOWN;

/// Minimum time between completed image checks.
const CHECK_HOLD: Duration = Duration::from_secs(15 * 60);

/// Delay between per-repository queries, to stay below upstream rate limits.
const QUERY_PACING: Duration = Duration::from_secs(2);

/// Background checked cache mapping `image|deployedTag` to the latest
/// tag of the same variant.
///
/// Writer/reader behaviour matches [`ChartsCache`](crate::ChartsCache):
/// entries become visible per repository, unresolved entries read as `-`.
#[derive(Clone)]
pub struct ImagesCache {
    inner: Arc<ImagesInner>,
}

struct ImagesInner {
    client: RegistryClient,
    entries: RwLock<HashMap<String, String>>,
    gate: CheckGate,
}

impl ImagesCache {
    pub fn new(client: RegistryClient) -> ImagesCache {
        ImagesCache {
            inner: Arc::new(ImagesInner {
                client,
                entries: RwLock::new(HashMap::new()),
                gate: CheckGate::new(),
            }),
        }
    }

    /// Cache key for a deployed image.
    pub fn key(image: &ImageRef) -> String {
        format!("{}/{}|{}", image.registry, image.repository, image.tag)
    }

    /// Latest known tag of the deployed image's variant, `-` when unresolved.
    pub fn latest(&self, image: &ImageRef) -> String {
        self.inner
            .entries
            .read()
            .expect("ImagesCache entries lock poisoned")
            .get(&ImagesCache::key(image))
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Resolve the latest same-variant tag for every deployed image.
    ///
    /// Single-flight and held for fifteen minutes after each completion.
    /// Rate limited registry hosts are skipped for the remainder of the cycle
    /// with their entries left at the sentinel.
    pub async fn check(&self, context: &Context, mut images: Vec<ImageRef>) {
        if !self.inner.gate.begin(CHECK_HOLD) {
            slog::debug!(context.logger, "Image freshness check skipped by gate");
            return;
        }

        images.sort_by_key(ImagesCache::key);
        images.dedup();

        {
            let mut entries = self
                .inner
                .entries
                .write()
                .expect("ImagesCache entries lock poisoned");
            entries.clear();
            for image in &images {
                entries.insert(ImagesCache::key(image), UNKNOWN.into());
            }
        }

        // Tag lists are shared between deployed tags of the same repository
        // so each repository is queried at most once per cycle.
        let mut tag_lists: HashMap<(String, String), Vec<String>> = HashMap::new();
        let mut skip_hosts: HashSet<String> = HashSet::new();
        let mut first_query = true;
        for image in &images {
            if context.check_shutdown().is_err() {
                break;
            }
            if skip_hosts.contains(&image.registry) {
                continue;
            }

            let repo = (image.registry.clone(), image.repository.clone());
            if !tag_lists.contains_key(&repo) {
                if !first_query {
                    tokio::select! {
                        biased;
                        _ = context.cancel.cancelled() => break,
                        _ = tokio::time::sleep(QUERY_PACING) => (),
                    }
                }
                first_query = false;

                let tags = match self
                    .inner
                    .client
                    .list_tags(context, &image.registry, &image.repository)
                    .await
                {
                    Ok(tags) => tags,
                    Err(error) if is_rate_limited(&error) => {
                        slog::warn!(
                            context.logger,
                            "Registry rate limited image check, skipping host this cycle";
                            "host" => &image.registry,
                        );
                        skip_hosts.insert(image.registry.clone());
                        continue;
                    }
                    Err(error) => {
                        slog::warn!(
                            context.logger, "Unable to list image tags";
                            "image" => %image,
                            "error" => %error,
                        );
                        continue;
                    }
                };
                tag_lists.insert(repo.clone(), tags);
            }

            let tags = &tag_lists[&repo];
            let latest = highest_matching_tag(&image.tag, tags);
            self.inner
                .entries
                .write()
                .expect("ImagesCache entries lock poisoned")
                .insert(ImagesCache::key(image), latest);
        }

        self.inner.gate.finish();
        slog::debug!(
            context.logger, "Image freshness check completed";
            "images" => images.len(),
        );
    }
}

#[cfg(test)]
mod tests;
