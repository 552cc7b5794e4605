//! Public read path: cache-aside queries with live view counters.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{
    PostListFilter, PostListPage, PostListPageRequest, PostsRepo, RepoError,
};
use crate::cache::{
    CacheConfig, CounterStore, QueryCache, decode_cached, encode_cached, keys,
};
use crate::domain::entities::PostRecord;

const METRIC_CACHE_HIT: &str = "foglio_cache_hit_total";
const METRIC_CACHE_MISS: &str = "foglio_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "foglio_cache_error_total";
const METRIC_INCREMENT_DROPPED: &str = "foglio_counter_increment_dropped_total";

/// What a route handler needs to render one record.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: PostRecord,
    /// Volatile counter value when reachable, persisted baseline otherwise.
    pub live_view_count: i64,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Read-side service over the durable store, the query cache, and the live
/// counters.
///
/// Cache and counter failures never surface from here: the cache degrades to
/// a forced durable read and the counter degrades to the persisted baseline.
/// Only durable-store failures propagate.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    cache: Arc<dyn QueryCache>,
    counters: Arc<dyn CounterStore>,
    config: CacheConfig,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        cache: Arc<dyn QueryCache>,
        counters: Arc<dyn CounterStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            posts,
            cache,
            counters,
            config,
        }
    }

    /// Read one record for display.
    ///
    /// Every call counts as a view: the live counter is bumped
    /// unconditionally, cache hit or not. The counter is seeded from the
    /// persisted baseline on first touch, so the returned total is
    /// `persisted + views since the counter came into existence`.
    pub async fn read_post_for_display(
        &self,
        id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<PostView, FeedError> {
        let post = self.detail(id).await?.ok_or(FeedError::NotFound)?;
        if post.is_deleted() {
            return Err(FeedError::NotFound);
        }

        let live_view_count = self.record_view(&post).await;

        let liked_by_viewer = match viewer_id {
            Some(viewer) => self.posts.viewer_liked(id, viewer).await?,
            None => false,
        };

        Ok(PostView {
            post,
            live_view_count,
            liked_by_viewer,
        })
    }

    /// List records, cache-aside. List entries carry the short TTL since any
    /// mutation anywhere in the scope invalidates them wholesale.
    pub async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PostListPageRequest,
    ) -> Result<PostListPage, FeedError> {
        if !self.config.enabled {
            return Ok(self.posts.list_posts(filter, page).await?);
        }

        let key = keys::list_key(filter.author_id, filter, &page);
        if let Some(cached) = self.cache_get::<PostListPage>(&key).await {
            return Ok(cached);
        }

        let result = self.posts.list_posts(filter, page).await?;
        self.cache_put(&key, &result, self.config.list_ttl()).await;
        Ok(result)
    }

    async fn detail(&self, id: Uuid) -> Result<Option<PostRecord>, FeedError> {
        if !self.config.enabled {
            return Ok(self.posts.find_by_id(id).await?);
        }

        let key = keys::detail_key(id);
        if let Some(cached) = self.cache_get::<PostRecord>(&key).await {
            return Ok(Some(cached));
        }

        let record = self.posts.find_by_id(id).await?;
        if let Some(record) = &record {
            self.cache_put(&key, record, self.config.detail_ttl()).await;
        }
        Ok(record)
    }

    /// Bump the live counter for a served read. Increments are best-effort
    /// signals: a failure is logged and dropped, never retried synchronously,
    /// and the displayed value falls open to the persisted baseline.
    async fn record_view(&self, post: &PostRecord) -> i64 {
        if let Err(err) = self.counters.seed(post.id, post.view_count).await {
            debug!(
                target = "application::feed",
                post_id = %post.id,
                error = %err,
                "counter seed failed"
            );
        }

        match self.counters.increment(post.id).await {
            Ok(value) => value,
            Err(err) => {
                counter!(METRIC_INCREMENT_DROPPED).increment(1);
                warn!(
                    target = "application::feed",
                    post_id = %post.id,
                    error = %err,
                    "view increment dropped"
                );
                match self.counters.read(post.id).await {
                    Ok(Some(value)) => value,
                    _ => post.view_count,
                }
            }
        }
    }

    async fn cache_get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match decode_cached::<T>(&bytes) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    Some(value)
                }
                Err(err) => {
                    // Undecodable entries count as misses; the repopulating
                    // set below overwrites them.
                    warn!(
                        target = "application::feed",
                        key,
                        error = %err,
                        "dropping undecodable cache entry"
                    );
                    None
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR).increment(1);
                warn!(
                    target = "application::feed",
                    key,
                    error = %err,
                    "cache read failed; falling back to durable store"
                );
                None
            }
        }
    }

    async fn cache_put<T: serde::Serialize>(&self, key: &str, value: &T, ttl: std::time::Duration) {
        let bytes = match encode_cached(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    target = "application::feed",
                    key,
                    error = %err,
                    "cache encode failed"
                );
                return;
            }
        };

        if let Err(err) = self.cache.set(key, bytes, ttl).await {
            counter!(METRIC_CACHE_ERROR).increment(1);
            warn!(
                target = "application::feed",
                key,
                error = %err,
                "cache write failed"
            );
        }
    }
}
