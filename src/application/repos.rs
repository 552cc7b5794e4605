//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Timeouts are the retryable class: callers at the boundary may retry
    /// with backoff. Everything else is terminal for the current request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Timeout)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostListFilter {
    pub author_id: Option<Uuid>,
    pub status: Option<PostStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PostListPageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PostListPageRequest {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of list results, shaped for caching: the whole struct is what the
/// cache-aside layer serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListPage {
    pub posts: Vec<PostRecord>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub status: PostStatus,
    pub published_at: Option<OffsetDateTime>,
}

/// Field values for a version-conditioned update. `None` leaves the column
/// untouched; the adapter always bumps `version` and `updated_at`.
#[derive(Debug, Clone, Default)]
pub struct ConditionalPostUpdate {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body_markdown: Option<String>,
    pub status: Option<PostStatus>,
    pub published_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
}

impl ConditionalPostUpdate {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.title.is_none()
            && self.excerpt.is_none()
            && self.body_markdown.is_none()
            && self.status.is_none()
            && self.published_at.is_none()
            && self.deleted_at.is_none()
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Fetch a record by id, tombstoned rows included; callers decide whether
    /// a tombstone counts as absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_slug(
        &self,
        author_id: Uuid,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PostListPageRequest,
    ) -> Result<PostListPage, RepoError>;

    /// Uniqueness probe for slug disambiguation, scoped to one author.
    /// Tombstoned rows still occupy their slug.
    async fn slug_exists(&self, author_id: Uuid, slug: &str) -> Result<bool, RepoError>;

    async fn viewer_liked(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Apply `update` in a single atomic statement conditioned on
    /// `version = expected_version` (and the row not being tombstoned),
    /// setting `version = expected_version + 1`. Returns the updated record,
    /// or `None` when the condition matched no row — the caller treats that
    /// as a lost optimistic-concurrency race, not as an error of the adapter.
    ///
    /// The check and the write must be one durable-store statement, not two
    /// round trips: a second mutator can interleave between a read and a
    /// separate write.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ConditionalPostUpdate,
    ) -> Result<Option<PostRecord>, RepoError>;

    /// Monotonic merge of a live counter value into the persisted baseline:
    /// `view_count = GREATEST(view_count, candidate)`. Idempotent; duplicate
    /// or out-of-order applications can never move the count backward.
    async fn ratchet_view_count(&self, id: Uuid, candidate: i64) -> Result<(), RepoError>;

    /// Record a like; returns `false` when the pair already existed.
    async fn insert_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError>;

    /// Remove a like; returns `false` when there was nothing to remove.
    async fn delete_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError>;
}
