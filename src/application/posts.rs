//! Write path: version-stamped mutations over the durable store.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    ConditionalPostUpdate, CreatePostParams, PostsRepo, PostsWriteRepo, RepoError,
};
use crate::cache::CacheInvalidator;
use crate::domain::entities::PostRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post not found")]
    NotFound,
    /// The caller's snapshot is stale: another writer committed first. Never
    /// retried here; the caller is expected to refresh and re-submit.
    #[error("version conflict: expected version {expected}")]
    Conflict { expected: i64 },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Caller-supplied field changes for one mutation.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body_markdown: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
}

/// Coordinates optimistic-concurrency writes.
///
/// Every mutation follows the same shape: read, reject stale versions early,
/// then hand the durable store a single conditional statement that both
/// re-checks the version and applies the change. The early check is a
/// courtesy (it avoids pointless writes); the conditional statement is the
/// guarantee, because a second mutator can interleave after the read.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    invalidator: Arc<CacheInvalidator>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        invalidator: Arc<CacheInvalidator>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            invalidator,
        }
    }

    /// Create a draft. The slug is derived from the title and disambiguated
    /// against the author's existing slugs.
    pub async fn create_post(&self, params: NewPost) -> Result<PostRecord, PostServiceError> {
        let NewPost {
            author_id,
            title,
            excerpt,
            body_markdown,
        } = params;

        let slug = self.unique_slug(author_id, &title).await?;

        let record = self
            .posts_write
            .create_post(CreatePostParams {
                author_id,
                slug,
                title,
                excerpt,
                body_markdown,
                status: PostStatus::Draft,
                published_at: None,
            })
            .await?;

        self.invalidator
            .on_mutation(record.id, record.author_id)
            .await;

        info!(
            target = "application::posts",
            post_id = %record.id,
            slug = %record.slug,
            "post created"
        );

        Ok(record)
    }

    /// Edit mutable content fields.
    ///
    /// A title change on a record still in draft regenerates the slug;
    /// published records keep their slug to preserve external links.
    pub async fn mutate_post(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: PostPatch,
    ) -> Result<PostRecord, PostServiceError> {
        if patch.title.is_none() && patch.excerpt.is_none() && patch.body_markdown.is_none() {
            return Err(PostServiceError::Validation(
                "patch changes no fields".to_string(),
            ));
        }

        let current = self.load_live(id).await?;
        if current.version != expected_version {
            return Err(PostServiceError::Conflict {
                expected: expected_version,
            });
        }

        let mut update = ConditionalPostUpdate {
            title: patch.title.clone(),
            excerpt: patch.excerpt,
            body_markdown: patch.body_markdown,
            ..Default::default()
        };

        if let Some(title) = patch.title.as_deref() {
            let title_changed = title != current.title;
            if title_changed && current.status == PostStatus::Draft {
                update.slug = Some(self.unique_slug(current.author_id, title).await?);
            }
        }

        self.apply_update(&current, expected_version, update).await
    }

    /// Transition a draft to published. Publication stamps `published_at`
    /// and freezes the slug from here on.
    pub async fn publish_post(
        &self,
        id: Uuid,
        expected_version: i64,
    ) -> Result<PostRecord, PostServiceError> {
        let current = self.load_live(id).await?;
        if current.version != expected_version {
            return Err(PostServiceError::Conflict {
                expected: expected_version,
            });
        }
        if current.status == PostStatus::Published {
            return Err(PostServiceError::Validation(
                "post is already published".to_string(),
            ));
        }

        let update = ConditionalPostUpdate {
            status: Some(PostStatus::Published),
            published_at: Some(OffsetDateTime::now_utc()),
            ..Default::default()
        };

        self.apply_update(&current, expected_version, update).await
    }

    /// Soft-delete. The row stays behind its tombstone and keeps its slug
    /// occupied; nothing is physically removed.
    pub async fn delete_post(
        &self,
        id: Uuid,
        expected_version: i64,
    ) -> Result<PostRecord, PostServiceError> {
        let current = self.load_live(id).await?;
        if current.version != expected_version {
            return Err(PostServiceError::Conflict {
                expected: expected_version,
            });
        }

        let update = ConditionalPostUpdate {
            deleted_at: Some(OffsetDateTime::now_utc()),
            ..Default::default()
        };

        self.apply_update(&current, expected_version, update).await
    }

    /// Flip a viewer's like. Returns the resulting state (`true` = liked).
    /// Likes are read per-viewer from the durable store and never cached, so
    /// no invalidation is involved.
    pub async fn toggle_like(
        &self,
        post_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<bool, PostServiceError> {
        self.load_live(post_id).await?;

        if self.posts_write.insert_like(post_id, viewer_id).await? {
            return Ok(true);
        }
        self.posts_write.delete_like(post_id, viewer_id).await?;
        Ok(false)
    }

    async fn load_live(&self, id: Uuid) -> Result<PostRecord, PostServiceError> {
        let record = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(PostServiceError::NotFound)?;
        if record.is_deleted() {
            return Err(PostServiceError::NotFound);
        }
        Ok(record)
    }

    /// Issue the conditional write, map a zero-row outcome to a conflict,
    /// and drop the derived cache entries before acknowledging.
    async fn apply_update(
        &self,
        current: &PostRecord,
        expected_version: i64,
        update: ConditionalPostUpdate,
    ) -> Result<PostRecord, PostServiceError> {
        let updated = self
            .posts_write
            .conditional_update(current.id, expected_version, update)
            .await?
            // The earlier read passed but the conditional statement matched
            // nothing: another writer won the race in between.
            .ok_or(PostServiceError::Conflict {
                expected: expected_version,
            })?;

        // Invalidate-before-acknowledge: the caller must not observe the
        // mutation as committed while pre-mutation cache entries are live.
        self.invalidator
            .on_mutation(updated.id, updated.author_id)
            .await;

        info!(
            target = "application::posts",
            post_id = %updated.id,
            version = updated.version,
            "post mutated"
        );

        Ok(updated)
    }

    async fn unique_slug(
        &self,
        author_id: Uuid,
        title: &str,
    ) -> Result<String, PostServiceError> {
        generate_unique_slug_async(title, |candidate| {
            let posts = self.posts.clone();
            let candidate = candidate.to_string();
            async move {
                posts
                    .slug_exists(author_id, &candidate)
                    .await
                    .map(|exists| !exists)
            }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(slug) => PostServiceError::Slug(slug),
            SlugAsyncError::Predicate(repo) => PostServiceError::Repo(repo),
        })
    }
}
