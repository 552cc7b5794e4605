//! Shared in-memory durable-store adapter for the consistency tests.
//!
//! Mirrors the conditional-write contract of the Postgres adapter: the
//! version check and the field writes happen under one lock, so a stale
//! writer always loses even when it interleaves after the coordinator's read.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use foglio::application::repos::{
    ConditionalPostUpdate, CreatePostParams, PostListFilter, PostListPage, PostListPageRequest,
    PostsRepo, PostsWriteRepo, RepoError,
};
use foglio::domain::entities::PostRecord;

#[derive(Default)]
pub struct MemoryPostsRepo {
    posts: Mutex<HashMap<Uuid, PostRecord>>,
    likes: Mutex<HashSet<(Uuid, Uuid)>>,
    /// Records whose ratchet updates should fail, for failure-path tests.
    fail_ratchet_for: Mutex<HashSet<Uuid>>,
}

impl MemoryPostsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted_view_count(&self, id: Uuid) -> Option<i64> {
        self.posts
            .lock()
            .expect("posts lock")
            .get(&id)
            .map(|post| post.view_count)
    }

    pub fn fail_ratchet(&self, id: Uuid) {
        self.fail_ratchet_for.lock().expect("fail lock").insert(id);
    }
}

#[async_trait]
impl PostsRepo for MemoryPostsRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.lock().expect("posts lock").get(&id).cloned())
    }

    async fn find_by_slug(
        &self,
        author_id: Uuid,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .expect("posts lock")
            .values()
            .find(|post| post.author_id == author_id && post.slug == slug)
            .cloned())
    }

    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PostListPageRequest,
    ) -> Result<PostListPage, RepoError> {
        let posts = self.posts.lock().expect("posts lock");
        let mut matched: Vec<PostRecord> = posts
            .values()
            .filter(|post| post.deleted_at.is_none())
            .filter(|post| filter.author_id.is_none_or(|author| post.author_id == author))
            .filter(|post| filter.status.is_none_or(|status| post.status == status))
            .filter(|post| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|needle| post.title.contains(needle))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let start = page.offset as usize;
        let posts = matched
            .into_iter()
            .skip(start)
            .take(page.limit as usize)
            .collect();

        Ok(PostListPage {
            posts,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn slug_exists(&self, author_id: Uuid, slug: &str) -> Result<bool, RepoError> {
        Ok(self
            .posts
            .lock()
            .expect("posts lock")
            .values()
            .any(|post| post.author_id == author_id && post.slug == slug))
    }

    async fn viewer_liked(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .likes
            .lock()
            .expect("likes lock")
            .contains(&(post_id, viewer_id)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryPostsRepo {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            slug: params.slug,
            title: params.title,
            excerpt: params.excerpt,
            body_markdown: params.body_markdown,
            status: params.status,
            version: 1,
            view_count: 0,
            published_at: params.published_at,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        self.posts
            .lock()
            .expect("posts lock")
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ConditionalPostUpdate,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut posts = self.posts.lock().expect("posts lock");
        let Some(post) = posts.get_mut(&id) else {
            return Ok(None);
        };
        if post.version != expected_version || post.deleted_at.is_some() {
            return Ok(None);
        }

        post.version = expected_version + 1;
        post.updated_at = OffsetDateTime::now_utc();
        if let Some(slug) = update.slug {
            post.slug = slug;
        }
        if let Some(title) = update.title {
            post.title = title;
        }
        if let Some(excerpt) = update.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(body_markdown) = update.body_markdown {
            post.body_markdown = body_markdown;
        }
        if let Some(status) = update.status {
            post.status = status;
        }
        if let Some(published_at) = update.published_at {
            post.published_at = Some(published_at);
        }
        if let Some(deleted_at) = update.deleted_at {
            post.deleted_at = Some(deleted_at);
        }

        Ok(Some(post.clone()))
    }

    async fn ratchet_view_count(&self, id: Uuid, candidate: i64) -> Result<(), RepoError> {
        if self
            .fail_ratchet_for
            .lock()
            .expect("fail lock")
            .contains(&id)
        {
            return Err(RepoError::from_persistence("induced ratchet failure"));
        }

        let mut posts = self.posts.lock().expect("posts lock");
        let Some(post) = posts.get_mut(&id) else {
            return Err(RepoError::NotFound);
        };
        post.view_count = post.view_count.max(candidate);
        Ok(())
    }

    async fn insert_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .likes
            .lock()
            .expect("likes lock")
            .insert((post_id, viewer_id)))
    }

    async fn delete_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .likes
            .lock()
            .expect("likes lock")
            .remove(&(post_id, viewer_id)))
    }
}
