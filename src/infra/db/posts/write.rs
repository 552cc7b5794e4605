use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ConditionalPostUpdate, CreatePostParams, PostsWriteRepo, RepoError,
};
use crate::domain::entities::PostRecord;

use super::super::{PostgresRepositories, map_sqlx_error};
use super::{POST_COLUMNS, PostRow};

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            slug,
            title,
            excerpt,
            body_markdown,
            status,
            published_at,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO posts (
                id, author_id, slug, title, excerpt, body_markdown, status,
                version, view_count, published_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, 0, $8, $9, $9)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(author_id)
        .bind(slug)
        .bind(title)
        .bind(excerpt)
        .bind(body_markdown)
        .bind(status)
        .bind(published_at)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ConditionalPostUpdate,
    ) -> Result<Option<PostRecord>, RepoError> {
        if update.is_empty() {
            return Err(RepoError::from_persistence(
                "conditional update changes no columns",
            ));
        }

        // Version check and field writes are one statement on purpose: the
        // WHERE clause re-validates the version inside the row lock, closing
        // the window between the coordinator's read and this write.
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE posts SET version = ");
        qb.push_bind(expected_version + 1);
        qb.push(", updated_at = now()");

        if let Some(slug) = update.slug {
            qb.push(", slug = ");
            qb.push_bind(slug);
        }
        if let Some(title) = update.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(excerpt) = update.excerpt {
            qb.push(", excerpt = ");
            qb.push_bind(excerpt);
        }
        if let Some(body_markdown) = update.body_markdown {
            qb.push(", body_markdown = ");
            qb.push_bind(body_markdown);
        }
        if let Some(status) = update.status {
            qb.push(", status = ");
            qb.push_bind(status);
        }
        if let Some(published_at) = update.published_at {
            qb.push(", published_at = ");
            qb.push_bind(published_at);
        }
        if let Some(deleted_at) = update.deleted_at {
            qb.push(", deleted_at = ");
            qb.push_bind(deleted_at);
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND version = ");
        qb.push_bind(expected_version);
        qb.push(" AND deleted_at IS NULL");
        qb.push(format!(" RETURNING {POST_COLUMNS}"));

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn ratchet_view_count(&self, id: Uuid, candidate: i64) -> Result<(), RepoError> {
        // GREATEST makes this idempotent: replaying an old candidate, or two
        // overlapping reconciliation passes racing each other, can only leave
        // the larger value in place. `updated_at` is untouched; a ratchet is
        // bookkeeping, not a content change.
        let result = sqlx::query(
            "UPDATE posts SET view_count = GREATEST(view_count, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(candidate)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn insert_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, viewer_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (post_id, viewer_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(viewer_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_like(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND viewer_id = $2")
                .bind(post_id)
                .bind(viewer_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
