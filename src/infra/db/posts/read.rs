use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{
    PostListFilter, PostListPage, PostListPageRequest, PostsRepo, RepoError,
};
use crate::domain::entities::PostRecord;

use super::super::{PostgresRepositories, map_sqlx_error};
use super::{POST_COLUMNS, PostRow};

const MAX_PAGE_LIMIT: u32 = 100;

fn apply_list_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostListFilter) {
    if let Some(author_id) = filter.author_id {
        qb.push(" AND p.author_id = ");
        qb.push_bind(author_id);
    }

    if let Some(status) = filter.status {
        qb.push(" AND p.status = ");
        qb.push_bind(status);
    }

    if let Some(search) = filter.search.as_ref() {
        qb.push(" AND (");
        qb.push("p.title ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(" OR p.slug ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(" OR p.excerpt ILIKE ");
        qb.push_bind(format!("%{}%", search));
        qb.push(")");
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_by_slug(
        &self,
        author_id: Uuid,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 AND slug = $2"
        ))
        .bind(author_id)
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_posts(
        &self,
        filter: &PostListFilter,
        page: PostListPageRequest,
    ) -> Result<PostListPage, RepoError> {
        let limit = page.limit.clamp(1, MAX_PAGE_LIMIT);

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.deleted_at IS NULL"
        ));
        apply_list_filter(&mut qb, filter);
        qb.push(" ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id DESC");
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(page.offset));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count_qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM posts p WHERE p.deleted_at IS NULL",
        );
        apply_list_filter(&mut count_qb, filter);

        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostListPage {
            posts: rows.into_iter().map(PostRecord::from).collect(),
            total: total
                .try_into()
                .map_err(|_| RepoError::from_persistence("count exceeds supported range"))?,
            limit,
            offset: page.offset,
        })
    }

    async fn slug_exists(&self, author_id: Uuid, slug: &str) -> Result<bool, RepoError> {
        // Tombstoned rows are deliberately included: a deleted record keeps
        // its slug occupied so external links never resolve to a new record.
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE author_id = $1 AND slug = $2)",
        )
        .bind(author_id)
        .bind(slug)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn viewer_liked(&self, post_id: Uuid, viewer_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM post_likes WHERE post_id = $1 AND viewer_id = $2)",
        )
        .bind(post_id)
        .bind(viewer_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
