//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::PostStatus;

/// A content record as committed to the durable store.
///
/// `version` is the optimistic-concurrency stamp: it starts at 1 and every
/// successful mutation increments it by exactly one. `view_count` is the
/// persisted baseline last written by reconciliation; the live total lives in
/// the volatile counter store. Rows are soft-deleted via `deleted_at` and
/// never physically removed by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub status: PostStatus,
    pub version: i64,
    pub view_count: i64,
    pub published_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl PostRecord {
    /// A tombstoned record is invisible to every caller-facing operation.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
