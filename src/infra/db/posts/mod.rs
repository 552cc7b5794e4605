mod read;
mod types;
mod write;

pub(crate) use types::PostRow;

/// Column list shared by every statement that returns full rows.
pub(crate) const POST_COLUMNS: &str = "id, author_id, slug, title, excerpt, body_markdown, \
     status, version, view_count, published_at, deleted_at, created_at, updated_at";
