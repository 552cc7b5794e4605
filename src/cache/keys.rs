//! Cache and counter key construction.
//!
//! Every key the subsystem writes to the volatile store is built here, so the
//! invalidation patterns in one place provably cover the keys the read path
//! produces. Counter keys live under `views:`, query-cache keys under `q:`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::application::repos::{PostListFilter, PostListPageRequest};

const COUNTER_PREFIX: &str = "views:";
const DETAIL_PREFIX: &str = "q:post:";
const LIST_PREFIX: &str = "q:list:";

/// Key for a record's live view counter.
pub fn counter_key(post_id: Uuid) -> String {
    format!("{COUNTER_PREFIX}{post_id}")
}

/// Pattern matching every live view counter.
pub fn counter_pattern() -> String {
    format!("{COUNTER_PREFIX}*")
}

/// Parse a record id back out of a counter key, for reconciliation scans.
pub fn post_id_from_counter_key(key: &str) -> Option<Uuid> {
    key.strip_prefix(COUNTER_PREFIX)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Key for a single-record detail projection.
pub fn detail_key(post_id: Uuid) -> String {
    format!("{DETAIL_PREFIX}{post_id}")
}

/// Key for one list page. List results embed pagination and filter
/// parameters, so the key carries a hash of both; invalidation drops the
/// whole prefix instead of enumerating combinations.
pub fn list_key(author_id: Option<Uuid>, filter: &PostListFilter, page: &PostListPageRequest) -> String {
    let hash = hash_list_query(filter, page);
    match author_id {
        Some(author) => format!("{LIST_PREFIX}{author}:{hash:016x}"),
        None => format!("{LIST_PREFIX}all:{hash:016x}"),
    }
}

/// Prefix covering list entries not scoped to a single author.
pub fn list_prefix_all() -> String {
    format!("{LIST_PREFIX}all:")
}

/// Prefix covering list entries scoped to one author.
pub fn list_prefix_author(author_id: Uuid) -> String {
    format!("{LIST_PREFIX}{author_id}:")
}

fn hash_list_query(filter: &PostListFilter, page: &PostListPageRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    filter.status.map(|s| s.as_str()).hash(&mut hasher);
    filter.search.hash(&mut hasher);
    page.limit.hash(&mut hasher);
    page.offset.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::types::PostStatus;

    fn filter(search: Option<&str>) -> PostListFilter {
        PostListFilter {
            author_id: None,
            status: Some(PostStatus::Published),
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn counter_key_round_trips() {
        let id = Uuid::new_v4();
        let key = counter_key(id);
        assert_eq!(post_id_from_counter_key(&key), Some(id));
    }

    #[test]
    fn counter_key_rejects_foreign_keys() {
        assert_eq!(post_id_from_counter_key("q:post:nope"), None);
        assert_eq!(post_id_from_counter_key("views:not-a-uuid"), None);
    }

    #[test]
    fn list_keys_are_stable_and_filter_sensitive() {
        let page = PostListPageRequest {
            limit: 20,
            offset: 0,
        };
        let a = list_key(None, &filter(None), &page);
        let b = list_key(None, &filter(None), &page);
        let c = list_key(None, &filter(Some("rust")), &page);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("q:list:all:"));
    }

    #[test]
    fn author_scoped_keys_fall_under_author_prefix() {
        let author = Uuid::new_v4();
        let page = PostListPageRequest {
            limit: 20,
            offset: 0,
        };
        let key = list_key(Some(author), &filter(None), &page);
        assert!(key.starts_with(&list_prefix_author(author)));
        assert!(!key.starts_with(&list_prefix_all()));
    }
}
