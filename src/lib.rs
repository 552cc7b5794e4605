//! Foglio: backend for a multi-author publishing system.
//!
//! The interesting part is the consistency machinery between the two stores:
//!
//! - Postgres is authoritative for content records and their committed view
//!   counts ([`infra::db`]).
//! - A shared volatile store absorbs the view stream and holds cache-aside
//!   query results ([`cache`], [`infra::volatile`]).
//! - Mutations go through optimistic version checks
//!   ([`application::posts`]), invalidating derived cache entries before the
//!   caller sees the commit.
//! - A periodic job ratchets live counters into Postgres without locks or
//!   lost increments ([`application::reconcile`]).
//!
//! HTTP routing, authentication, and presentation live in external services;
//! they consume [`application::feed::FeedService`],
//! [`application::posts::PostService`], and the reconciliation entry points.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
