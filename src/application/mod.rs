pub mod error;
pub mod feed;
pub mod jobs;
pub mod posts;
pub mod reconcile;
pub mod repos;
