pub mod db;
pub mod error;
pub mod telemetry;
pub mod volatile;
