pub mod analytics;
pub mod csv_export;
pub mod filters;
pub mod handlers;
pub mod import;
pub mod jst;
pub mod repository;
pub mod status;
