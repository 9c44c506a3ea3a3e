pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod data_forms;
pub mod masters;
pub mod reports;
pub mod school_data;
pub mod setup;
pub mod users;
