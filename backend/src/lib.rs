pub mod accounts;
pub mod alerts;
pub mod cache;
pub mod config;
pub mod db;
pub mod jobs;
pub mod metrics;
pub mod notifications;
pub mod pricing;
pub mod stocks;
pub mod watchlists;

pub mod error;
pub mod time;
