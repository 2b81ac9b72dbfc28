pub mod api;
pub mod classifier;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod popup;
pub mod seen_state;
pub mod separator;
pub mod utils;
