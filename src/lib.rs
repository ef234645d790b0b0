pub mod address;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod quality;
pub mod resolution;
