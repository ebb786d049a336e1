//! Aggregates air quality readings from Balkan monitoring networks, computes
//! US-EPA-style AQI values, and serves cached station rankings and statistics.

pub mod analysis;
pub mod api;
pub mod aqi;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
