//! Rockfall risk estimation service for mine sites.
//!
//! A `/predict` request is resolved into a feature vector (from the request
//! itself, or from the precipitation forecast and random defaults for map
//! clicks), scored by a classifier loaded at startup and returned with two
//! inline PNG charts.

pub mod charts;
pub mod config;
pub mod evaluator;
pub mod model;
pub mod resolver;
pub mod routes;
pub mod types;
pub mod weather;

pub use routes::{router, AppState};
