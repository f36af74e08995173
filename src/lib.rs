//! feedrank - personalized news feed ranking and story clustering
//!
//! This crate decides, per request, which articles a viewer sees and in what
//! order. It scores candidates from independent personalization signals,
//! re-ranks for diversity, and groups duplicate coverage of the same event
//! into story clusters.

pub mod cluster;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod model;
pub mod options;
pub mod ranker;
pub mod routes;
pub mod scorer;
pub mod signals;
pub mod store;

pub use cluster::{cluster_articles, title_similarity, ClusterConfig};
pub use error::FeedError;
pub use feed::FeedService;
