#![forbid(unsafe_code)]

//! Caching proxy in front of a third-party drama streaming catalogue.
//!
//! Upstream documents are fetched through [`upstream::Upstream`], memoised by
//! [`cache::FetchCache`], reshaped by [`stream`] and [`enrich`], and served by
//! the axum router in [`api`].

pub mod api;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod model;
pub mod stream;
pub mod upstream;
pub mod video_id;
