//! Web Search Clients
//!
//! This module provides the search side of the pipeline:
//!
//! - [`client`] - The [`SearchClient`] trait and [`SearchProvider`] factory
//! - `serper` - Google results via google.serper.dev (feature `serper`)
//! - `duckduckgo` - Keyless search via daedra (feature `duckduckgo`)
//! - [`cluster`] - URL normalization, deduplication and topical clustering
//!
//! # Usage
//!
//! ```ignore
//! use quarry::search::SearchProvider;
//! use quarry::types::SearchQuery;
//!
//! let client = SearchProvider::DuckDuckGo.create_client()?;
//! let hits = client
//!     .search(&SearchQuery { text: "rust agents".into(), locale: None, limit: 5 })
//!     .await?;
//! for hit in hits {
//!     println!("{}: {}", hit.title, hit.url);
//! }
//! ```

/// Search client trait and provider selection.
pub mod client;
/// Deterministic dedup and clustering of search results.
pub mod cluster;

#[cfg(feature = "duckduckgo")]
pub mod duckduckgo;

#[cfg(feature = "serper")]
pub mod serper;

pub use client::{SearchClient, SearchProvider};
pub use cluster::{normalize_url, ItemCluster, QueryOutcome, SearchFindings};
