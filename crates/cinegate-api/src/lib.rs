//! TMDB gateway library for cinegate.
//!
//! Provides a caching, rate-limited, key-rotating, retrying fetch layer
//! over the TMDB API for use by route handlers.

/// TMDB gateway.
pub mod tmdb;
