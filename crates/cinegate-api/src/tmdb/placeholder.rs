//! Synthetic payloads served when retries are exhausted.
//!
//! Only endpoints listed here get a placeholder. The payloads mimic the
//! real response shapes (`page`, `results`, `total_pages`,
//! `total_results`, `genres`) but every title and id is obviously fake.

use chrono::{Days, NaiveDate, Utc};
use serde_json::{Value, json};

/// Number of synthetic items in a listing placeholder.
const LISTING_SIZE: u64 = 20;

/// Shape of the placeholder registered for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Paginated list of movies or shows.
    Listing,
    /// Genre list.
    Genres,
    /// Upcoming movies with a release-date window.
    Upcoming,
}

/// Endpoint registry, without leading `/`.
const REGISTRY: &[(&str, PlaceholderKind)] = &[
    ("trending/movie/day", PlaceholderKind::Listing),
    ("trending/tv/day", PlaceholderKind::Listing),
    ("movie/popular", PlaceholderKind::Listing),
    ("movie/top_rated", PlaceholderKind::Listing),
    ("movie/now_playing", PlaceholderKind::Listing),
    ("movie/upcoming", PlaceholderKind::Upcoming),
    ("tv/popular", PlaceholderKind::Listing),
    ("tv/top_rated", PlaceholderKind::Listing),
    ("discover/movie", PlaceholderKind::Listing),
    ("discover/tv", PlaceholderKind::Listing),
    ("search/multi", PlaceholderKind::Listing),
    ("genre/movie/list", PlaceholderKind::Genres),
    ("genre/tv/list", PlaceholderKind::Genres),
];

impl PlaceholderKind {
    /// Looks up the placeholder registered for `endpoint`.
    #[must_use]
    pub fn for_endpoint(endpoint: &str) -> Option<Self> {
        let endpoint = endpoint.trim_start_matches('/');
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == endpoint)
            .map(|&(_, kind)| kind)
    }

    /// Builds the payload for this kind, dated relative to `today`.
    #[must_use]
    pub fn payload(self, today: NaiveDate) -> Value {
        match self {
            Self::Listing => listing(),
            Self::Genres => json!({ "genres": genres() }),
            Self::Upcoming => upcoming(today),
        }
    }
}

/// Endpoints that have a registered placeholder.
pub fn registered_endpoints() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|&(endpoint, _)| endpoint)
}

/// Listing endpoints, used for cache warm-up.
pub fn listing_endpoints() -> impl Iterator<Item = &'static str> {
    REGISTRY
        .iter()
        .filter(|(_, kind)| *kind == PlaceholderKind::Listing)
        .map(|&(endpoint, _)| endpoint)
}

/// Returns the placeholder for `endpoint`, or `None` if it has none.
#[must_use]
pub fn placeholder_for(endpoint: &str) -> Option<Value> {
    PlaceholderKind::for_endpoint(endpoint).map(|kind| kind.payload(Utc::now().date_naive()))
}

fn genres() -> Value {
    json!([
        { "id": 28, "name": "Action" },
        { "id": 35, "name": "Comedy" },
        { "id": 18, "name": "Drama" },
        { "id": 27, "name": "Horror" },
        { "id": 878, "name": "Science Fiction" }
    ])
}

fn listing() -> Value {
    let results: Vec<Value> = (1..=LISTING_SIZE)
        .map(|n| {
            json!({
                "id": n,
                "title": format!("Sample Movie {n}"),
                "name": format!("Sample Show {n}"),
                "overview": "This is sample content while the API is unavailable.",
                "poster_path": "/sample.jpg",
                "backdrop_path": "/sample-backdrop.jpg",
                "release_date": "2024-01-01",
                "first_air_date": "2024-01-01",
                "vote_average": 7.5,
                "genres": [{ "id": 1, "name": "Action" }]
            })
        })
        .collect();

    json!({
        "page": 1,
        "results": results,
        "total_pages": 1,
        "total_results": LISTING_SIZE,
        "genres": genres()
    })
}

fn upcoming(today: NaiveDate) -> Value {
    let date_after = |days: u64| {
        today
            .checked_add_days(Days::new(days))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string()
    };

    let entries = [
        (1001, "Sample Upcoming Movie 1", 30, 8.2, [(878, "Science Fiction"), (12, "Adventure")]),
        (1002, "Sample Upcoming Movie 2", 60, 8.8, [(28, "Action"), (80, "Crime")]),
        (1003, "Sample Upcoming Movie 3", 90, 9.1, [(16, "Animation"), (28, "Action")]),
        (1004, "Sample Upcoming Movie 4", 120, 8.5, [(28, "Action"), (53, "Thriller")]),
        (1005, "Sample Upcoming Movie 5", 180, 8.9, [(878, "Science Fiction"), (18, "Drama")]),
    ];

    let results: Vec<Value> = entries
        .iter()
        .map(|&(id, title, days, vote, genre_pair)| {
            let genres: Vec<Value> = genre_pair
                .iter()
                .map(|&(gid, name)| json!({ "id": gid, "name": name }))
                .collect();
            json!({
                "id": id,
                "title": title,
                "overview": "This is sample content while the API is unavailable.",
                "poster_path": format!("/sample-upcoming{}.jpg", id - 1000),
                "backdrop_path": format!("/sample-upcoming{}-backdrop.jpg", id - 1000),
                "release_date": date_after(days),
                "vote_average": vote,
                "genres": genres
            })
        })
        .collect();

    json!({
        "page": 1,
        "total_pages": 1,
        "total_results": results.len(),
        "results": results,
        "dates": {
            "minimum": date_after(0),
            "maximum": date_after(365)
        }
    })
}
