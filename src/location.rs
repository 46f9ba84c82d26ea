//! One-shot position acquisition with a bounded wait and a fixed fallback.
//!
//! The position is written once into a [`LocationCell`] and read by every
//! request built afterwards. Whatever happens (no capability, error, timeout)
//! the cell ends up holding a value.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LocationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Where a position can come from on this machine.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSource {
    /// Nothing to ask: the fallback is used straight away.
    Unavailable,
    Fixed(Location),
    /// Low-accuracy IP geolocation endpoint.
    Http(String),
}

#[derive(Deserialize)]
struct GeoIpResponse {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
}

impl LocationSource {
    pub async fn current_position(&self, client: &Client) -> Result<Location, LocationError> {
        match self {
            LocationSource::Unavailable => Err(LocationError::Unavailable),
            LocationSource::Fixed(location) => Ok(*location),
            LocationSource::Http(url) => {
                let response = client.get(url).send().await?;

                if !response.status().is_success() {
                    return Err(LocationError::Status(response.status().as_u16()));
                }

                let geo: GeoIpResponse = response.json().await?;
                Ok(Location { lat: geo.lat, lon: geo.lon })
            }
        }
    }
}

/// Write-once holder for the user's position, shared between the acquiring
/// task and the request builder.
#[derive(Debug, Clone, Default)]
pub struct LocationCell(Arc<OnceLock<Location>>);

impl LocationCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Location> {
        self.0.get().copied()
    }

    /// Stores `location` unless a value is already there. Returns whether it
    /// was stored.
    pub fn set_if_unset(&self, location: Location) -> bool {
        self.0.set(location).is_ok()
    }
}

/// Runs `lookup` for at most `timeout` and stores its result, or `fallback` on
/// error or timeout. Returns the value the cell holds afterwards.
pub async fn resolve_with_fallback<F>(
    lookup: F,
    timeout: Duration,
    fallback: Location,
    cell: &LocationCell,
) -> Location
where
    F: Future<Output = Result<Location, LocationError>>,
{
    let outcome = match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout(timeout)),
    };

    match outcome {
        Ok(location) => {
            info!(%location, "position acquired");
            cell.set_if_unset(location);
        }
        Err(LocationError::Unavailable) => {
            debug!(%fallback, "no location capability, using fallback");
            cell.set_if_unset(fallback);
        }
        Err(e) => {
            warn!(error = %e, %fallback, "geolocation failed, using fallback");
            cell.set_if_unset(fallback);
        }
    }

    cell.get().unwrap_or(fallback)
}

/// Acquires the position once from `source`.
pub async fn acquire(
    source: &LocationSource,
    client: &Client,
    timeout: Duration,
    fallback: Location,
    cell: &LocationCell,
) -> Location {
    if *source == LocationSource::Unavailable {
        // No capability means no wait.
        return resolve_with_fallback(
            async { Err(LocationError::Unavailable) },
            timeout,
            fallback,
            cell,
        )
        .await;
    }

    resolve_with_fallback(source.current_position(client), timeout, fallback, cell).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: Location = Location { lat: 48.1173, lon: -1.6778 };

    #[test]
    fn test_cell_is_write_once() {
        let cell = LocationCell::new();
        assert_eq!(cell.get(), None);
        assert!(cell.set_if_unset(Location { lat: 1.0, lon: 2.0 }));
        assert!(!cell.set_if_unset(Location { lat: 3.0, lon: 4.0 }));
        assert_eq!(cell.get(), Some(Location { lat: 1.0, lon: 2.0 }));
    }

    #[test]
    fn test_cell_clones_share_value() {
        let cell = LocationCell::new();
        let reader = cell.clone();
        cell.set_if_unset(FALLBACK);
        assert_eq!(reader.get(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn test_lookup_that_never_resolves_falls_back() {
        let cell = LocationCell::new();
        let location = resolve_with_fallback(
            std::future::pending(),
            Duration::from_millis(20),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, FALLBACK);
        assert_eq!(cell.get(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn test_lookup_error_falls_back() {
        let cell = LocationCell::new();
        let location = resolve_with_fallback(
            async { Err(LocationError::Status(503)) },
            Duration::from_secs(1),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, FALLBACK);
    }

    #[tokio::test]
    async fn test_lookup_success_is_stored() {
        let cell = LocationCell::new();
        let here = Location { lat: 48.11, lon: -1.67 };
        let location = resolve_with_fallback(
            async move { Ok(here) },
            Duration::from_secs(1),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, here);
        assert_eq!(cell.get(), Some(here));
    }

    #[tokio::test]
    async fn test_existing_value_is_kept() {
        let cell = LocationCell::new();
        let first = Location { lat: 10.0, lon: 20.0 };
        cell.set_if_unset(first);

        let location = resolve_with_fallback(
            std::future::pending(),
            Duration::from_millis(10),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, first);
    }

    #[tokio::test]
    async fn test_unavailable_source_uses_fallback_without_waiting() {
        let cell = LocationCell::new();
        let started = std::time::Instant::now();
        let location = acquire(
            &LocationSource::Unavailable,
            &Client::new(),
            Duration::from_secs(30),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, FALLBACK);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fixed_source() {
        let cell = LocationCell::new();
        let fixed = Location { lat: 47.2, lon: -1.55 };
        let location = acquire(
            &LocationSource::Fixed(fixed),
            &Client::new(),
            Duration::from_secs(1),
            FALLBACK,
            &cell,
        )
        .await;

        assert_eq!(location, fixed);
    }

    #[test]
    fn test_display() {
        assert_eq!(FALLBACK.to_string(), "48.1173, -1.6778");
    }
}
