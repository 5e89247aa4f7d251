//! # Airfare Client
//!
//! Client-side layer for an airfare search service. A search returns a flight
//! list together with a discriminator saying how closely the flights match the
//! requested dates; this crate classifies that into a presentation intent,
//! keeps the last good result for the session, renders it as rows carrying
//! drill-down tokens, and turns the price forecast for a chosen route into a
//! sorted series and an SVG line chart.

pub mod classifier;
pub mod client;
pub mod controller;
pub mod forecast;
pub mod logging;
pub mod render;
pub mod session;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// Re-export main types for convenience
pub use classifier::{classify, classify_response, Banner, BannerLevel, PresentationIntent};
pub use client::{FareClient, FareService, RawPricePoint, RawPriceSeries, RawSearchResponse};
pub use controller::{Action, Notice, NoticeKind, Outcome, Phase, Session};
pub use forecast::{normalize_series, Forecast, ForecastChart, MalformedPricePoint, PricePoint, PriceSeries};
pub use render::{ActionToken, ResultView, Row};
pub use session::SessionStore;

/// Base URL of the fare service when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Applied to both remote calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Currency every price is quoted in
pub const CURRENCY: &str = "RUB";

/// Error types for the airfare client
#[derive(Error, Debug)]
pub enum FareError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Fare service responded with status {status}")]
    StatusError { status: reqwest::StatusCode },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unrecognised result discriminator: {0}")]
    ClassificationError(String),

    #[error("No forecast data available")]
    NoForecastData,

    #[error("Unsupported city: {0}")]
    UnknownCity(String),

    #[error("Chart rendering failed: {0}")]
    ChartError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FareError {
    /// Network failures, bad statuses, timeouts and undecodable bodies.
    /// These are the transient, dismissible failures of a remote call.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            FareError::HttpError(_)
                | FareError::StatusError { .. }
                | FareError::Timeout(_)
                | FareError::MalformedResponse(_)
        )
    }
}

/// Connection settings for the fare service
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Cities the fare service knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    Tokyo,
    Singapore,
    Beijing,
    #[serde(rename = "Hong Kong")]
    HongKong,
    Manila,
    Taipei,
    Gatwick,
    #[serde(rename = "Los Angeles")]
    LosAngeles,
}

impl City {
    pub fn all() -> &'static [City] {
        &[
            City::Tokyo,
            City::Singapore,
            City::Beijing,
            City::HongKong,
            City::Manila,
            City::Taipei,
            City::Gatwick,
            City::LosAngeles,
        ]
    }

    /// Name as sent to and received from the fare service
    pub fn label(self) -> &'static str {
        match self {
            City::Tokyo => "Tokyo",
            City::Singapore => "Singapore",
            City::Beijing => "Beijing",
            City::HongKong => "Hong Kong",
            City::Manila => "Manila",
            City::Taipei => "Taipei",
            City::Gatwick => "Gatwick",
            City::LosAngeles => "Los Angeles",
        }
    }

    /// Whitespace-free form, handy on a command line
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for City {
    type Err = FareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        City::all()
            .iter()
            .copied()
            .find(|city| city.label().replace(' ', "").to_lowercase() == folded)
            .ok_or_else(|| FareError::UnknownCity(s.to_string()))
    }
}

/// Ordered departure/destination pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    departure: City,
    destination: City,
}

impl Route {
    pub fn new(departure: City, destination: City) -> Self {
        Self {
            departure,
            destination,
        }
    }

    pub fn departure(&self) -> City {
        self.departure
    }

    pub fn destination(&self) -> City {
        self.destination
    }

    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("departure_city", self.departure.label().to_string()),
            ("destination_city", self.destination.label().to_string()),
        ]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.departure, self.destination)
    }
}

/// Requested travel dates. Ordering between the two is left to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub departure: NaiveDate,
    pub return_date: NaiveDate,
}

impl DateRange {
    pub fn new(departure: NaiveDate, return_date: NaiveDate) -> Self {
        Self {
            departure,
            return_date,
        }
    }

    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("departure_date", self.departure.format("%Y-%m-%d").to_string()),
            ("return_date", self.return_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Opaque flight identifier assigned by the service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightId(String);

impl FlightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Individual flight information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub route: Route,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub carrier: String,
    pub price: Decimal,
}

/// Classified outcome of one successful search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub flights: Vec<Flight>,
    pub intent: PresentationIntent,
}

impl SearchResult {
    /// The `occurrence`-th flight (zero based) carrying `id`
    pub fn find_flight(&self, id: &FlightId, occurrence: usize) -> Option<&Flight> {
        self.flights.iter().filter(|f| &f.id == id).nth(occurrence)
    }
}

/// One-shot search: build a client for `config` and classify the answer
pub async fn get_search_result(config: ClientConfig, route: Route, dates: DateRange) -> Result<SearchResult, FareError> {
    let client = FareClient::with_config(config)?;
    let raw = client.search_flights(&route, &dates).await?;
    classify_response(raw)
}

/// One-shot forecast: build a client for `config` and normalise the series
pub async fn get_price_forecast(config: ClientConfig, route: Route) -> Result<Forecast, FareError> {
    let client = FareClient::with_config(config)?;
    let raw = client.fetch_price_forecast(&route).await?;
    normalize_series(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_parsing() {
        assert_eq!("Tokyo".parse::<City>().unwrap(), City::Tokyo);
        assert_eq!("singapore".parse::<City>().unwrap(), City::Singapore);
        assert_eq!("Hong Kong".parse::<City>().unwrap(), City::HongKong);
        assert_eq!("hong-kong".parse::<City>().unwrap(), City::HongKong);
        assert_eq!("los_angeles".parse::<City>().unwrap(), City::LosAngeles);
        assert!(matches!("Paris".parse::<City>(), Err(FareError::UnknownCity(c)) if c == "Paris"));
        assert!("".parse::<City>().is_err());
    }

    #[test]
    fn test_city_slug_round_trips() {
        for city in City::all() {
            assert_eq!(city.slug().parse::<City>().unwrap(), *city);
        }
    }

    #[test]
    fn test_route_query_params() {
        let route = Route::new(City::Tokyo, City::LosAngeles);
        let params = route.query_params();
        assert_eq!(params[0], ("departure_city", "Tokyo".to_string()));
        assert_eq!(params[1], ("destination_city", "Los Angeles".to_string()));
        assert_eq!(route.to_string(), "Tokyo -> Los Angeles");
    }

    #[test]
    fn test_date_range_query_params() {
        let dates = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 9).unwrap(),
        );
        let params = dates.query_params();
        assert_eq!(params[0], ("departure_date", "2024-05-01".to_string()));
        // No ordering is enforced locally
        assert_eq!(params[1], ("return_date", "2024-04-09".to_string()));
    }

    #[test]
    fn test_request_error_grouping() {
        assert!(FareError::Timeout(DEFAULT_TIMEOUT).is_request_error());
        assert!(FareError::StatusError { status: reqwest::StatusCode::BAD_GATEWAY }.is_request_error());
        assert!(FareError::MalformedResponse("x".into()).is_request_error());
        assert!(!FareError::ClassificationError("7".into()).is_request_error());
        assert!(!FareError::NoForecastData.is_request_error());
    }

    #[test]
    fn test_find_flight_by_occurrence() {
        let flight = |carrier: &str| Flight {
            id: FlightId::new("7"),
            route: Route::new(City::Manila, City::Taipei),
            departure_time: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap(),
            arrival_time: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 0, 0).unwrap(),
            carrier: carrier.to_string(),
            price: Decimal::from(300),
        };
        let result = SearchResult {
            flights: vec![flight("A"), flight("B")],
            intent: PresentationIntent::Exact,
        };

        let id = FlightId::new("7");
        assert_eq!(result.find_flight(&id, 0).unwrap().carrier, "A");
        assert_eq!(result.find_flight(&id, 1).unwrap().carrier, "B");
        assert!(result.find_flight(&id, 2).is_none());
        assert!(result.find_flight(&FlightId::new("8"), 0).is_none());
    }
}
