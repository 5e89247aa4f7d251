//! HTTP client and response parsing for the fare service

use crate::{City, ClientConfig, DateRange, FareError, Flight, FlightId, Route};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

const FLIGHTS_PATH: &str = "api/flights";
const FORECAST_PATH: &str = "api/price_forecast";

/// Accepted wire layouts for flight timestamps, tried in order after RFC 3339 and RFC 2822
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Flight search response as sent by the service
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchResponse {
    pub flights: Vec<RawFlightRow>,
    /// Match-quality discriminator; kept loose so unknown values reach the classifier
    #[serde(default)]
    pub alternative_results: Option<serde_json::Value>,
}

/// Positional flight row: id, from, to, departure, arrival, carrier, price
#[derive(Debug, Clone, Deserialize)]
pub struct RawFlightRow(
    pub RawId,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub Decimal,
);

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for FlightId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => FlightId::new(n.to_string()),
            RawId::Text(s) => FlightId::new(s),
        }
    }
}

/// One `[date, price]` pair of the forecast feed, date still as text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPricePoint(pub String, pub Decimal);

pub type RawPriceSeries = Vec<RawPricePoint>;

/// The two remote operations the interaction loop depends on
#[async_trait]
pub trait FareService: Send + Sync {
    async fn search_flights(&self, route: &Route, dates: &DateRange) -> Result<RawSearchResponse, FareError>;

    async fn fetch_price_forecast(&self, route: &Route) -> Result<RawPriceSeries, FareError>;
}

/// HTTP client for the fare service
pub struct FareClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl FareClient {
    /// Create a client pointed at the default local service
    pub fn new() -> Result<Self, FareError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, FareError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout.as_millis(), "Creating fare client");
        let http_client = Client::builder()
            .user_agent(concat!("airfare-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query flights for a route and both travel dates
    #[instrument(level = "info", skip(self), fields(route = %route))]
    pub async fn search_flights(&self, route: &Route, dates: &DateRange) -> Result<RawSearchResponse, FareError> {
        let mut params = route.query_params().to_vec();
        params.extend(dates.query_params());

        let response = self.get(FLIGHTS_PATH, &params).await?;
        let raw: RawSearchResponse = self.decode(response).await?;
        info!(
            rows = raw.flights.len(),
            discriminator = ?raw.alternative_results,
            "Flight search response decoded"
        );
        Ok(raw)
    }

    /// Query the price history/forecast for a route; dates are not sent
    #[instrument(level = "info", skip(self), fields(route = %route))]
    pub async fn fetch_price_forecast(&self, route: &Route) -> Result<RawPriceSeries, FareError> {
        let response = self.get(FORECAST_PATH, &route.query_params()).await?;
        let raw: RawPriceSeries = self.decode(response).await?;
        info!(points = raw.len(), "Price forecast response decoded");
        Ok(raw)
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Response, FareError> {
        let url = format!("{}/{}", self.base_url, path);
        info!(url = %url, "Making HTTP request to fare service");

        let start_time = Instant::now();
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "HTTP request completed"
        );

        if !status.is_success() {
            error!(status = %status, "HTTP request failed");
            return Err(FareError::StatusError { status });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, FareError> {
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(body_length = body.len(), "Received response body");
        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Response body did not match the expected shape");
            FareError::MalformedResponse(e.to_string())
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> FareError {
        if e.is_timeout() {
            FareError::Timeout(self.timeout)
        } else {
            FareError::HttpError(e)
        }
    }
}

#[async_trait]
impl FareService for FareClient {
    async fn search_flights(&self, route: &Route, dates: &DateRange) -> Result<RawSearchResponse, FareError> {
        FareClient::search_flights(self, route, dates).await
    }

    async fn fetch_price_forecast(&self, route: &Route) -> Result<RawPriceSeries, FareError> {
        FareClient::fetch_price_forecast(self, route).await
    }
}

/// Turn positional rows into flights. One bad row rejects the whole list.
pub fn parse_flights(rows: Vec<RawFlightRow>) -> Result<Vec<Flight>, FareError> {
    rows.into_iter().map(parse_flight_row).collect()
}

fn parse_flight_row(row: RawFlightRow) -> Result<Flight, FareError> {
    let RawFlightRow(id, from, to, departure, arrival, carrier, price) = row;
    let id = FlightId::from(id);

    let city = |name: &str| {
        name.parse::<City>()
            .map_err(|_| FareError::MalformedResponse(format!("flight {}: unsupported city {:?}", id, name)))
    };
    let route = Route::new(city(&from)?, city(&to)?);

    let departure_time = parse_timestamp(&departure)
        .map_err(|e| FareError::MalformedResponse(format!("flight {}: departure {}", id, e)))?;
    let arrival_time = parse_timestamp(&arrival)
        .map_err(|e| FareError::MalformedResponse(format!("flight {}: arrival {}", id, e)))?;

    Ok(Flight {
        id,
        route,
        departure_time,
        arrival_time,
        carrier,
        price,
    })
}

/// Parse a wire timestamp, keeping the wall-clock time it was sent with
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Ok(dt.naive_local());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("unrecognised timestamp {:?}", value))
}
