//! Maps the search discriminator onto a presentation intent and its banner

use crate::client::{parse_flights, RawSearchResponse};
use crate::{FareError, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// How the listed flights relate to the requested dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationIntent {
    /// Flights match the requested dates
    Exact,
    /// Nothing on the requested dates; same route, any date
    SameRouteFallback,
    /// Nothing on the requested departure date; nearest dates instead
    AlternativeDateFallback,
}

impl PresentationIntent {
    /// Integer code used by the service
    pub fn code(self) -> i64 {
        match self {
            PresentationIntent::Exact => 0,
            PresentationIntent::SameRouteFallback => 1,
            PresentationIntent::AlternativeDateFallback => 2,
        }
    }

    /// Label form of the discriminator
    pub fn label(self) -> &'static str {
        match self {
            PresentationIntent::Exact => "exact",
            PresentationIntent::SameRouteFallback => "same-route-any-date",
            PresentationIntent::AlternativeDateFallback => "alternative-dates",
        }
    }

    pub fn banner(self) -> Banner {
        match self {
            PresentationIntent::Exact => Banner {
                level: BannerLevel::Success,
                message: "Found the following flights:",
            },
            PresentationIntent::SameRouteFallback => Banner {
                level: BannerLevel::Info,
                message: "Unfortunately there are no flights on the selected dates. \
                          Here are all available flights on this route:",
            },
            PresentationIntent::AlternativeDateFallback => Banner {
                level: BannerLevel::Warning,
                message: "Unfortunately no tickets were found for your departure date. \
                          Here are the closest alternatives that may suit you:",
            },
        }
    }

    fn all() -> [PresentationIntent; 3] {
        [
            PresentationIntent::Exact,
            PresentationIntent::SameRouteFallback,
            PresentationIntent::AlternativeDateFallback,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BannerLevel {
    Success,
    Info,
    Warning,
}

/// Message shown once above the result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: &'static str,
}

/// Classify a raw discriminator. Anything but the three known values is an error;
/// nothing is ever defaulted.
pub fn classify(discriminator: Option<&Value>) -> Result<PresentationIntent, FareError> {
    let value = discriminator
        .filter(|v| !v.is_null())
        .ok_or_else(|| FareError::ClassificationError("missing".to_string()))?;

    let intent = match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|code| PresentationIntent::all().into_iter().find(|i| i.code() == code)),
        Value::String(s) => PresentationIntent::all().into_iter().find(|i| i.label() == s.as_str()),
        _ => None,
    };

    intent.ok_or_else(|| {
        warn!(discriminator = %value, "Unrecognised result discriminator");
        FareError::ClassificationError(value.to_string())
    })
}

/// Classify a search response and parse its flights into a result set
pub fn classify_response(raw: RawSearchResponse) -> Result<SearchResult, FareError> {
    let intent = classify(raw.alternative_results.as_ref())?;
    let flights = parse_flights(raw.flights)?;
    debug!(intent = intent.label(), flights = flights.len(), "Search response classified");
    Ok(SearchResult { flights, intent })
}
