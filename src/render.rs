//! Turns a search result into a banner and drill-down rows

use crate::{Banner, Flight, FlightId, SearchResult, CURRENCY};
use std::collections::HashMap;
use std::fmt;
use std::slice;

const TOKEN_PREFIX: &str = "fc";
const ID_SEPARATOR: char = '-';
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Drill-down handle for one rendered row.
///
/// Bound to the flight id. The first row with an id reads `fc-<id>`; later rows
/// with the same id read `fc<n>-<id>`. The occurrence sits before the first `-`
/// and holds only digits, so any id text after it is taken verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionToken {
    flight_id: FlightId,
    occurrence: usize,
}

impl ActionToken {
    pub fn new(flight_id: FlightId, occurrence: usize) -> Self {
        Self { flight_id, occurrence }
    }

    pub fn flight_id(&self) -> &FlightId {
        &self.flight_id
    }

    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    /// Inverse of `Display`: `fc-<id>`, or `fc<n>-<id>` with n >= 2
    pub fn parse(token: &str) -> Option<Self> {
        let (occurrence, id) = token.trim().strip_prefix(TOKEN_PREFIX)?.split_once(ID_SEPARATOR)?;
        if id.is_empty() {
            return None;
        }

        let occurrence = match occurrence {
            "" => 0,
            n if n.bytes().all(|b| b.is_ascii_digit()) => match n.parse::<usize>() {
                Ok(n) if n >= 2 => n - 1,
                _ => return None,
            },
            _ => return None,
        };
        Some(Self::new(FlightId::new(id), occurrence))
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TOKEN_PREFIX)?;
        if self.occurrence > 0 {
            write!(f, "{}", self.occurrence + 1)?;
        }
        write!(f, "{}{}", ID_SEPARATOR, self.flight_id)
    }
}

/// One displayable flight line
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub text: String,
    pub token: ActionToken,
}

/// Read-only presentation of a stored search result
#[derive(Debug, Clone, Copy)]
pub struct ResultView<'a> {
    result: &'a SearchResult,
}

impl<'a> ResultView<'a> {
    pub fn new(result: &'a SearchResult) -> Self {
        Self { result }
    }

    /// Exactly one banner per render, chosen by the intent
    pub fn banner(&self) -> Banner {
        self.result.intent.banner()
    }

    /// Lazily formatted rows; each call starts from the first flight again
    pub fn rows(&self) -> Rows<'a> {
        Rows {
            flights: self.result.flights.iter(),
            seen: HashMap::new(),
        }
    }

    /// Flight a token was issued for, if it belongs to this result
    pub fn resolve(&self, token: &ActionToken) -> Option<&'a Flight> {
        self.result.find_flight(token.flight_id(), token.occurrence())
    }
}

impl<'a> IntoIterator for &ResultView<'a> {
    type Item = Row;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows()
    }
}

pub struct Rows<'a> {
    flights: slice::Iter<'a, Flight>,
    seen: HashMap<&'a FlightId, usize>,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let flight = self.flights.next()?;
        let count = self.seen.entry(&flight.id).or_insert(0);
        let occurrence = *count;
        *count += 1;

        Some(Row {
            text: describe(flight),
            token: ActionToken::new(flight.id.clone(), occurrence),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.flights.size_hint()
    }
}

impl ExactSizeIterator for Rows<'_> {}

fn describe(flight: &Flight) -> String {
    format!(
        "{}, {} - {}, Carrier: {}, Price: {} {}",
        flight.route,
        flight.departure_time.format(TIME_FORMAT),
        flight.arrival_time.format(TIME_FORMAT),
        flight.carrier,
        flight.price,
        CURRENCY,
    )
}
