//! Interaction state machine for one user session
//!
//! Every user interaction goes through [`Session::dispatch`] and is handled to
//! completion before the next one. Remote failures become a [`Notice`]; they
//! never end the session and never clear results already on screen.

use crate::forecast::{normalize_series, Forecast};
use crate::{classify_response, ActionToken, DateRange, FareError, FareService, PresentationIntent, ResultView, Route, SessionStore};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Searching,
    Displaying(PresentationIntent),
    DrillingDown,
    ShowingForecast,
    /// A notice is showing; any stored results stay visible underneath
    Error,
}

/// Everything a user can do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Submit { route: Route, dates: DateRange },
    DrillDown(ActionToken),
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    /// Network failure, bad status, timeout or undecodable body
    Request,
    /// The service sent a discriminator outside the known three
    Classification,
    /// Every forecast point was malformed, or there were none
    NoForecastData,
    /// Token does not belong to the result on screen
    UnknownAction,
    /// Failure on this side of the wire, such as writing the chart
    Local,
}

/// Transient, dismissible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn from_error(error: &FareError) -> Self {
        match error {
            e if e.is_request_error() => Self {
                kind: NoticeKind::Request,
                message: format!("Failed to fetch data from the fare service: {}", e),
            },
            FareError::ClassificationError(value) => Self {
                kind: NoticeKind::Classification,
                message: format!("The fare service returned a result type this client does not understand ({})", value),
            },
            FareError::NoForecastData => Self {
                kind: NoticeKind::NoForecastData,
                message: "No forecast data is available for this route".to_string(),
            },
            other => Self {
                kind: NoticeKind::Local,
                message: other.to_string(),
            },
        }
    }

    fn unknown_action(token: &ActionToken) -> Self {
        Self {
            kind: NoticeKind::UnknownAction,
            message: format!("{} does not match any flight on screen", token),
        }
    }
}

/// Result of one dispatched action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new result is stored; read it back through [`Session::current_view`]
    Results { intent: PresentationIntent, flights: usize },
    Forecast { route: Route, forecast: Forecast },
    Notice(Notice),
    Dismissed,
}

/// One user session: a fare service handle, its result store and its phase
pub struct Session<S> {
    service: S,
    store: SessionStore,
    phase: Phase,
    notice: Option<Notice>,
}

impl<S: FareService> Session<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            store: SessionStore::new(),
            phase: Phase::Idle,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Rows and banner of the last successful search, if any
    pub fn current_view(&self) -> Option<ResultView<'_>> {
        self.store.get().map(ResultView::new)
    }

    /// Single entry point for user interactions
    pub async fn dispatch(&mut self, action: Action) -> Outcome {
        match action {
            Action::Submit { route, dates } => self.submit(route, dates).await,
            Action::DrillDown(token) => self.drill_down(&token).await,
            Action::Dismiss => {
                self.notice = None;
                let resting = self.resting_phase();
                self.transition(resting);
                Outcome::Dismissed
            }
        }
    }

    #[instrument(level = "info", skip(self), fields(route = %route))]
    async fn submit(&mut self, route: Route, dates: DateRange) -> Outcome {
        self.transition(Phase::Searching);

        let result = self
            .service
            .search_flights(&route, &dates)
            .await
            .and_then(classify_response);

        match result {
            Ok(result) => {
                let intent = result.intent;
                let flights = result.flights.len();
                self.store.put(result);
                self.notice = None;
                self.transition(Phase::Displaying(intent));
                info!(intent = intent.label(), flights, "Search completed");
                Outcome::Results { intent, flights }
            }
            Err(e) => self.fail(Notice::from_error(&e)),
        }
    }

    #[instrument(level = "info", skip(self), fields(token = %token))]
    async fn drill_down(&mut self, token: &ActionToken) -> Outcome {
        let route = match self.current_view().and_then(|view| view.resolve(token)) {
            Some(flight) => flight.route,
            None => return self.fail(Notice::unknown_action(token)),
        };

        self.transition(Phase::DrillingDown);

        let forecast = self
            .service
            .fetch_price_forecast(&route)
            .await
            .and_then(normalize_series);

        match forecast {
            Ok(forecast) => {
                self.notice = None;
                self.transition(Phase::ShowingForecast);
                info!(
                    points = forecast.series.len(),
                    rejected = forecast.rejected.len(),
                    "Forecast ready"
                );
                Outcome::Forecast { route, forecast }
            }
            Err(e) => self.fail(Notice::from_error(&e)),
        }
    }

    fn fail(&mut self, notice: Notice) -> Outcome {
        warn!(kind = ?notice.kind, message = %notice.message, "Interaction failed");
        self.notice = Some(notice.clone());
        self.transition(Phase::Error);
        Outcome::Notice(notice)
    }

    fn resting_phase(&self) -> Phase {
        match self.store.get() {
            Some(result) => Phase::Displaying(result.intent),
            None => Phase::Idle,
        }
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
    }
}
