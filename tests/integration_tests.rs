//! Integration tests for airfare-client
//!
//! These run `FareClient` against a local mock of the fare service to check
//! request encoding, failure classification and the full search/drill-down loop.

use airfare_client::{
    classify_response, get_price_forecast, get_search_result, normalize_series, Action, City, ClientConfig, DateRange,
    FareClient, FareError, NoticeKind, Outcome, Phase, PresentationIntent, Route, Session,
};
use chrono::NaiveDate;
use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;

fn client_for(server: &MockServer, timeout: Duration) -> FareClient {
    FareClient::with_config(ClientConfig {
        base_url: server.base_url(),
        timeout,
    })
    .unwrap()
}

fn tokyo_singapore() -> Route {
    Route::new(City::Tokyo, City::Singapore)
}

fn early_may() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
    )
}

#[tokio::test]
async fn test_search_sends_route_and_dates() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/flights")
                .query_param("departure_city", "Tokyo")
                .query_param("destination_city", "Singapore")
                .query_param("departure_date", "2024-05-01")
                .query_param("return_date", "2024-05-10");
            then.status(200).json_body(json!({
                "flights": [
                    [1, "Tokyo", "Singapore", "2024-05-03 09:00:00", "2024-05-03 15:10:00", "JAL", 21500],
                    [2, "Tokyo", "Singapore", "2024-05-04 11:30:00", "2024-05-04 17:45:00", "SQ", 19800]
                ],
                "alternative_results": "alternative-dates"
            }));
        })
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let raw = client.search_flights(&tokyo_singapore(), &early_may()).await.unwrap();
    mock.assert_async().await;

    let result = classify_response(raw).unwrap();
    assert_eq!(result.intent, PresentationIntent::AlternativeDateFallback);
    assert_eq!(result.flights.len(), 2);
    assert_eq!(result.flights[1].price, Decimal::from(19800));
}

#[tokio::test]
async fn test_multi_word_city_is_encoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/price_forecast")
                .query_param("departure_city", "Hong Kong")
                .query_param("destination_city", "Los Angeles");
            then.status(200).json_body(json!([["01.05.2024", 450]]));
        })
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let raw = client
        .fetch_price_forecast(&Route::new(City::HongKong, City::LosAngeles))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(raw.len(), 1);
}

#[tokio::test]
async fn test_forecast_sends_no_dates() {
    let server = MockServer::start_async().await;
    let dated = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price_forecast").query_param_exists("departure_date");
            then.status(400);
        })
        .await;
    let plain = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price_forecast");
            then.status(200)
                .json_body(json!([["10.05.2024", 500], ["01.05.2024", 450], ["bad-date", 300]]));
        })
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let raw = client.fetch_price_forecast(&tokyo_singapore()).await.unwrap();
    assert_eq!(dated.hits_async().await, 0);
    plain.assert_async().await;

    let forecast = normalize_series(raw).unwrap();
    let points: Vec<(NaiveDate, Decimal)> = forecast.series.points().iter().map(|p| (p.date, p.price)).collect();
    assert_eq!(
        points,
        vec![
            (NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), Decimal::from(450)),
            (NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(), Decimal::from(500)),
        ]
    );
    assert_eq!(forecast.rejected.len(), 1);
}

#[tokio::test]
async fn test_non_success_status_is_request_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights");
            then.status(503).body("maintenance");
        })
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.search_flights(&tokyo_singapore(), &early_may()).await.unwrap_err();

    assert!(err.is_request_error());
    match err {
        FareError::StatusError { status } => assert_eq!(status.as_u16(), 503),
        other => panic!("expected status error, got {}", other),
    }
}

#[tokio::test]
async fn test_non_json_body_is_malformed_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price_forecast");
            then.status(200).body("<html>oops</html>");
        })
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.fetch_price_forecast(&tokyo_singapore()).await.unwrap_err();
    assert!(matches!(err, FareError::MalformedResponse(_)));
    assert!(err.is_request_error());
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({"flights": [], "alternative_results": 0}));
        })
        .await;

    let client = client_for(&server, Duration::from_millis(200));
    let err = client.search_flights(&tokyo_singapore(), &early_may()).await.unwrap_err();
    assert!(matches!(err, FareError::Timeout(t) if t == Duration::from_millis(200)));
}

#[tokio::test]
async fn test_unreachable_service_is_request_error() {
    let client = FareClient::with_config(ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client.search_flights(&tokyo_singapore(), &early_may()).await.unwrap_err();
    assert!(err.is_request_error());
}

#[tokio::test]
async fn test_session_survives_failed_second_search() {
    let server = MockServer::start_async().await;
    let mut first = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights");
            then.status(200).json_body(json!({
                "flights": [[7, "Manila", "Taipei", "2024-05-01 08:00:00", "2024-05-01 10:20:00", "PR", 9100]],
                "alternative_results": 0
            }));
        })
        .await;

    let mut session = Session::new(client_for(&server, Duration::from_secs(5)));
    let outcome = session.dispatch(Action::Submit { route: tokyo_singapore(), dates: early_may() }).await;
    assert_eq!(outcome, Outcome::Results { intent: PresentationIntent::Exact, flights: 1 });
    let before = session.store().get().cloned();

    first.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights");
            then.status(500);
        })
        .await;

    let outcome = session.dispatch(Action::Submit { route: tokyo_singapore(), dates: early_may() }).await;
    assert!(matches!(outcome, Outcome::Notice(ref n) if n.kind == NoticeKind::Request));
    assert_eq!(session.phase(), Phase::Error);
    assert_eq!(session.store().get().cloned(), before);
}

#[tokio::test]
async fn test_drill_down_charts_row_route() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights");
            then.status(200).json_body(json!({
                "flights": [[3, "Beijing", "Gatwick", "2024-06-02 13:00:00", "2024-06-02 18:30:00", "CA", 48000]],
                "alternative_results": 1
            }));
        })
        .await;
    let forecast_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/price_forecast")
                .query_param("departure_city", "Beijing")
                .query_param("destination_city", "Gatwick");
            then.status(200).json_body(json!([["02.06.2024", 48000], ["01.06.2024", 47000]]));
        })
        .await;

    let mut session = Session::new(client_for(&server, Duration::from_secs(5)));
    session
        .dispatch(Action::Submit { route: Route::new(City::Beijing, City::Gatwick), dates: early_may() })
        .await;
    assert_eq!(session.phase(), Phase::Displaying(PresentationIntent::SameRouteFallback));

    let token = session.current_view().unwrap().rows().next().unwrap().token;
    let outcome = session.dispatch(Action::DrillDown(token)).await;
    forecast_mock.assert_async().await;

    match outcome {
        Outcome::Forecast { route, forecast } => {
            assert_eq!(route, Route::new(City::Beijing, City::Gatwick));
            assert_eq!(forecast.series.len(), 2);

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("chart.svg");
            airfare_client::ForecastChart::new(&route).write_svg(&forecast.series, &path).unwrap();
            assert!(path.exists());
        }
        other => panic!("expected forecast, got {:?}", other),
    }
    assert_eq!(session.phase(), Phase::ShowingForecast);
}

#[tokio::test]
async fn test_one_shot_helpers_use_given_config() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/flights").query_param("departure_city", "Manila");
            then.status(200).json_body(json!({
                "flights": [[7, "Manila", "Taipei", "2024-05-01 08:00:00", "2024-05-01 10:20:00", "PR", 9100]],
                "alternative_results": "exact"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price_forecast").query_param("departure_city", "Manila");
            then.status(200).json_body(json!([["03.05.2024", 9300], ["01.05.2024", 9100]]));
        })
        .await;

    let config = ClientConfig {
        base_url: server.base_url(),
        timeout: Duration::from_secs(5),
    };
    let route = Route::new(City::Manila, City::Taipei);

    let result = get_search_result(config.clone(), route, early_may()).await.unwrap();
    assert_eq!(result.intent, PresentationIntent::Exact);
    assert_eq!(result.flights[0].route, route);

    let forecast = get_price_forecast(config, route).await.unwrap();
    assert_eq!(forecast.series.first_date(), NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(forecast.series.len(), 2);
}
