//! Price forecast normalisation and chart rendering

use crate::client::{RawPricePoint, RawPriceSeries};
use crate::{FareError, Route, CURRENCY};
use chrono::NaiveDate;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Day.month.year, as the forecast feed sends dates
pub const WIRE_DATE_FORMAT: &str = "%d.%m.%Y";

const CHART_TITLE: &str = "Ticket price trend";
const X_AXIS_LABEL: &str = "Date";
const LINE_COLOR: RGBColor = RGBColor(50, 205, 50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Price points in ascending date order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PriceSeries(Vec<PricePoint>);

impl PriceSeries {
    /// Stable sort by date, so points sharing a date keep their feed order
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self(points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.last().map(|p| p.date)
    }

    fn price_bounds(&self) -> Option<(f64, f64)> {
        self.0.iter().map(|p| to_f64(p.price)).fold(None, |acc, price| match acc {
            None => Some((price, price)),
            Some((low, high)) => Some((low.min(price), high.max(price))),
        })
    }
}

/// A forecast entry dropped because its date did not parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedPricePoint {
    pub raw_date: String,
    pub price: Decimal,
    pub reason: String,
}

impl fmt::Display for MalformedPricePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.raw_date, self.price, self.reason)
    }
}

/// Normalised forecast ready for plotting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub series: PriceSeries,
    pub rejected: Vec<MalformedPricePoint>,
}

/// Parse and sort a raw forecast. Unparseable dates are set aside rather than
/// failing the chart; if nothing survives the result is `NoForecastData`.
pub fn normalize_series(raw: RawPriceSeries) -> Result<Forecast, FareError> {
    let mut points = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for RawPricePoint(raw_date, price) in raw {
        match NaiveDate::parse_from_str(raw_date.trim(), WIRE_DATE_FORMAT) {
            Ok(date) => points.push(PricePoint { date, price }),
            Err(e) => {
                warn!(raw_date = %raw_date, error = %e, "Dropping forecast point with malformed date");
                rejected.push(MalformedPricePoint {
                    raw_date,
                    price,
                    reason: e.to_string(),
                });
            }
        }
    }

    if points.is_empty() {
        info!(rejected = rejected.len(), "Forecast has no usable points");
        return Err(FareError::NoForecastData);
    }

    let series = PriceSeries::from_points(points);
    debug!(points = series.len(), rejected = rejected.len(), "Forecast normalised");
    Ok(Forecast { series, rejected })
}

/// Line chart of a price series, date on x and price on y
#[derive(Debug, Clone)]
pub struct ForecastChart {
    title: String,
    size: (u32, u32),
}

impl ForecastChart {
    pub fn new(route: &Route) -> Self {
        Self {
            title: format!("{}: {}", CHART_TITLE, route),
            size: (1000, 500),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn render_svg(&self, series: &PriceSeries) -> Result<String, FareError> {
        let (first, last) = match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(FareError::NoForecastData),
        };
        let (low, high) = series.price_bounds().ok_or(FareError::NoForecastData)?;

        // A single date or a flat price would give a zero-width axis
        let x_range = first.pred_opt().unwrap_or(first)..last.succ_opt().unwrap_or(last);
        let pad = ((high - low) * 0.1).max(1.0);
        let y_range = (low - pad)..(high + pad);
        let y_label = format!("Price ({})", CURRENCY);

        let line: Vec<(NaiveDate, f64)> = series.points().iter().map(|p| (p.date, to_f64(p.price))).collect();

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            root.fill(&WHITE).map_err(chart_error)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(&self.title, ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(80)
                .build_cartesian_2d(x_range, y_range)
                .map_err(chart_error)?;

            chart
                .configure_mesh()
                .x_desc(X_AXIS_LABEL)
                .y_desc(y_label.as_str())
                .x_label_formatter(&|d: &NaiveDate| d.format(WIRE_DATE_FORMAT).to_string())
                .draw()
                .map_err(chart_error)?;

            chart
                .draw_series(LineSeries::new(line.iter().copied(), LINE_COLOR.stroke_width(2)))
                .map_err(chart_error)?;
            chart
                .draw_series(line.iter().map(|&point| Circle::new(point, 4, LINE_COLOR.filled())))
                .map_err(chart_error)?;

            root.present().map_err(chart_error)?;
        }

        debug!(points = series.len(), svg_length = svg.len(), "Forecast chart rendered");
        Ok(svg)
    }

    pub fn write_svg(&self, series: &PriceSeries, path: &Path) -> Result<(), FareError> {
        let svg = self.render_svg(series)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, svg)?;
        info!(path = %path.display(), "Forecast chart written");
        Ok(())
    }
}

fn to_f64(price: Decimal) -> f64 {
    price.to_f64().unwrap_or_default()
}

fn chart_error<E: fmt::Display>(e: E) -> FareError {
    FareError::ChartError(e.to_string())
}
