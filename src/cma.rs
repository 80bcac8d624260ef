// src/cma.rs
//! Comparative market analysis: values a subject property from nearby sales.

use crate::catalog::Catalog;
use crate::models::auth::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BEDROOM_ADJUSTMENT: f64 = 10_000.0;
pub const BATHROOM_ADJUSTMENT: f64 = 7_500.0;

#[derive(Error, Debug)]
pub enum CmaError {
    #[error("{0}")]
    Validation(String),
    #[error("No comparable properties with a known price and size were found")]
    NoComparables,
}

impl IntoResponse for CmaError {
    fn into_response(self) -> Response {
        let status = match self {
            CmaError::Validation(_) => StatusCode::BAD_REQUEST,
            CmaError::NoComparables => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmaRequest {
    pub address: String,
    pub city: Option<String>,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f64,
    pub square_feet: f64,
    pub comparables: Option<Vec<Comparable>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparable {
    #[serde(default)]
    pub address: String,
    pub price: f64,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f64,
    pub square_feet: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn for_count(count: usize) -> Self {
        match count {
            n if n >= 5 => Confidence::High,
            3 | 4 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComparableSource {
    Request,
    Catalog,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedComparable {
    #[serde(flatten)]
    pub comparable: Comparable,
    pub adjusted_price: f64,
    pub price_per_square_foot: f64,
    pub indicated_value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CmaReport {
    pub address: String,
    pub estimated_value: f64,
    pub value_range: ValueRange,
    pub price_per_square_foot: f64,
    pub confidence: Confidence,
    pub comparables_used: usize,
    pub comparables: Vec<AdjustedComparable>,
    pub source: ComparableSource,
}

/// Builds a report from the request's comparables, or from catalog
/// properties near the subject when none are supplied.
pub fn generate_report(request: &CmaRequest, catalog: &Catalog) -> Result<CmaReport, CmaError> {
    let address = request.address.trim();
    if address.is_empty() {
        return Err(CmaError::Validation("Property address is required".to_string()));
    }
    if !request.square_feet.is_finite() || request.square_feet <= 0.0 {
        return Err(CmaError::Validation("Square footage must be greater than zero".to_string()));
    }

    let (candidates, source) = match &request.comparables {
        Some(comps) if !comps.is_empty() => (comps.clone(), ComparableSource::Request),
        _ => {
            let comps = catalog
                .comparables_near(request.city.as_deref())
                .into_iter()
                .map(|p| Comparable {
                    address: format!("{}, {}", p.address, p.city),
                    price: p.price,
                    bedrooms: p.bedrooms,
                    bathrooms: f64::from(p.bathrooms),
                    square_feet: f64::from(p.square_feet.unwrap_or(0)),
                })
                .collect();
            (comps, ComparableSource::Catalog)
        }
    };

    let adjusted: Vec<AdjustedComparable> = candidates
        .into_iter()
        .filter(|c| c.price > 0.0 && c.square_feet > 0.0)
        .map(|c| adjust(c, request))
        .collect();

    if adjusted.is_empty() {
        return Err(CmaError::NoComparables);
    }

    let mut values: Vec<f64> = adjusted.iter().map(|c| c.indicated_value).collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let estimate = round_to_hundred(median(&values));
    let low = round_to_hundred(values[0]);
    let high = round_to_hundred(values[values.len() - 1]);

    tracing::debug!(
        "CMA for '{}': {} comparables, estimate {}",
        address,
        adjusted.len(),
        estimate
    );

    Ok(CmaReport {
        address: address.to_string(),
        estimated_value: estimate,
        value_range: ValueRange { low, high },
        price_per_square_foot: round_cents(estimate / request.square_feet),
        confidence: Confidence::for_count(adjusted.len()),
        comparables_used: adjusted.len(),
        comparables: adjusted,
        source,
    })
}

fn adjust(comparable: Comparable, subject: &CmaRequest) -> AdjustedComparable {
    let bedroom_delta = f64::from(subject.bedrooms) - f64::from(comparable.bedrooms);
    let bathroom_delta = subject.bathrooms - comparable.bathrooms;
    let adjusted_price =
        comparable.price + bedroom_delta * BEDROOM_ADJUSTMENT + bathroom_delta * BATHROOM_ADJUSTMENT;
    let per_sqft = adjusted_price / comparable.square_feet;

    AdjustedComparable {
        adjusted_price: round_cents(adjusted_price),
        price_per_square_foot: round_cents(per_sqft),
        indicated_value: per_sqft * subject.square_feet,
        comparable,
    }
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn round_to_hundred(value: f64) -> f64 {
    (value / 100.0).round() * 100.0
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(price: f64, bedrooms: u32, bathrooms: f64, square_feet: f64) -> Comparable {
        Comparable {
            address: "comp".to_string(),
            price,
            bedrooms,
            bathrooms,
            square_feet,
        }
    }

    fn request(comparables: Option<Vec<Comparable>>) -> CmaRequest {
        CmaRequest {
            address: "100 Test Ln".to_string(),
            city: Some("Austin".to_string()),
            bedrooms: 3,
            bathrooms: 2.0,
            square_feet: 2000.0,
            comparables,
        }
    }

    #[test]
    fn test_adjusts_for_bedrooms_and_bathrooms() {
        // One bedroom and one bath fewer than the subject: +10,000 +7,500.
        let report = generate_report(
            &request(Some(vec![comp(382_500.0, 2, 1.0, 2000.0)])),
            &Catalog::embedded().unwrap(),
        )
        .unwrap();

        assert_eq!(report.comparables[0].adjusted_price, 400_000.0);
        assert_eq!(report.estimated_value, 400_000.0);
        assert_eq!(report.price_per_square_foot, 200.0);
        assert_eq!(report.confidence, Confidence::Low);
        assert_eq!(report.source, ComparableSource::Request);
    }

    #[test]
    fn test_median_range_and_confidence() {
        let comps = vec![
            comp(300_000.0, 3, 2.0, 1500.0), // 400,000
            comp(500_000.0, 3, 2.0, 2000.0), // 500,000
            comp(440_000.0, 3, 2.0, 2000.0), // 440,000
            comp(900_000.0, 3, 2.0, 3000.0), // 600,000
        ];
        let report = generate_report(&request(Some(comps)), &Catalog::embedded().unwrap()).unwrap();

        assert_eq!(report.estimated_value, 470_000.0);
        assert_eq!(report.value_range.low, 400_000.0);
        assert_eq!(report.value_range.high, 600_000.0);
        assert_eq!(report.confidence, Confidence::Medium);
        assert_eq!(report.comparables_used, 4);
    }

    #[test]
    fn test_values_round_to_hundred() {
        let report = generate_report(
            &request(Some(vec![comp(333_333.0, 3, 2.0, 2000.0)])),
            &Catalog::embedded().unwrap(),
        )
        .unwrap();
        assert_eq!(report.estimated_value, 333_300.0);
    }

    #[test]
    fn test_catalog_comparables_used_when_none_supplied() {
        let catalog = Catalog::embedded().unwrap();
        let report = generate_report(&request(None), &catalog).unwrap();
        let austin = catalog.comparables_near(Some("Austin")).len();

        assert_eq!(report.source, ComparableSource::Catalog);
        assert_eq!(report.comparables_used, austin);
        assert_eq!(report.confidence, Confidence::for_count(austin));
        assert!(report.value_range.low <= report.estimated_value);
        assert!(report.estimated_value <= report.value_range.high);
    }

    #[test]
    fn test_rejects_bad_input() {
        let catalog = Catalog::embedded().unwrap();

        let mut no_size = request(None);
        no_size.square_feet = 0.0;
        assert!(matches!(generate_report(&no_size, &catalog), Err(CmaError::Validation(_))));

        let mut blank = request(None);
        blank.address = "  ".to_string();
        assert!(matches!(generate_report(&blank, &catalog), Err(CmaError::Validation(_))));

        let unusable = request(Some(vec![comp(0.0, 3, 2.0, 1500.0), comp(400_000.0, 3, 2.0, 0.0)]));
        assert!(matches!(generate_report(&unusable, &catalog), Err(CmaError::NoComparables)));
    }
}
