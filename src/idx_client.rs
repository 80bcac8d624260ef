// src/idx_client.rs
use crate::catalog::Catalog;
use crate::models::listing::{parse_amount, Listing};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

const IDX_API_URL: &str = "https://api.idxbroker.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum IdxError {
    #[error("IDX request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IDX API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("IDX payload could not be parsed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct IdxClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl IdxClient {
    pub fn new(api_key: String) -> Result<Self, IdxError> {
        Self::with_base_url(api_key, IDX_API_URL, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// A hung vendor surfaces as `IdxError::Request` once `timeout` elapses.
    pub(crate) fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, IdxError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Featured listings of the IDX account.
    pub async fn featured_listings(&self) -> Result<Vec<Listing>, IdxError> {
        let url = format!("{}/clients/featured", self.base_url);
        info!("🏠 Fetching IDX featured listings");

        let response = self
            .client
            .get(&url)
            .header("accesskey", &self.api_key)
            .header("outputtype", "json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("IDX API error ({}): {}", status, body);
            return Err(IdxError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let listings = parse_listings(&body)?;
        info!("✅ IDX returned {} featured listings", listings.len());
        Ok(listings)
    }
}

/// Accepts an object keyed by listing id, an array of listings, or an empty
/// body (IDX answers 204 when there is nothing to show).
pub fn parse_listings(body: &str) -> Result<Vec<Listing>, IdxError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let payload: Value = serde_json::from_str(body).map_err(|e| IdxError::Parse(e.to_string()))?;

    let entries: Vec<(Option<&str>, &Map<String, Value>)> = match &payload {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, value)| value.as_object().map(|obj| (Some(key.as_str()), obj)))
            .collect(),
        Value::Array(items) => items.iter().filter_map(|v| v.as_object().map(|obj| (None, obj))).collect(),
        other => {
            return Err(IdxError::Parse(format!("unexpected payload type: {}", type_name(other))));
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|(key, obj)| listing_from_object(key, obj))
        .collect())
}

fn listing_from_object(key: Option<&str>, obj: &Map<String, Value>) -> Option<Listing> {
    let id = string_field(obj, &["listingID", "listingId", "id"]).or_else(|| key.map(str::to_string))?;

    let address = string_field(obj, &["address", "displayAddress"]).unwrap_or_else(|| {
        [
            string_field(obj, &["streetNumber"]),
            string_field(obj, &["streetName"]),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    });

    Some(Listing {
        id,
        address,
        city: string_field(obj, &["cityName", "city"]),
        state: string_field(obj, &["state"]),
        zip: string_field(obj, &["zipcode", "zip"]),
        price: number_field(obj, &["listingPrice", "price"]),
        bedrooms: number_field(obj, &["bedrooms", "beds"]).map(|v| v as u32),
        bathrooms: number_field(obj, &["totalBaths", "bathrooms", "baths"]).map(|v| v as f32),
        square_feet: number_field(obj, &["sqFt", "squareFeet"]).map(|v| v as u32),
        property_type: string_field(obj, &["propType", "idxPropType", "propertyType"]),
        image: image_url(obj),
        description: string_field(obj, &["remarksConcat", "remarks", "description"]),
    })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    })
    .filter(|v| *v >= 0.0)
}

/// `image` is either a URL or an object of numbered photos (`{"0": {"url": ..}}`).
fn image_url(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("image")? {
        Value::String(url) if !url.is_empty() => Some(url.clone()),
        Value::Object(photos) => {
            let first = photos.get("0").or_else(|| photos.values().next())?;
            first.get("url").and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Listings shown when IDX is unavailable, built from the catalog.
pub fn sample_listings(catalog: &Catalog) -> Vec<Listing> {
    catalog
        .properties
        .iter()
        .map(|p| Listing {
            id: format!("sample-{}", p.id),
            address: p.address.clone(),
            city: Some(p.city.clone()),
            state: Some(p.state.clone()),
            zip: Some(p.zip.clone()),
            price: Some(p.price),
            bedrooms: Some(p.bedrooms),
            bathrooms: Some(p.bathrooms),
            square_feet: p.square_feet,
            property_type: Some(p.property_type.clone()),
            image: p.images.first().cloned(),
            description: Some(p.description.clone()),
        })
        .collect()
}
