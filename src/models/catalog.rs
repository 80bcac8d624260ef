use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub title: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: f32,
    pub square_feet: Option<u32>,
    #[serde(rename = "type")]
    pub property_type: String,
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProvider {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub rating: f32,
    pub review_count: u32,
    pub location: String,
    pub price_range: String,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub loan_types: Vec<String>,
    pub min_rate: f32,
    pub max_rate: f32,
    pub min_down_payment_percent: f32,
    pub description: String,
    pub rating: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuery {
    pub city: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub bedrooms: Option<u32>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServiceProviderQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinancingQuery {
    pub loan_type: Option<String>,
}
