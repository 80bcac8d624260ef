// src/catalog.rs
//! Static marketplace data compiled into the binary.

use crate::models::catalog::{
    FinancingProvider, FinancingQuery, Property, PropertyQuery, ServiceProvider, ServiceProviderQuery,
};
use serde::Deserialize;

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub properties: Vec<Property>,
    #[serde(default)]
    pub service_providers: Vec<ServiceProvider>,
    #[serde(default)]
    pub financing_providers: Vec<FinancingProvider>,
}

impl Catalog {
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn find_properties(&self, query: &PropertyQuery) -> Vec<Property> {
        let city = non_blank(query.city.as_deref());
        let property_type = non_blank(query.property_type.as_deref());

        self.properties
            .iter()
            .filter(|p| city.map_or(true, |c| p.city.eq_ignore_ascii_case(c)))
            .filter(|p| query.min_price.map_or(true, |min| p.price >= min))
            .filter(|p| query.max_price.map_or(true, |max| p.price <= max))
            .filter(|p| query.bedrooms.map_or(true, |beds| p.bedrooms >= beds))
            .filter(|p| property_type.map_or(true, |t| p.property_type.eq_ignore_ascii_case(t)))
            .cloned()
            .collect()
    }

    /// Properties in `city` with a known size, or every sized property when
    /// nothing in that city qualifies.
    pub fn comparables_near(&self, city: Option<&str>) -> Vec<&Property> {
        let sized: Vec<&Property> = self
            .properties
            .iter()
            .filter(|p| p.square_feet.unwrap_or(0) > 0 && p.price > 0.0)
            .collect();

        if let Some(city) = non_blank(city) {
            let local: Vec<&Property> = sized
                .iter()
                .copied()
                .filter(|p| p.city.eq_ignore_ascii_case(city))
                .collect();
            if !local.is_empty() {
                return local;
            }
        }
        sized
    }

    pub fn find_service_providers(&self, query: &ServiceProviderQuery) -> Vec<ServiceProvider> {
        let category = non_blank(query.category.as_deref());
        self.service_providers
            .iter()
            .filter(|s| category.map_or(true, |c| s.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect()
    }

    pub fn find_financing_providers(&self, query: &FinancingQuery) -> Vec<FinancingProvider> {
        let loan_type = non_blank(query.loan_type.as_deref());
        self.financing_providers
            .iter()
            .filter(|f| {
                loan_type.map_or(true, |t| f.loan_types.iter().any(|lt| lt.eq_ignore_ascii_case(t)))
            })
            .cloned()
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::embedded().expect("embedded catalog parses")
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = catalog();
        assert!(!catalog.properties.is_empty());
        assert!(!catalog.service_providers.is_empty());
        assert!(!catalog.financing_providers.is_empty());
        assert!(catalog.property("prop-1001").is_some());
        assert!(catalog.property("missing").is_none());
    }

    #[test]
    fn test_property_filters_are_case_insensitive_and_bedrooms_is_minimum() {
        let catalog = catalog();
        let query = PropertyQuery {
            city: Some("austin".to_string()),
            bedrooms: Some(3),
            ..Default::default()
        };
        let found = catalog.find_properties(&query);
        assert!(!found.is_empty());
        assert!(found.iter().all(|p| p.city == "Austin" && p.bedrooms >= 3));

        let query = PropertyQuery {
            min_price: Some(500_000.0),
            max_price: Some(700_000.0),
            property_type: Some("SINGLE_FAMILY".to_string()),
            ..Default::default()
        };
        let found = catalog.find_properties(&query);
        assert!(!found.is_empty());
        assert!(found
            .iter()
            .all(|p| p.price >= 500_000.0 && p.price <= 700_000.0 && p.property_type == "single_family"));
    }

    #[test]
    fn test_blank_filters_match_everything() {
        let catalog = catalog();
        let query = PropertyQuery {
            city: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(catalog.find_properties(&query).len(), catalog.properties.len());
    }

    #[test]
    fn test_comparables_fall_back_to_all_cities() {
        let catalog = catalog();
        let denver = catalog.comparables_near(Some("Denver"));
        assert!(!denver.is_empty());
        assert!(denver.iter().all(|p| p.city == "Denver"));

        let nowhere = catalog.comparables_near(Some("Atlantis"));
        assert!(nowhere.len() > denver.len());
        assert!(nowhere.iter().all(|p| p.square_feet.unwrap_or(0) > 0));
    }

    #[test]
    fn test_provider_filters() {
        let catalog = catalog();
        let inspectors = catalog.find_service_providers(&ServiceProviderQuery {
            category: Some("Inspection".to_string()),
        });
        assert_eq!(inspectors.len(), 1);

        let va = catalog.find_financing_providers(&FinancingQuery {
            loan_type: Some("va".to_string()),
        });
        assert!(va.len() >= 2);
        assert!(va.iter().all(|f| f.loan_types.iter().any(|t| t == "va")));
    }
}
