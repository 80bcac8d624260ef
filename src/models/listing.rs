use serde::{Deserialize, Serialize};

/// MLS listing normalised from the IDX Broker payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub price: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f32>,
    pub square_feet: Option<u32>,
    pub property_type: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    Idx,
    Sample,
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub listings: Vec<Listing>,
    pub total: usize,
    pub source: ListingSource,
}

impl ListingsResponse {
    pub fn new(listings: Vec<Listing>, source: ListingSource) -> Self {
        Self {
            total: listings.len(),
            listings,
            source,
        }
    }
}

/// Raw query string of `/api/idx/listings/search`. Numbers stay strings so a
/// malformed value can be ignored instead of failing the request.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingSearchQuery {
    pub city: Option<String>,
    pub zip: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub beds: Option<String>,
    pub baths: Option<String>,
    pub property_type: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub city: Option<String>,
    pub zip: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub beds: Option<u32>,
    pub baths: Option<f32>,
    pub property_type: Option<String>,
    pub keyword: Option<String>,
}

impl SearchCriteria {
    pub fn from_query(query: &ListingSearchQuery) -> Self {
        Self {
            city: text(&query.city),
            zip: text(&query.zip),
            min_price: text(&query.min_price).and_then(|v| parse_amount(&v)),
            max_price: text(&query.max_price).and_then(|v| parse_amount(&v)),
            beds: text(&query.beds).and_then(|v| v.parse().ok()),
            baths: text(&query.baths).and_then(|v| v.parse().ok()),
            property_type: text(&query.property_type),
            keyword: text(&query.keyword),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        let same = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            Some(w) => actual.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(w)),
            None => true,
        };

        if !same(&self.city, &listing.city) || !same(&self.zip, &listing.zip) {
            return false;
        }
        if let Some(wanted) = &self.property_type {
            let wanted = wanted.to_lowercase();
            if !listing
                .property_type
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&wanted))
            {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if !listing.price.is_some_and(|p| p >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if !listing.price.is_some_and(|p| p <= max) {
                return false;
            }
        }
        if let Some(beds) = self.beds {
            if !listing.bedrooms.is_some_and(|b| b >= beds) {
                return false;
            }
        }
        if let Some(baths) = self.baths {
            if !listing.bathrooms.is_some_and(|b| b >= baths) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let keyword = keyword.to_lowercase();
            let haystack = [
                Some(listing.address.as_str()),
                listing.city.as_deref(),
                listing.property_type.as_deref(),
                listing.description.as_deref(),
            ];
            if !haystack
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&keyword))
            {
                return false;
            }
        }
        true
    }
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parses amounts such as `450000`, `"$450,000"` or `"450000.00"`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            id: "123".to_string(),
            address: "42 Lake Shore Dr".to_string(),
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            zip: Some("78704".to_string()),
            price: Some(450_000.0),
            bedrooms: Some(3),
            bathrooms: Some(2.0),
            square_feet: Some(1800),
            property_type: Some("Single Family Residential".to_string()),
            image: None,
            description: Some("Walk to the lake".to_string()),
        }
    }

    #[test]
    fn test_blank_and_invalid_values_are_not_criteria() {
        let query = ListingSearchQuery {
            city: Some("   ".to_string()),
            min_price: Some("cheap".to_string()),
            beds: Some("three".to_string()),
            ..Default::default()
        };
        assert!(SearchCriteria::from_query(&query).is_empty());
    }

    #[test]
    fn test_prices_accept_currency_formatting() {
        assert_eq!(parse_amount("$450,000"), Some(450_000.0));
        assert_eq!(parse_amount(" 1200.50 "), Some(1200.5));
        assert_eq!(parse_amount("N/A"), None);
    }

    #[test]
    fn test_matches_each_criterion() {
        let listing = listing();
        let query = ListingSearchQuery {
            city: Some("austin".to_string()),
            min_price: Some("$400,000".to_string()),
            max_price: Some("500000".to_string()),
            beds: Some("3".to_string()),
            property_type: Some("single family".to_string()),
            keyword: Some("LAKE".to_string()),
            ..Default::default()
        };
        assert!(SearchCriteria::from_query(&query).matches(&listing));

        let too_many_beds = SearchCriteria {
            beds: Some(4),
            ..Default::default()
        };
        assert!(!too_many_beds.matches(&listing));

        let other_zip = SearchCriteria {
            zip: Some("78701".to_string()),
            ..Default::default()
        };
        assert!(!other_zip.matches(&listing));
    }
}
