//! Candidate normalization
//!
//! Maps raw inference candidates onto the canonical listing vocabulary.
//! Unrecognized listing types are nulled (which fails the persistence gate),
//! unrecognized property types fall back to the generic "other" category,
//! unrecognized furnishing values are nulled, confidence is clamped to
//! [0, 1], declared numerics are coerced to integers or nulled, and a
//! parking count splits into an availability flag plus the count.

use serde_json::Value as JsonValue;
use std::fmt;

/// Canonical listing classifications. Candidates without one are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingType {
    Sale,
    Rental,
    Lease,
}

impl ListingType {
    /// Return the canonical string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rental => "rental",
            ListingType::Lease => "lease",
        }
    }

    /// Parse a raw value, accepting the synonyms the inference service has
    /// been observed to emit. Unrecognized values map to `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sale" | "sell" | "resale" | "buy" => Some(ListingType::Sale),
            "rental" | "rent" => Some(ListingType::Rental),
            "lease" => Some(ListingType::Lease),
            _ => None,
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical property categories with a generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Plot,
    Commercial,
    Other,
}

impl PropertyType {
    pub const fn as_str(self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Villa => "villa",
            PropertyType::Plot => "plot",
            PropertyType::Commercial => "commercial",
            PropertyType::Other => "other",
        }
    }

    /// Parse a raw value; anything unrecognized becomes [`PropertyType::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "apartment" | "flat" => PropertyType::Apartment,
            "house" | "independent house" => PropertyType::House,
            "villa" => PropertyType::Villa,
            "plot" | "land" => PropertyType::Plot,
            "commercial" | "office" | "shop" => PropertyType::Commercial,
            _ => PropertyType::Other,
        }
    }
}

/// Canonical furnishing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Furnishing {
    Furnished,
    SemiFurnished,
    Unfurnished,
}

impl Furnishing {
    pub const fn as_str(self) -> &'static str {
        match self {
            Furnishing::Furnished => "furnished",
            Furnishing::SemiFurnished => "semi_furnished",
            Furnishing::Unfurnished => "unfurnished",
        }
    }

    /// Parse a raw value. Unrecognized values map to `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw
            .trim()
            .to_lowercase()
            .replace(['-', ' '], "_")
            .as_str()
        {
            "furnished" | "fully_furnished" => Some(Furnishing::Furnished),
            "semi_furnished" | "semifurnished" => Some(Furnishing::SemiFurnished),
            "unfurnished" => Some(Furnishing::Unfurnished),
            _ => None,
        }
    }
}

/// One candidate after normalization, ready for the persistence gate.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCandidate {
    pub listing_type: Option<ListingType>,
    pub property_type: Option<PropertyType>,
    pub location: Option<String>,
    pub price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqft: Option<i32>,
    pub furnishing: Option<Furnishing>,
    pub parking: Option<bool>,
    pub parking_count: Option<i32>,
    pub contact: Option<String>,
    pub confidence: f32,
}

/// Normalize one raw candidate payload.
pub fn normalize_candidate(raw: &JsonValue) -> NormalizedCandidate {
    let listing_type = raw
        .get("listing_type")
        .and_then(|v| v.as_str())
        .and_then(ListingType::parse);

    let property_type = raw
        .get("property_type")
        .and_then(|v| v.as_str())
        .map(PropertyType::parse);

    let furnishing = raw
        .get("furnishing")
        .and_then(|v| v.as_str())
        .and_then(Furnishing::parse);

    let (parking, parking_count) = normalize_parking(raw.get("parking"));

    let confidence = raw
        .get("parsing_confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0) as f32;

    NormalizedCandidate {
        listing_type,
        property_type,
        location: string_field(raw, "location"),
        price: integer_field(raw, "price"),
        bedrooms: integer_field(raw, "bedrooms").map(|v| v as i32),
        bathrooms: integer_field(raw, "bathrooms").map(|v| v as i32),
        area_sqft: integer_field(raw, "area_sqft").map(|v| v as i32),
        furnishing,
        parking,
        parking_count,
        contact: string_field(raw, "contact"),
        confidence,
    }
}

fn string_field(raw: &JsonValue, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Coerce a declared numeric field to an integer, accepting numbers and
/// numeric strings. Anything else is nulled.
fn integer_field(raw: &JsonValue, field: &str) -> Option<i64> {
    match raw.get(field)? {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        JsonValue::String(s) => s.trim().replace(',', "").parse::<i64>().ok(),
        _ => None,
    }
}

/// A parking indicator may arrive as a boolean or as a slot count; a count
/// splits into an availability flag plus the numeric count.
fn normalize_parking(raw: Option<&JsonValue>) -> (Option<bool>, Option<i32>) {
    match raw {
        Some(JsonValue::Bool(available)) => (Some(*available), None),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(count) if count >= 0 => (Some(count > 0), Some(count as i32)),
            _ => (None, None),
        },
        Some(JsonValue::String(s)) => match s.trim().parse::<i64>() {
            Ok(count) if count >= 0 => (Some(count > 0), Some(count as i32)),
            _ => (None, None),
        },
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_candidate_normalizes() {
        let raw = json!({
            "listing_type": "rental",
            "property_type": "flat",
            "location": "Indiranagar, Bangalore",
            "price": 25000,
            "bedrooms": "3",
            "bathrooms": 2,
            "area_sqft": 1450.6,
            "furnishing": "semi-furnished",
            "parking": 2,
            "contact": "9876543210",
            "parsing_confidence": 0.92
        });

        let candidate = normalize_candidate(&raw);

        assert_eq!(candidate.listing_type, Some(ListingType::Rental));
        assert_eq!(candidate.property_type, Some(PropertyType::Apartment));
        assert_eq!(candidate.location.as_deref(), Some("Indiranagar, Bangalore"));
        assert_eq!(candidate.price, Some(25000));
        assert_eq!(candidate.bedrooms, Some(3));
        assert_eq!(candidate.bathrooms, Some(2));
        assert_eq!(candidate.area_sqft, Some(1451));
        assert_eq!(candidate.furnishing, Some(Furnishing::SemiFurnished));
        assert_eq!(candidate.parking, Some(true));
        assert_eq!(candidate.parking_count, Some(2));
        assert!((candidate.confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn unrecognized_listing_type_is_nulled() {
        let candidate = normalize_candidate(&json!({
            "listing_type": "timeshare",
            "parsing_confidence": 0.9
        }));
        assert_eq!(candidate.listing_type, None);
    }

    #[test]
    fn unrecognized_property_type_falls_back_to_other() {
        let candidate = normalize_candidate(&json!({
            "listing_type": "sale",
            "property_type": "castle",
            "parsing_confidence": 0.9
        }));
        assert_eq!(candidate.property_type, Some(PropertyType::Other));
    }

    #[test]
    fn unrecognized_furnishing_is_nulled() {
        let candidate = normalize_candidate(&json!({
            "furnishing": "opulent",
            "parsing_confidence": 0.5
        }));
        assert_eq!(candidate.furnishing, None);
    }

    #[test]
    fn confidence_is_clamped() {
        let over = normalize_candidate(&json!({"parsing_confidence": 1.7}));
        assert_eq!(over.confidence, 1.0);

        let under = normalize_candidate(&json!({"parsing_confidence": -0.4}));
        assert_eq!(under.confidence, 0.0);

        let missing = normalize_candidate(&json!({}));
        assert_eq!(missing.confidence, 0.0);
    }

    #[test]
    fn non_numeric_fields_are_nulled() {
        let candidate = normalize_candidate(&json!({
            "price": "negotiable",
            "bedrooms": {"count": 3},
            "parsing_confidence": 0.5
        }));
        assert_eq!(candidate.price, None);
        assert_eq!(candidate.bedrooms, None);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let candidate = normalize_candidate(&json!({
            "price": "1,250,000",
            "parsing_confidence": 0.5
        }));
        assert_eq!(candidate.price, Some(1_250_000));
    }

    #[test]
    fn boolean_parking_has_no_count() {
        let candidate = normalize_candidate(&json!({"parking": true}));
        assert_eq!(candidate.parking, Some(true));
        assert_eq!(candidate.parking_count, None);
    }

    #[test]
    fn zero_parking_count_means_unavailable() {
        let candidate = normalize_candidate(&json!({"parking": 0}));
        assert_eq!(candidate.parking, Some(false));
        assert_eq!(candidate.parking_count, Some(0));
    }

    #[test]
    fn listing_type_synonyms() {
        assert_eq!(ListingType::parse("Rent"), Some(ListingType::Rental));
        assert_eq!(ListingType::parse("resale"), Some(ListingType::Sale));
        assert_eq!(ListingType::parse("LEASE"), Some(ListingType::Lease));
        assert_eq!(ListingType::parse("swap"), None);
    }
}
