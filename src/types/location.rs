//! The resolved geographic location of an operator-supplied address.

use serde::{Deserialize, Serialize};

/// A successfully geocoded address.
///
/// Only [`crate::LocationResolver`] hands these out, and only once both coordinates
/// are known and finite, so a `Location` can always be formatted straight into a
/// forecast URL.
///
/// # Examples
///
/// ```
/// use smhi_forecast::Location;
///
/// let stockholm = Location::new("Stockholm", "Stockholm, Sverige", 59.33, 18.06).unwrap();
/// assert_eq!(stockholm.latitude, 59.33);
/// assert!(Location::new("nowhere", "", f64::NAN, 18.0).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The free-text query the operator typed.
    pub query: String,
    /// The provider's full address for the match, used in chart titles.
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Creates a location, refusing coordinates that are not finite or out of range.
    pub fn new(
        query: impl Into<String>,
        display_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return None;
        }
        let query = query.into();
        let display_name = display_name.into();
        Some(Self {
            display_name: if display_name.trim().is_empty() {
                query.clone()
            } else {
                display_name
            },
            query,
            latitude,
            longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_query() {
        let loc = Location::new("Kiruna", "  ", 67.85, 20.22).unwrap();
        assert_eq!(loc.display_name, "Kiruna");
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Location::new("x", "x", 91.0, 0.0).is_none());
        assert!(Location::new("x", "x", 0.0, -180.5).is_none());
        assert!(Location::new("x", "x", 0.0, f64::INFINITY).is_none());
    }
}
