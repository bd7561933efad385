/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the lookup layer, the selection store and the UI layer.
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A product resolved from the food database
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    /// Unique product code (usually the EAN)
    pub code: String,
    /// First non-empty product name, if any
    pub name: Option<String>,
    /// Small front-of-pack image
    pub thumbnail_url: Option<String>,
    /// Metric key (without `_100g`) to value per 100 g
    pub nutriments: BTreeMap<String, f64>,
}

impl ProductRecord {
    /// Name to show to the user, falling back to the code
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }

    /// Value of a metric per 100 g, if the product defines it
    pub fn nutrient(&self, metric: NutrientMetric) -> Option<f64> {
        self.nutriments.get(metric.key()).copied()
    }
}

/// A scanned product held for comparison
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry {
    pub code: String,
    pub product: ProductRecord,
    pub scanned_at: DateTime<Utc>,
}

/// The fixed comparison axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientMetric {
    EnergyKcal,
    Carbohydrates,
    Sugars,
    Fat,
    SaturatedFat,
    Fiber,
    Proteins,
    Salt,
    Sodium,
    CarbonFootprint,
}

impl NutrientMetric {
    /// Display order of the charts
    pub const ALL: [NutrientMetric; 10] = [
        NutrientMetric::EnergyKcal,
        NutrientMetric::Carbohydrates,
        NutrientMetric::Sugars,
        NutrientMetric::Fat,
        NutrientMetric::SaturatedFat,
        NutrientMetric::Fiber,
        NutrientMetric::Proteins,
        NutrientMetric::Salt,
        NutrientMetric::Sodium,
        NutrientMetric::CarbonFootprint,
    ];

    /// Identifier used in the `nutriments` map
    pub fn key(self) -> &'static str {
        match self {
            NutrientMetric::EnergyKcal => "energy-kcal",
            NutrientMetric::Carbohydrates => "carbohydrates",
            NutrientMetric::Sugars => "sugars",
            NutrientMetric::Fat => "fat",
            NutrientMetric::SaturatedFat => "saturated-fat",
            NutrientMetric::Fiber => "fiber",
            NutrientMetric::Proteins => "proteins",
            NutrientMetric::Salt => "salt",
            NutrientMetric::Sodium => "sodium",
            NutrientMetric::CarbonFootprint => "carbon-footprint-from-known-ingredients",
        }
    }

    /// Chart caption
    pub fn label(self) -> &'static str {
        match self {
            NutrientMetric::EnergyKcal => "Energy kcal",
            NutrientMetric::Carbohydrates => "Carbohydrates",
            NutrientMetric::Sugars => "Sugars",
            NutrientMetric::Fat => "Fat",
            NutrientMetric::SaturatedFat => "Saturated fat",
            NutrientMetric::Fiber => "Fiber",
            NutrientMetric::Proteins => "Proteins",
            NutrientMetric::Salt => "Salt",
            NutrientMetric::Sodium => "Sodium",
            NutrientMetric::CarbonFootprint => "Carbon footprint from known ingredients",
        }
    }
}

/// Suffix of per-100 g nutriment fields
pub const PER_100G_SUFFIX: &str = "_100g";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_set_is_fixed_and_unique() {
        let keys: std::collections::HashSet<_> =
            NutrientMetric::ALL.iter().map(|m| m.key()).collect();
        assert_eq!(keys.len(), 10);
        assert_eq!(NutrientMetric::ALL[0].key(), "energy-kcal");
    }

    #[test]
    fn test_display_name_falls_back_to_code() {
        let product = ProductRecord {
            code: "123".to_string(),
            name: None,
            thumbnail_url: None,
            nutriments: BTreeMap::new(),
        };
        assert_eq!(product.display_name(), "123");
        assert_eq!(product.nutrient(NutrientMetric::Sugars), None);
    }
}
