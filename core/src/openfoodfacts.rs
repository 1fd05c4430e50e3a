use serde::Deserialize;

use crate::models::{FoodCategory, FoodItem};

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductData>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub brands: Option<String>,
    pub code: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fat_100g: Option<f64>,
}

/// Map an OpenFoodFacts per-100g record to a [`FoodItem`] with a 100 g
/// serving. Products without a name or calorie figure are unusable and
/// dropped.
#[must_use]
pub fn product_to_food(p: ProductData) -> Option<FoodItem> {
    let name = p.product_name.filter(|n| !n.is_empty())?;
    let nutriments = p.nutriments?;
    let calories = nutriments.energy_kcal_100g?;

    Some(FoodItem {
        name,
        calories,
        protein: nutriments.proteins_100g.unwrap_or(0.0),
        carbs: nutriments.carbohydrates_100g.unwrap_or(0.0),
        fat: nutriments.fat_100g.unwrap_or(0.0),
        serving: "100 g".to_string(),
        category: FoodCategory::Other,
        brand: p.brands.filter(|b| !b.is_empty()),
        barcode: p.code.filter(|c| !c.is_empty()),
        source: "openfoodfacts".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peanut_butter() -> ProductData {
        ProductData {
            product_name: Some("Creamy Peanut Butter".to_string()),
            brands: Some("Skippy".to_string()),
            code: Some("0037600109710".to_string()),
            nutriments: Some(Nutriments {
                energy_kcal_100g: Some(625.0),
                proteins_100g: Some(21.9),
                carbohydrates_100g: Some(21.9),
                fat_100g: Some(50.0),
            }),
        }
    }

    #[test]
    fn test_product_to_food_complete() {
        let food = product_to_food(peanut_butter()).unwrap();
        assert_eq!(food.name, "Creamy Peanut Butter");
        assert_eq!(food.brand.as_deref(), Some("Skippy"));
        assert_eq!(food.barcode.as_deref(), Some("0037600109710"));
        assert_eq!(food.calories, 625.0);
        assert_eq!(food.protein, 21.9);
        assert_eq!(food.carbs, 21.9);
        assert_eq!(food.fat, 50.0);
        assert_eq!(food.serving, "100 g");
        assert_eq!(food.category, FoodCategory::Other);
        assert_eq!(food.source, "openfoodfacts");
    }

    #[test]
    fn test_product_to_food_missing_name() {
        let mut p = peanut_butter();
        p.product_name = None;
        assert!(product_to_food(p).is_none());

        // An empty name is as useless as a missing one
        let mut p2 = peanut_butter();
        p2.product_name = Some(String::new());
        assert!(product_to_food(p2).is_none());
    }

    #[test]
    fn test_product_to_food_missing_calories() {
        let mut p = peanut_butter();
        p.nutriments.as_mut().unwrap().energy_kcal_100g = None;
        assert!(product_to_food(p).is_none());

        // Missing nutriments entirely
        let mut p2 = peanut_butter();
        p2.nutriments = None;
        assert!(product_to_food(p2).is_none());
    }

    #[test]
    fn test_product_to_food_minimal() {
        let p = ProductData {
            product_name: Some("Basmati Rice".to_string()),
            brands: None,
            code: None,
            nutriments: Some(Nutriments {
                energy_kcal_100g: Some(356.0),
                proteins_100g: None,
                carbohydrates_100g: None,
                fat_100g: None,
            }),
        };
        let food = product_to_food(p).unwrap();
        assert_eq!(food.name, "Basmati Rice");
        assert!(food.brand.is_none());
        assert!(food.barcode.is_none());
        assert_eq!(food.calories, 356.0);
        assert_eq!(food.protein, 0.0);
        assert_eq!(food.carbs, 0.0);
        assert_eq!(food.fat, 0.0);
    }
}
