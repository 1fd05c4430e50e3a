use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixed food category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Fruit,
    Vegetable,
    Grain,
    Protein,
    Dairy,
    Snack,
    Beverage,
    Other,
}

impl FoodCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fruit => "fruit",
            Self::Vegetable => "vegetable",
            Self::Grain => "grain",
            Self::Protein => "protein",
            Self::Dairy => "dairy",
            Self::Snack => "snack",
            Self::Beverage => "beverage",
            Self::Other => "other",
        }
    }
}

pub const FOOD_CATEGORIES: &[&str] = &[
    "fruit",
    "vegetable",
    "grain",
    "protein",
    "dairy",
    "snack",
    "beverage",
    "other",
];

pub fn parse_food_category(s: &str) -> Result<FoodCategory> {
    let lower = s.to_lowercase();
    Ok(match lower.as_str() {
        "fruit" => FoodCategory::Fruit,
        "vegetable" => FoodCategory::Vegetable,
        "grain" => FoodCategory::Grain,
        "protein" => FoodCategory::Protein,
        "dairy" => FoodCategory::Dairy,
        "snack" => FoodCategory::Snack,
        "beverage" => FoodCategory::Beverage,
        "other" => FoodCategory::Other,
        _ => bail!(
            "Invalid category '{s}'. Must be one of: {}",
            FOOD_CATEGORIES.join(", ")
        ),
    })
}

/// Immutable nutritional record. Nutrients are per serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// Display string for one serving, e.g. "100 g" or "1 cup".
    pub serving: String,
    pub category: FoodCategory,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub barcode: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    pub const ALL: [Self; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];
}

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub fn parse_meal_type(meal: &str) -> Result<MealType> {
    let lower = meal.to_lowercase();
    Ok(match lower.as_str() {
        "breakfast" => MealType::Breakfast,
        "lunch" => MealType::Lunch,
        "dinner" => MealType::Dinner,
        "snack" => MealType::Snack,
        _ => bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        ),
    })
}

/// One food item logged at a quantity, meal type, and date. The food is
/// embedded by value so a log stays self-contained even if the palette
/// entry it came from is later edited or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: String,
    pub meal_type: MealType,
    pub food: FoodItem,
    pub quantity: f64,
    pub created_at: DateTime<Utc>,
}

impl MealEntry {
    #[must_use]
    pub fn calories(&self) -> f64 {
        self.food.calories * self.quantity
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

/// The aggregate nutrition record for one calendar date.
///
/// `totals` is always the full re-summation of `meals`; it is recomputed on
/// every mutation and never updated incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyLog {
    pub meals: Vec<MealEntry>,
    pub totals: Totals,
    pub water_ml: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mood: Option<Mood>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_kg: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl DailyLog {
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            meals: Vec::new(),
            totals: Totals::default(),
            water_ml: 0,
            mood: None,
            weight_kg: None,
            updated_at: now,
        }
    }
}

/// Per-date weight view. At most one entry per date; same-date writes
/// overwrite rather than append.
#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_g: Option<f64>,
    pub water_ml: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_kg: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

// --- Feed types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedComment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub likes: Vec<String>,
    pub comments: Vec<FeedComment>,
}

// --- Validation ---

pub fn validate_food(food: &FoodItem) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if food.calories < 0.0 {
        bail!("calories must not be negative");
    }
    if food.protein < 0.0 {
        bail!("protein must not be negative");
    }
    if food.carbs < 0.0 {
        bail!("carbs must not be negative");
    }
    if food.fat < 0.0 {
        bail!("fat must not be negative");
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<()> {
    if quantity <= 0.0 || !quantity.is_finite() {
        bail!("quantity must be greater than 0");
    }
    Ok(())
}

pub fn validate_mood_rating(rating: u8) -> Result<()> {
    if !(1..=5).contains(&rating) {
        bail!("Mood rating must be between 1 and 5");
    }
    Ok(())
}

pub fn validate_goals(goals: &Goals) -> Result<()> {
    if goals.calories <= 0.0 {
        bail!("Goal calories must be greater than 0");
    }
    if goals.protein_g.is_some_and(|v| v < 0.0) {
        bail!("Goal protein_g must not be negative");
    }
    if goals.carbs_g.is_some_and(|v| v < 0.0) {
        bail!("Goal carbs_g must not be negative");
    }
    if goals.fat_g.is_some_and(|v| v < 0.0) {
        bail!("Goal fat_g must not be negative");
    }
    if goals.weight_kg.is_some_and(|v| v <= 0.0) {
        bail!("Goal weight_kg must be greater than 0");
    }
    Ok(())
}

pub fn validate_weight(kg: f64) -> Result<()> {
    if kg <= 0.0 || !kg.is_finite() {
        bail!("weight_kg must be greater than 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_food() -> FoodItem {
        FoodItem {
            name: "Oats".to_string(),
            calories: 389.0,
            protein: 16.9,
            carbs: 66.3,
            fat: 6.9,
            serving: "100 g".to_string(),
            category: FoodCategory::Grain,
            brand: None,
            barcode: None,
            source: "manual".to_string(),
        }
    }

    #[test]
    fn test_parse_meal_type_valid() {
        assert_eq!(parse_meal_type("breakfast").unwrap(), MealType::Breakfast);
        assert_eq!(parse_meal_type("lunch").unwrap(), MealType::Lunch);
        assert_eq!(parse_meal_type("dinner").unwrap(), MealType::Dinner);
        assert_eq!(parse_meal_type("snack").unwrap(), MealType::Snack);
    }

    #[test]
    fn test_parse_meal_type_case_insensitive() {
        assert_eq!(parse_meal_type("Lunch").unwrap(), MealType::Lunch);
        assert_eq!(parse_meal_type("BREAKFAST").unwrap(), MealType::Breakfast);
    }

    #[test]
    fn test_parse_meal_type_invalid() {
        assert!(parse_meal_type("brunch").is_err());
        assert!(parse_meal_type("").is_err());
    }

    #[test]
    fn test_parse_food_category() {
        assert_eq!(parse_food_category("dairy").unwrap(), FoodCategory::Dairy);
        assert_eq!(parse_food_category("Grain").unwrap(), FoodCategory::Grain);
        assert!(parse_food_category("fastfood").is_err());
    }

    #[test]
    fn test_validate_food_valid() {
        assert!(validate_food(&sample_food()).is_ok());
    }

    #[test]
    fn test_validate_food_empty_name() {
        let mut food = sample_food();
        food.name = "   ".to_string();
        assert!(validate_food(&food).is_err());
    }

    #[test]
    fn test_validate_food_negative_nutrient() {
        let mut food = sample_food();
        food.calories = -10.0;
        assert!(validate_food(&food).is_err());

        let mut food = sample_food();
        food.fat = -0.1;
        assert!(validate_food(&food).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1.5).is_ok());
        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(-2.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_mood_rating() {
        for r in 1..=5 {
            assert!(validate_mood_rating(r).is_ok());
        }
        assert!(validate_mood_rating(0).is_err());
        assert!(validate_mood_rating(6).is_err());
    }

    #[test]
    fn test_validate_goals() {
        let goals = Goals {
            calories: 2000.0,
            protein_g: Some(150.0),
            carbs_g: None,
            fat_g: None,
            water_ml: 2000,
            weight_kg: Some(75.0),
            updated_at: Utc::now(),
        };
        assert!(validate_goals(&goals).is_ok());

        let mut bad = goals.clone();
        bad.calories = 0.0;
        assert!(validate_goals(&bad).is_err());

        let mut bad = goals;
        bad.protein_g = Some(-1.0);
        assert!(validate_goals(&bad).is_err());
    }

    #[test]
    fn test_meal_entry_calories() {
        let entry = MealEntry {
            id: "x".to_string(),
            meal_type: MealType::Breakfast,
            food: sample_food(),
            quantity: 0.5,
            created_at: Utc::now(),
        };
        assert!((entry.calories() - 194.5).abs() < 0.01);
    }

    #[test]
    fn test_food_category_serde_roundtrip() {
        let json = serde_json::to_string(&FoodCategory::Beverage).unwrap();
        assert_eq!(json, "\"beverage\"");
        let cat: FoodCategory = serde_json::from_str("\"vegetable\"").unwrap();
        assert_eq!(cat, FoodCategory::Vegetable);
    }
}
