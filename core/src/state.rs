use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    DailyLog, FoodItem, Goals, MealEntry, MealType, Mood, Totals, WeightEntry, validate_food,
    validate_mood_rating, validate_quantity, validate_weight,
};

/// The nutrition document: every day bucket, the user's goals, and the
/// locally defined food palette.
///
/// This is the single writer for day buckets. The sync engine merges remote
/// buckets into `days` via [`crate::sync::merge_remote`] but never replaces
/// the map wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutritionState {
    pub days: BTreeMap<NaiveDate, DailyLog>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goals: Option<Goals>,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
}

/// Meals for one meal type within a day, with subtotals, for display.
#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal_type: MealType,
    pub entries: Vec<MealEntry>,
    pub subtotal: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub totals: Totals,
    pub water_ml: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_calories: Option<f64>,
}

/// Full re-summation over the meal sequence. Intentionally not incremental:
/// summing from scratch keeps totals drift-free no matter how many small
/// mutations a bucket sees.
fn compute_totals(meals: &[MealEntry]) -> Totals {
    let mut totals = Totals::default();
    for entry in meals {
        totals.calories += entry.food.calories * entry.quantity;
        totals.protein += entry.food.protein * entry.quantity;
        totals.carbs += entry.food.carbs * entry.quantity;
        totals.fat += entry.food.fat * entry.quantity;
    }
    totals
}

impl NutritionState {
    /// Fetch the bucket for a date, creating a zeroed one if absent.
    /// Callers never need existence checks.
    fn bucket_mut(&mut self, date: NaiveDate, now: DateTime<Utc>) -> &mut DailyLog {
        self.days.entry(date).or_insert_with(|| DailyLog::empty(now))
    }

    pub fn add_meal(
        &mut self,
        date: NaiveDate,
        meal_type: MealType,
        food: FoodItem,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Result<MealEntry> {
        validate_food(&food)?;
        validate_quantity(quantity)?;

        let entry = MealEntry {
            id: Uuid::new_v4().to_string(),
            meal_type,
            food,
            quantity,
            created_at: now,
        };
        let bucket = self.bucket_mut(date, now);
        bucket.meals.push(entry.clone());
        bucket.totals = compute_totals(&bucket.meals);
        bucket.updated_at = now;
        Ok(entry)
    }

    /// Remove a meal entry by id, wherever it lives. Returns `false` and
    /// leaves every bucket untouched when the id is unknown.
    pub fn remove_meal(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        for bucket in self.days.values_mut() {
            if let Some(pos) = bucket.meals.iter().position(|m| m.id == id) {
                bucket.meals.remove(pos);
                bucket.totals = compute_totals(&bucket.meals);
                bucket.updated_at = now;
                return true;
            }
        }
        false
    }

    pub fn clear_meals(&mut self, date: NaiveDate, now: DateTime<Utc>) {
        let bucket = self.bucket_mut(date, now);
        bucket.meals.clear();
        bucket.totals = Totals::default();
        bucket.updated_at = now;
    }

    /// Upsert mood/note onto the bucket without touching meals or totals.
    pub fn update_mood(
        &mut self,
        date: NaiveDate,
        rating: u8,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        validate_mood_rating(rating)?;
        let bucket = self.bucket_mut(date, now);
        bucket.mood = Some(Mood { rating, note });
        bucket.updated_at = now;
        Ok(())
    }

    pub fn add_water(&mut self, date: NaiveDate, ml: u32, now: DateTime<Utc>) -> u32 {
        let bucket = self.bucket_mut(date, now);
        bucket.water_ml = bucket.water_ml.saturating_add(ml);
        bucket.updated_at = now;
        bucket.water_ml
    }

    pub fn set_water(&mut self, date: NaiveDate, ml: u32, now: DateTime<Utc>) {
        let bucket = self.bucket_mut(date, now);
        bucket.water_ml = ml;
        bucket.updated_at = now;
    }

    /// Per-date weight upsert. Same-date writes overwrite.
    pub fn log_weight(&mut self, date: NaiveDate, kg: f64, now: DateTime<Utc>) -> Result<()> {
        validate_weight(kg)?;
        let bucket = self.bucket_mut(date, now);
        bucket.weight_kg = Some(kg);
        bucket.updated_at = now;
        Ok(())
    }

    #[must_use]
    pub fn weight(&self, date: NaiveDate) -> Option<f64> {
        self.days.get(&date).and_then(|b| b.weight_kg)
    }

    /// Weight entries newest-first.
    #[must_use]
    pub fn weight_history(&self, limit: Option<usize>) -> Vec<WeightEntry> {
        let iter = self
            .days
            .iter()
            .rev()
            .filter_map(|(date, bucket)| {
                bucket.weight_kg.map(|weight_kg| WeightEntry {
                    date: *date,
                    weight_kg,
                })
            });
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn set_goals(&mut self, mut goals: Goals, now: DateTime<Utc>) -> Result<()> {
        crate::models::validate_goals(&goals)?;
        goals.updated_at = now;
        self.goals = Some(goals);
        Ok(())
    }

    pub fn clear_goals(&mut self) -> bool {
        self.goals.take().is_some()
    }

    pub fn add_food(&mut self, food: FoodItem) -> Result<()> {
        validate_food(&food)?;
        // Same-name palette entries overwrite
        self.foods.retain(|f| f.name != food.name);
        self.foods.push(food);
        Ok(())
    }

    #[must_use]
    pub fn find_food(&self, name: &str) -> Option<&FoodItem> {
        let lower = name.to_lowercase();
        self.foods
            .iter()
            .find(|f| f.name.to_lowercase() == lower)
            .or_else(|| {
                self.foods
                    .iter()
                    .find(|f| f.name.to_lowercase().contains(&lower))
            })
    }

    /// Meals grouped by meal type with subtotals, plus the bucket's other
    /// fields, for display. An absent date yields an all-zero summary.
    #[must_use]
    pub fn day_summary(&self, date: NaiveDate) -> DaySummary {
        let (meals, totals, water_ml, mood, weight_kg) = match self.days.get(&date) {
            Some(bucket) => {
                let groups = MealType::ALL
                    .iter()
                    .filter_map(|&meal_type| {
                        let entries: Vec<MealEntry> = bucket
                            .meals
                            .iter()
                            .filter(|m| m.meal_type == meal_type)
                            .cloned()
                            .collect();
                        if entries.is_empty() {
                            None
                        } else {
                            let subtotal = compute_totals(&entries);
                            Some(MealGroup {
                                meal_type,
                                entries,
                                subtotal,
                            })
                        }
                    })
                    .collect();
                (
                    groups,
                    bucket.totals,
                    bucket.water_ml,
                    bucket.mood.clone(),
                    bucket.weight_kg,
                )
            }
            None => (Vec::new(), Totals::default(), 0, None, None),
        };

        let remaining_calories = self.goals.as_ref().map(|g| g.calories - totals.calories);

        DaySummary {
            date,
            meals,
            totals,
            water_ml,
            mood,
            weight_kg,
            remaining_calories,
        }
    }
}
