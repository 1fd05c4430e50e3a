use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::cache;
use crate::models::{FoodItem, Goals, MealEntry, MealType, WeightEntry};
use crate::state::{DaySummary, NutritionState};
use crate::storage::{STATE_KEY, Storage};
use crate::sync::{NutritionApi, SyncEngine, SyncOutcome, run_sync};

/// How long remote food search results stay fresh.
const SEARCH_CACHE_TTL_MINUTES: i64 = 60;

/// Remote food database lookup. The CLI implements this with a reqwest
/// OpenFoodFacts client; tests use in-memory mocks.
pub trait FoodSearchProvider: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<FoodItem>>;
}

/// Facade over the nutrition document and its local persistence.
///
/// Owns the in-memory [`NutritionState`] (loaded from storage on open) and
/// writes it back after every mutation. Persistence failures are soft: the
/// in-memory state stays correct and the write is retried on the next
/// mutation.
pub struct NoshService {
    storage: Storage,
    state: NutritionState,
}

impl NoshService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let storage = Storage::open(db_path)?;
        let state = storage.load_state(STATE_KEY);
        Ok(Self { storage, state })
    }

    pub fn open_in_memory() -> Result<Self> {
        let storage = Storage::open_in_memory()?;
        let state = storage.load_state(STATE_KEY);
        Ok(Self { storage, state })
    }

    #[must_use]
    pub fn state(&self) -> &NutritionState {
        &self.state
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn persist(&self) {
        self.storage.save_state(STATE_KEY, &self.state);
    }

    // --- Aggregator operations (mutate, then persist) ---

    pub fn add_meal(
        &mut self,
        date: NaiveDate,
        meal_type: MealType,
        food: FoodItem,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Result<MealEntry> {
        let entry = self.state.add_meal(date, meal_type, food, quantity, now)?;
        self.persist();
        Ok(entry)
    }

    pub fn remove_meal(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let removed = self.state.remove_meal(id, now);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear_meals(&mut self, date: NaiveDate, now: DateTime<Utc>) {
        self.state.clear_meals(date, now);
        self.persist();
    }

    pub fn update_mood(
        &mut self,
        date: NaiveDate,
        rating: u8,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.state.update_mood(date, rating, note, now)?;
        self.persist();
        Ok(())
    }

    pub fn add_water(&mut self, date: NaiveDate, ml: u32, now: DateTime<Utc>) -> u32 {
        let total = self.state.add_water(date, ml, now);
        self.persist();
        total
    }

    pub fn set_water(&mut self, date: NaiveDate, ml: u32, now: DateTime<Utc>) {
        self.state.set_water(date, ml, now);
        self.persist();
    }

    pub fn log_weight(&mut self, date: NaiveDate, kg: f64, now: DateTime<Utc>) -> Result<()> {
        self.state.log_weight(date, kg, now)?;
        self.persist();
        Ok(())
    }

    #[must_use]
    pub fn weight_history(&self, limit: Option<usize>) -> Vec<WeightEntry> {
        self.state.weight_history(limit)
    }

    pub fn set_goals(&mut self, goals: Goals, now: DateTime<Utc>) -> Result<()> {
        self.state.set_goals(goals, now)?;
        self.persist();
        Ok(())
    }

    pub fn clear_goals(&mut self) -> bool {
        let cleared = self.state.clear_goals();
        if cleared {
            self.persist();
        }
        cleared
    }

    pub fn add_food(&mut self, food: FoodItem) -> Result<()> {
        self.state.add_food(food)?;
        self.persist();
        Ok(())
    }

    #[must_use]
    pub fn day_summary(&self, date: NaiveDate) -> DaySummary {
        self.state.day_summary(date)
    }

    // --- Food search (palette first, then cached remote) ---

    /// Search the local palette and the remote food database. Remote results
    /// are cached with a TTL; a cache hit skips the provider entirely.
    pub fn search_foods(
        &self,
        provider: &dyn FoodSearchProvider,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<FoodItem>> {
        let lower = query.to_lowercase();
        let local: Vec<FoodItem> = self
            .state
            .foods
            .iter()
            .filter(|f| f.name.to_lowercase().contains(&lower))
            .cloned()
            .collect();

        let cache_key = format!("search:{lower}");
        let remote: Vec<FoodItem> = match cache::get(&self.storage, &cache_key, now) {
            Some(hit) => hit,
            None => {
                let results = provider.search(query)?;
                cache::put(
                    &self.storage,
                    &cache_key,
                    &results,
                    Duration::minutes(SEARCH_CACHE_TTL_MINUTES),
                    now,
                );
                results
            }
        };

        // Palette entries first, remote results deduplicated by name
        let mut all = local;
        for food in remote {
            if !all.iter().any(|f| f.name == food.name) {
                all.push(food);
            }
        }
        Ok(all)
    }

    // --- Sync ---

    /// One sync attempt against the remote store; persists on any change.
    pub fn sync(
        &mut self,
        engine: &mut SyncEngine,
        api: &dyn NutritionApi,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        let outcome = run_sync(engine, api, &mut self.state, now);
        if matches!(outcome, SyncOutcome::Completed { .. }) {
            self.persist();
        }
        outcome
    }
}
