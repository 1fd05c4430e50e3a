use anyhow::Result;
use chrono::Utc;
use std::process;

use nosh_core::models::{FoodItem, parse_food_category};
use nosh_core::service::{FoodSearchProvider, NoshService};

use super::helpers::{json_error, print_food_table};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_add(
    svc: &mut NoshService,
    name: &str,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    serving: &str,
    category: &str,
    brand: Option<String>,
    json: bool,
) -> Result<()> {
    let category = parse_food_category(category)?;
    let food = FoodItem {
        name: name.trim().to_string(),
        calories,
        protein,
        carbs,
        fat,
        serving: serving.trim().to_string(),
        category,
        brand,
        barcode: None,
        source: "manual".to_string(),
    };

    svc.add_food(food.clone())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        let name = &food.name;
        let cal = food.calories;
        let serving = &food.serving;
        println!("Added '{name}' to your foods ({cal:.0} kcal per {serving})");
    }

    Ok(())
}

pub(crate) fn cmd_food_list(svc: &NoshService, json: bool) -> Result<()> {
    let foods = &svc.state().foods;

    if json {
        println!("{}", serde_json::to_string_pretty(foods)?);
    } else if foods.is_empty() {
        eprintln!("No foods saved. Use `nosh food add` or `nosh search` to find some.");
        process::exit(2);
    } else {
        let refs: Vec<&FoodItem> = foods.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}

pub(crate) fn cmd_search(
    svc: &NoshService,
    provider: &dyn FoodSearchProvider,
    query: &str,
    json: bool,
) -> Result<()> {
    let results = svc.search_foods(provider, query, Utc::now())?;

    if results.is_empty() {
        if json {
            println!("{}", json_error(&format!("No food found for '{query}'")));
        } else {
            eprintln!("No food found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let refs: Vec<&FoodItem> = results.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}
