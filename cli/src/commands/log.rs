use anyhow::Result;
use chrono::Utc;
use std::process;

use nosh_core::models::parse_meal_type;
use nosh_core::service::{FoodSearchProvider, NoshService};

use super::helpers::{json_error, parse_date, parse_quantity, print_food_table, prompt_choice};

pub(crate) fn cmd_log(
    svc: &mut NoshService,
    provider: &dyn FoodSearchProvider,
    food_query: &str,
    meal: &str,
    quantity_str: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let meal_type = parse_meal_type(meal)?;
    let quantity = parse_quantity(quantity_str)?;
    let date = parse_date(date)?;
    let now = Utc::now();

    // Exact palette match logs without a network round trip
    let food = if let Some(found) = svc.state().find_food(food_query) {
        found.clone()
    } else {
        let all = svc.search_foods(provider, food_query, now)?;

        if all.is_empty() {
            if json {
                println!(
                    "{}",
                    json_error(&format!("No food found for '{food_query}'"))
                );
            } else {
                eprintln!("No food found for '{food_query}'");
            }
            process::exit(2);
        }

        if all.len() == 1 {
            all.into_iter().next().unwrap()
        } else {
            let refs: Vec<&_> = all.iter().collect();
            print_food_table(&refs);
            let idx = prompt_choice(all.len())?;
            all.into_iter().nth(idx).unwrap()
        }
    };

    let entry = svc.add_meal(date, meal_type, food, quantity, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let name = &entry.food.name;
        let serving = &entry.food.serving;
        let meal_type = entry.meal_type.as_str();
        let cal = entry.calories();
        let qty = entry.quantity;
        println!("Logged: {name} ({qty} x {serving}) for {meal_type}: {cal:.0} kcal");
    }

    Ok(())
}

pub(crate) fn cmd_delete(svc: &mut NoshService, id: &str, json: bool) -> Result<()> {
    if svc.remove_meal(id, Utc::now()) {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted meal entry {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Meal entry '{id}' not found")));
        } else {
            eprintln!("Meal entry '{id}' not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_clear(svc: &mut NoshService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    svc.clear_meals(date, Utc::now());

    if json {
        println!("{}", serde_json::json!({ "cleared": date }));
    } else {
        println!("Cleared all meals for {date}");
    }

    Ok(())
}
