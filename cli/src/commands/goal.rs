use anyhow::Result;
use chrono::Utc;
use std::process;

use nosh_core::models::Goals;
use nosh_core::service::NoshService;

use super::helpers::json_error;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_goal_set(
    svc: &mut NoshService,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    water_ml: u32,
    weight: Option<f64>,
    json: bool,
) -> Result<()> {
    let goals = Goals {
        calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
        water_ml,
        weight_kg: weight,
        updated_at: Utc::now(),
    };

    svc.set_goals(goals, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&svc.state().goals)?);
    } else {
        println!("Goals updated:");
        print_goals(svc.state().goals.as_ref().unwrap());
    }

    Ok(())
}

pub(crate) fn cmd_goal_show(svc: &NoshService, json: bool) -> Result<()> {
    match svc.state().goals {
        Some(ref goals) => {
            if json {
                println!("{}", serde_json::to_string_pretty(goals)?);
            } else {
                print_goals(goals);
            }
            Ok(())
        }
        None => {
            if json {
                println!("{}", json_error("No goals set"));
            } else {
                eprintln!("No goals set. Use `nosh goal set` to configure them.");
            }
            process::exit(2);
        }
    }
}

pub(crate) fn cmd_goal_clear(svc: &mut NoshService, json: bool) -> Result<()> {
    let cleared = svc.clear_goals();

    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Goals cleared");
    } else {
        eprintln!("No goals were set");
    }

    Ok(())
}

fn print_goals(goals: &Goals) {
    let cal = goals.calories;
    println!("  Calories: {cal:.0} kcal");
    if let Some(p) = goals.protein_g {
        println!("  Protein:  {p:.0} g");
    }
    if let Some(c) = goals.carbs_g {
        println!("  Carbs:    {c:.0} g");
    }
    if let Some(f) = goals.fat_g {
        println!("  Fat:      {f:.0} g");
    }
    let water = goals.water_ml;
    println!("  Water:    {water} ml");
    if let Some(w) = goals.weight_kg {
        println!("  Weight:   {w:.1} kg");
    }
}
