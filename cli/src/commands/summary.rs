use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::service::NoshService;

use super::helpers::{no_neg_zero, parse_date};

pub(crate) fn cmd_summary(svc: &NoshService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.day_summary(date);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.meals.is_empty() && summary.water_ml == 0 && summary.mood.is_none() {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    println!("=== {date} ===\n");

    for group in &summary.meals {
        let meal_label = group.meal_type.as_str().to_uppercase();
        let sub_cal = group.subtotal.calories;
        println!("  {meal_label} ({sub_cal:.0} kcal)");
        for e in &group.entries {
            let name = &e.food.name;
            let brand = e
                .food
                .brand
                .as_ref()
                .map(|b| format!(" ({b})"))
                .unwrap_or_default();
            let id = &e.id;
            let qty = e.quantity;
            let serving = &e.food.serving;
            let cal = e.food.calories * e.quantity;
            let protein = e.food.protein * e.quantity;
            let carbs = e.food.carbs * e.quantity;
            let fat = e.food.fat * e.quantity;
            println!(
                "    [{id}] {name}{brand} x{qty} ({serving}) {cal:.0} kcal | P:{protein:.0}g C:{carbs:.0}g F:{fat:.0}g"
            );
        }
        println!();
    }

    let total_cal = summary.totals.calories;
    let total_p = summary.totals.protein;
    let total_c = summary.totals.carbs;
    let total_f = summary.totals.fat;
    println!("  TOTAL: {total_cal:.0} kcal | P:{total_p:.0}g C:{total_c:.0}g F:{total_f:.0}g");

    if summary.water_ml > 0 {
        let water = summary.water_ml;
        println!("  WATER: {water} ml");
    }
    if let Some(ref mood) = summary.mood {
        let rating = mood.rating;
        match mood.note {
            Some(ref note) => println!("  MOOD: {rating}/5 ({note})"),
            None => println!("  MOOD: {rating}/5"),
        }
    }
    if let Some(kg) = summary.weight_kg {
        println!("  WEIGHT: {kg:.1} kg");
    }
    if let Some(remaining) = summary.remaining_calories {
        let remaining = no_neg_zero(remaining);
        println!("  REMAINING: {remaining:.0} kcal");
    }

    Ok(())
}

pub(crate) fn cmd_history(svc: &NoshService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Water")]
        water: String,
    }

    let today = Local::now().date_naive();
    let mut summaries = Vec::new();

    for i in 0..days {
        let date = today - chrono::Duration::days(i64::from(i));
        summaries.push(svc.day_summary(date));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| {
            let cal = no_neg_zero(s.totals.calories);
            let p = no_neg_zero(s.totals.protein);
            let c = no_neg_zero(s.totals.carbs);
            let f = no_neg_zero(s.totals.fat);
            HistoryRow {
                date: s.date.to_string(),
                calories: format!("{cal:.0}"),
                protein: format!("{p:.0}g"),
                carbs: format!("{c:.0}g"),
                fat: format!("{f:.0}g"),
                water: format!("{}ml", s.water_ml),
            }
        })
        .collect();

    if rows.iter().all(|r| r.calories == "0" && r.water == "0ml") {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
