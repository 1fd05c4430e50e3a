use anyhow::{Result, bail};
use chrono::Utc;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::service::NoshService;

use super::helpers::{json_error, no_neg_zero, parse_date};

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn cmd_weight_log(
    svc: &mut NoshService,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if value <= 0.0 {
        bail!("Weight must be greater than 0");
    }

    let weight_kg = match unit.to_lowercase().as_str() {
        "kg" => value,
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs to {kg:.2} kg");
            kg
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    };

    let date = parse_date(date)?;
    svc.log_weight(date, weight_kg, Utc::now())?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "date": date, "weight_kg": weight_kg })
        );
    } else {
        let lbs = weight_kg * LBS_PER_KG;
        println!("Logged {weight_kg:.1} kg ({lbs:.1} lbs) for {date}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_show(svc: &NoshService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(kg) = svc.state().weight(date) {
        if json {
            println!("{}", serde_json::json!({ "date": date, "weight_kg": kg }));
        } else {
            let lbs = kg * LBS_PER_KG;
            println!("{date}: {kg:.1} kg ({lbs:.1} lbs)");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("No weight entry for {date}")));
        } else {
            eprintln!("No weight entry for {date}");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_weight_history(svc: &NoshService, limit: Option<usize>, json: bool) -> Result<()> {
    let entries = svc.weight_history(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `nosh weight log` to record your weight.");
        process::exit(2);
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                date: e.date.to_string(),
                kg: format!("{:.1}", e.weight_kg),
                lbs: format!("{:.1}", e.weight_kg * LBS_PER_KG),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");

        if let Some(goal_kg) = svc.state().goals.as_ref().and_then(|g| g.weight_kg) {
            let latest = entries[0].weight_kg;
            let delta = latest - goal_kg;
            println!("Goal: {goal_kg:.1} kg ({delta:+.1} kg from latest)");
        }
    }

    Ok(())
}
