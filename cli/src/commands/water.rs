use anyhow::Result;
use chrono::Utc;

use nosh_core::service::NoshService;

use super::helpers::parse_date;

pub(crate) fn cmd_water_add(
    svc: &mut NoshService,
    ml: u32,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let total = svc.add_water(date, ml, Utc::now());

    if json {
        println!("{}", serde_json::json!({ "date": date, "water_ml": total }));
    } else {
        let goal_suffix = svc
            .state()
            .goals
            .as_ref()
            .filter(|g| g.water_ml > 0)
            .map(|g| format!(" / {} ml goal", g.water_ml))
            .unwrap_or_default();
        println!("Water for {date}: {total} ml{goal_suffix}");
    }

    Ok(())
}

pub(crate) fn cmd_water_set(
    svc: &mut NoshService,
    ml: u32,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    svc.set_water(date, ml, Utc::now());

    if json {
        println!("{}", serde_json::json!({ "date": date, "water_ml": ml }));
    } else {
        println!("Water for {date} set to {ml} ml");
    }

    Ok(())
}
