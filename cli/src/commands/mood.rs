use anyhow::Result;
use chrono::Utc;

use nosh_core::service::NoshService;

use super::helpers::parse_date;

pub(crate) fn cmd_mood(
    svc: &mut NoshService,
    rating: u8,
    note: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    svc.update_mood(date, rating, note.clone(), Utc::now())?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "date": date, "rating": rating, "note": note })
        );
    } else {
        match note {
            Some(note) => println!("Mood for {date}: {rating}/5 ({note})"),
            None => println!("Mood for {date}: {rating}/5"),
        }
    }

    Ok(())
}
