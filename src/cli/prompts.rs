//! Interactive prompts for the menu loop.

use super::commands::{AqiArgs, HistoryArgs, RankingsArgs};
use crate::analysis::{DEFAULT_RANKING_LIMIT, MAX_RANKING_LIMIT, MIN_RANKING_LIMIT};
use crate::error::Result;
use crate::models::Pollutant;
use dialoguer::{theme::ColorfulTheme, Confirm, FuzzySelect, Input, Select};

const RANKING_KINDS: [&str; 3] = ["worst", "best", "all"];

pub fn prompt_rankings() -> Result<RankingsArgs> {
    let theme = ColorfulTheme::default();
    let kind = Select::with_theme(&theme)
        .with_prompt("Which ranking?")
        .items(&RANKING_KINDS)
        .default(0)
        .interact()?;

    let limit = Input::<i64>::with_theme(&theme)
        .with_prompt(format!(
            "How many stations ({}-{})?",
            MIN_RANKING_LIMIT, MAX_RANKING_LIMIT
        ))
        .default(DEFAULT_RANKING_LIMIT)
        .validate_with(|limit: &i64| -> std::result::Result<(), String> {
            if (MIN_RANKING_LIMIT..=MAX_RANKING_LIMIT).contains(limit) {
                Ok(())
            } else {
                Err(format!(
                    "Enter a number between {} and {}",
                    MIN_RANKING_LIMIT, MAX_RANKING_LIMIT
                ))
            }
        })
        .interact_text()?;

    let fresh = Confirm::with_theme(&theme)
        .with_prompt("Bypass the cache?")
        .default(false)
        .interact()?;

    Ok(RankingsArgs {
        kind: RANKING_KINDS[kind].to_string(),
        limit,
        fresh,
        json: false,
    })
}

/// `None` means every country.
pub fn prompt_country(countries: &[String]) -> Result<Option<String>> {
    let mut items = vec!["All countries".to_string()];
    items.extend(countries.iter().cloned());

    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Filter cities by country")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => None,
        n => Some(items[n].clone()),
    })
}

pub fn prompt_history() -> Result<HistoryArgs> {
    let theme = ColorfulTheme::default();
    let city = Input::<String>::with_theme(&theme)
        .with_prompt("City")
        .validate_with(|city: &String| -> std::result::Result<(), &str> {
            if city.trim().is_empty() {
                Err("City must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let days = Input::<i32>::with_theme(&theme)
        .with_prompt("Days of history")
        .default(7)
        .validate_with(|days: &i32| -> std::result::Result<(), &str> {
            if *days >= 1 {
                Ok(())
            } else {
                Err("Enter at least one day")
            }
        })
        .interact_text()?;

    Ok(HistoryArgs {
        city: city.trim().to_string(),
        days,
    })
}

/// Asks for each pollutant in turn; a blank answer leaves it unreported.
pub fn prompt_concentrations() -> Result<AqiArgs> {
    let theme = ColorfulTheme::default();
    let mut args = AqiArgs::default();

    for pollutant in Pollutant::ALL {
        let answer = Input::<String>::with_theme(&theme)
            .with_prompt(format!("{} ({}), blank to skip", pollutant.label(), pollutant.unit()))
            .allow_empty(true)
            .validate_with(|value: &String| -> std::result::Result<(), &str> {
                if value.trim().is_empty() || value.trim().parse::<f64>().is_ok() {
                    Ok(())
                } else {
                    Err("Enter a number or leave blank")
                }
            })
            .interact_text()?;
        args.set(pollutant, answer.trim().parse::<f64>().ok());
    }

    Ok(args)
}
