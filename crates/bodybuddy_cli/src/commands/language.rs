//! Language preference commands.

use super::open_existing;
use bodybuddy_store::{Query, Store};
use bodybuddy_sync::Language;
use std::path::Path;

/// Prints the selected language.
pub fn get(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    match store.preferences().selected_language() {
        Some(code) => match find(&store, &code)? {
            Some(language) => println!("{code} ({})", display_name(&language)),
            None => println!("{code}"),
        },
        None => println!("No language selected"),
    }
    Ok(())
}

/// Selects a synced language by short name.
pub fn set(path: &Path, code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let language = find(&store, code)?
        .ok_or_else(|| format!("Unknown language `{code}` (run `bodybuddy sync language` first)"))?;
    store.preferences().set_selected_language(code)?;
    store.close()?;
    println!("Selected {code} ({})", display_name(&language));
    Ok(())
}

/// Clears the selected language.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    store.preferences().clear_selected_language()?;
    store.close()?;
    println!("Language selection cleared");
    Ok(())
}

/// Lists synced languages by short name, marking the selected one.
pub fn list(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let selected = store.preferences().selected_language();
    let query =
        Query::<Language>::all().sort_by_key(|l| l.short_name.clone().unwrap_or_default());

    for (_, language) in store.query(&query)? {
        let code = language.short_name.clone().unwrap_or_default();
        let marker = if selected.as_deref() == Some(code.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("{marker} {code:<4} {}", display_name(&language));
    }
    Ok(())
}

fn find(store: &Store, code: &str) -> Result<Option<Language>, Box<dyn std::error::Error>> {
    let code = code.to_string();
    let query = Query::<Language>::all()
        .filter(move |l| l.short_name.as_deref() == Some(code.as_str()));
    let rows = store.query(&query)?;
    Ok(rows.into_iter().next().map(|(_, language)| language))
}

fn display_name(language: &Language) -> &str {
    language
        .full_name
        .as_deref()
        .or(language.short_name.as_deref())
        .unwrap_or("?")
}
