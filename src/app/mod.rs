pub mod cli;
pub mod headless;
pub mod tui_runner;

use crate::catalog::{Catalog, Role};
use anyhow::Result;
use serde::Serialize;

pub use cli::Cli;
pub use headless::{HeadlessRunner, SurveyScript};
pub use tui_runner::run_tui;

#[derive(Serialize)]
struct CatalogListing<'a> {
    role: Role,
    label: Option<&'a str>,
    questions: Vec<crate::catalog::Question>,
}

/// The question sequence of a role, as pretty JSON.
pub fn catalog_json(catalog: &Catalog, role_id: &str) -> Result<String> {
    let role: Role = role_id.parse()?;
    let listing = CatalogListing {
        role,
        label: catalog.role_entry(role).map(|entry| entry.label.as_str()),
        questions: catalog.questions(role),
    };
    Ok(serde_json::to_string_pretty(&listing)?)
}
