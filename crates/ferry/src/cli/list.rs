use std::process::ExitCode;

use anyhow::Result;
use ferry_catalog::Catalog;
use indicatif::HumanBytes;
use tabled::Tabled;

use super::FerryEngine;
use crate::ui::Formatter;

#[derive(Clone, Debug, clap::Args)]
pub struct ListArg {
    /// Omit the column names.
    #[arg(long)]
    pub no_header: bool,

    /// Add each entry's description.
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id:    String,
    #[tabled(rename = "NAME")]
    name:  String,
    #[tabled(rename = "SIZE")]
    size:  String,
    #[tabled(rename = "STATE")]
    state: String,
}

#[derive(Tabled)]
struct LongRow {
    #[tabled(inline)]
    row:         Row,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

impl ListArg {
    pub fn run(self, engine: &FerryEngine) -> Result<ExitCode> {
        let entries = engine.catalog().list_entries();
        let mut rows = Vec::with_capacity(entries.len());

        for entry in &entries {
            let state = engine.current_state(entry.id()).unwrap_or_default();
            let staged = engine.staged_bytes(entry.id())?;
            let state = match state {
                ferry_engine::TransferState::Idle if staged > 0 => format!("idle ({} staged)", HumanBytes(staged)),
                other => other.to_string(),
            };

            let row = Row {
                id: entry.id().to_string(),
                name: entry.display_name().to_string(),
                size: entry
                    .expected_size_bytes()
                    .map(|n| HumanBytes(n).to_string())
                    .unwrap_or_else(|| "-".to_string()),
                state,
            };
            rows.push(LongRow {
                row,
                description: entry.description().unwrap_or_default().to_string(),
            });
        }

        let footer = match entries.len() {
            1 => "1 entry".to_string(),
            n => format!("{n} entries"),
        };
        let formatter = Formatter {
            footer: Some(footer),
            no_names: self.no_header,
            ..Default::default()
        };
        let table = if self.long {
            formatter.build(rows)
        } else {
            formatter.build(rows.into_iter().map(|long| long.row))
        };
        println!("{table}");

        Ok(ExitCode::SUCCESS)
    }
}
