use std::process::ExitCode;

use anyhow::{Context, Result};
use ferry_engine::TransferState;
use tabled::Tabled;

use super::FerryEngine;
use crate::ui::Formatter;

#[derive(Clone, Debug, clap::Args)]
pub struct StatusArg {
    /// Print the registry snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id:     String,
    #[tabled(rename = "STATE")]
    state:  String,
    #[tabled(rename = "STAGED")]
    staged: u64,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

impl StatusArg {
    pub fn run(self, engine: &FerryEngine) -> Result<ExitCode> {
        let snapshot = engine.snapshot();

        if self.json {
            let json = serde_json::to_string_pretty(&snapshot).context("serializing status")?;
            println!("{json}");
            return Ok(ExitCode::SUCCESS);
        }

        let mut rows = Vec::with_capacity(snapshot.len());
        for (id, state) in &snapshot {
            rows.push(Row {
                id:     id.clone(),
                state:  state.name().to_string(),
                staged: engine.staged_bytes(id)?,
                detail: match state {
                    TransferState::Complete { final_path } => final_path.display().to_string(),
                    TransferState::Error { message } => message.clone(),
                    _ => String::new(),
                },
            });
        }

        let table = Formatter {
            header: Some(engine.storage_dir().display().to_string()),
            ..Default::default()
        }
        .build(rows);
        println!("{table}");

        Ok(ExitCode::SUCCESS)
    }
}
