use std::process::ExitCode;

use anyhow::{Context, Result};

use super::FerryEngine;

#[derive(Clone, Debug, clap::Args)]
pub struct DeleteArg {
    /// Entry ids to remove.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

impl DeleteArg {
    pub async fn run(self, engine: &FerryEngine) -> Result<ExitCode> {
        for id in &self.ids {
            engine
                .delete(id)
                .await
                .with_context(|| format!("deleting '{id}'"))?;
            println!("deleted {id}");
        }
        Ok(ExitCode::SUCCESS)
    }
}
