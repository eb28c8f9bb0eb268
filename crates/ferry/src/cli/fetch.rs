use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use ferry_catalog::Catalog;
use ferry_engine::{TransferHandle, TransferState};
use futures_util::future::join_all;
use indicatif::HumanBytes;
use tracing::warn;

use super::FerryEngine;
use crate::ui::ProgressBoardBuilder;

/// Exit status after Ctrl-C, as shells report SIGINT.
const INTERRUPTED: u8 = 130;

#[derive(Clone, Debug, clap::Args)]
pub struct FetchArg {
    /// Entry ids to fetch.
    #[arg(required_unless_present = "all")]
    pub ids: Vec<String>,

    /// Fetch every catalog entry.
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,
}

impl FetchArg {
    pub async fn run(self, engine: &FerryEngine) -> Result<ExitCode> {
        let ids = if self.all {
            engine
                .catalog()
                .list_entries()
                .iter()
                .map(|entry| entry.id().to_string())
                .collect()
        } else {
            self.ids
        };
        for id in &ids {
            if engine.current_state(id).is_none() {
                bail!("unknown catalog entry '{id}'");
            }
        }

        let board = ids
            .iter()
            .fold(ProgressBoardBuilder::default(), |board, id| {
                let len = engine.catalog().find_entry(id).and_then(|e| e.expected_size_bytes());
                board.with_entry(id, len)
            })
            .build();

        let mut snapshots = engine.subscribe();
        let mut handles: Vec<TransferHandle> = Vec::with_capacity(ids.len());
        for id in &ids {
            let handle = engine.acquire(id).await.with_context(|| format!("starting '{id}'"))?;
            handles.push(handle);
        }

        let waits = join_all(handles.iter().map(TransferHandle::wait));
        tokio::pin!(waits);

        let mut interrupted = false;
        let outcomes = loop {
            tokio::select! {
                outcomes = &mut waits => break outcomes,
                Ok(()) = snapshots.changed() => board.update(&snapshots.borrow_and_update()),
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    warn!("interrupted; cancelling transfers, partial files are kept");
                    engine.cancel_all();
                }
            }
        };

        for (id, state) in ids.iter().zip(&outcomes) {
            board.finish(id, state);
            match state {
                TransferState::Complete { final_path } => println!("{id}: {}", final_path.display()),
                TransferState::Error { message } => eprintln!("{id}: {message}"),
                _ => {
                    let staged = engine.staged_bytes(id).unwrap_or_default();
                    eprintln!("{id}: cancelled, {} kept for resume", HumanBytes(staged));
                }
            }
        }

        let failed = outcomes.iter().any(TransferState::is_error);
        Ok(if interrupted {
            ExitCode::from(INTERRUPTED)
        } else if failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}
