use std::collections::HashMap;

use ferry_engine::{Snapshot, TransferState};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {prefix:>16.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// One progress bar per entry id, driven by registry snapshots.
pub struct ProgressBoard {
    _multi: MultiProgress,
    bars:   HashMap<String, ProgressBar>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressBoardBuilder {
    entries: Vec<(String, Option<u64>)>,
}

impl ProgressBoardBuilder {
    /// Add a bar for `id`, sized to `len` when known.
    pub fn with_entry(mut self, id: &str, len: Option<u64>) -> Self {
        self.entries.push((id.to_string(), len));
        self
    }

    pub fn build(self) -> ProgressBoard {
        let multi = MultiProgress::new();
        let bars = self
            .entries
            .into_iter()
            .map(|(id, len)| {
                let pb = ProgressBar::new(len.unwrap_or(0));
                let pb = if let Some(style) = PB_TEMPLATE.as_ref() {
                    pb.with_style(style.clone())
                } else {
                    pb
                };
                pb.set_prefix(id.clone());
                (id, multi.add(pb))
            })
            .collect();

        ProgressBoard { _multi: multi, bars }
    }
}

impl ProgressBoard {
    pub fn update(&self, snapshot: &Snapshot) {
        for (id, pb) in &self.bars {
            let Some(state) = snapshot.get(id) else {
                continue;
            };
            match state {
                TransferState::Downloading {
                    bytes_downloaded,
                    total_bytes,
                    ..
                } => {
                    if let Some(total) = total_bytes {
                        pb.set_length(*total);
                    }
                    pb.set_position(*bytes_downloaded);
                    pb.set_message("downloading");
                }
                TransferState::Verifying => pb.set_message("verifying"),
                TransferState::Idle | TransferState::Complete { .. } | TransferState::Error { .. } => {}
            }
        }
    }

    /// Freeze the bar for `id` with its terminal state.
    pub fn finish(&self, id: &str, state: &TransferState) {
        let Some(pb) = self.bars.get(id) else {
            return;
        };
        match state {
            TransferState::Complete { .. } => {
                if let Some(len) = pb.length() {
                    pb.set_position(len);
                }
                pb.finish_with_message("done");
            }
            TransferState::Idle => pb.abandon_with_message("cancelled"),
            other => pb.abandon_with_message(other.to_string()),
        }
    }
}
