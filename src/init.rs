use std::fmt::Write as _;
use std::path::Path;

use cheatcode_index::IndexError;
use cheatcode_index::indexer::{CodeIndexer, IndexReport};
use cheatcode_llm::LlmProvider;

pub(crate) const ALREADY_INITIALIZED: &str = "CheatCode already initialized.";

/// Index `root`, returning the message to show the user.
///
/// An existing index is not an error: the project is left untouched.
pub(crate) async fn run<P: LlmProvider>(
    indexer: &CodeIndexer<P>,
    root: &Path,
) -> anyhow::Result<String> {
    match indexer.init(root).await {
        Ok(report) => Ok(summary(&report)),
        Err(IndexError::AlreadyInitialized(path)) => {
            tracing::debug!(path = %path.display(), "index already present");
            Ok(ALREADY_INITIALIZED.to_owned())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!(
            "failed to index {}",
            root.display()
        ))),
    }
}

fn summary(report: &IndexReport) -> String {
    let mut out = format!(
        "Indexed {} chunks from {} of {} source files into {}",
        report.chunks_created,
        report.files_indexed,
        report.files_scanned,
        report.db_path.display()
    );
    if !report.skipped.is_empty() {
        let _ = write!(out, "\nSkipped {} files:", report.skipped.len());
        for skipped in &report.skipped {
            let _ = write!(out, "\n  {}: {}", skipped.path, skipped.reason);
        }
    }
    out
}
