use itertools::Itertools;
use prettytable::{Table, format, row};
use tracing::instrument;

use super::{AppContext, Process, ProcessOutput};
use crate::{
    cli::{ContextIgnoreProcess, ContextPreviewProcess, ContextShowProcess},
    context::{ContextCollector, FileIndexer},
    errors::Result,
};

impl Process for ContextShowProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let indexer = FileIndexer::new(&self.path, &ctx.config.context);
        let files = indexer.index()?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        if self.verbose {
            table.set_titles(row!["File", "Size", "Lines"]);
            for file in &files {
                let lines = file.lines.map(|l| l.to_string()).unwrap_or_else(|| String::from("-"));
                table.add_row(row![file.relative_path.display(), format_size(file.size), lines]);
            }
        } else {
            table.set_titles(row!["Extension", "Files"]);
            for (extension, count) in FileIndexer::summary(&files) {
                let extension = if extension.is_empty() { String::from("(none)") } else { extension };
                table.add_row(row![extension, count]);
            }
        }

        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        let would_include = files.len().min(ctx.config.context.max_files);
        let summary = format!(
            "{} file(s), {} total; up to {} would be included as context (context.max_files = {})",
            files.len(),
            format_size(total_bytes),
            would_include,
            ctx.config.context.max_files,
        );
        let patterns = ctx.config.context.ignore.iter().join(", ");

        Ok(ProcessOutput::success().stdout(format!("{table}\n{summary}\nIgnore patterns: {patterns}")))
    }
}

impl Process for ContextPreviewProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let collector = ContextCollector::new(&ctx.config.context);
        let mut bundle = collector.collect(&self.path)?;
        if bundle.is_empty() {
            return Ok(ProcessOutput::fail().stderr(format!("No collectable files under {}", self.path.display())));
        }

        let included = bundle.included();
        let total_bytes = bundle.total_bytes();
        bundle.files.truncate(self.files);
        let shown = bundle.files.len();

        let mut output = ProcessOutput::success().stdout(bundle.render());
        let mut notes = vec![format!(
            "Showing {shown} of {included} collectable file(s), {} of content",
            format_size(total_bytes as u64)
        )];
        notes.extend(bundle.warnings.iter().cloned());
        output = output.stderr(notes.join("\n"));
        Ok(output)
    }
}

impl Process for ContextIgnoreProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        if ctx.store.add_ignore_pattern(&self.pattern)? {
            Ok(ProcessOutput::success().stdout(format!("Added ignore pattern: {}", self.pattern)))
        } else {
            Ok(ProcessOutput::success().stdout(format!("Pattern already present: {}", self.pattern)))
        }
    }
}

/// Renders a byte count with a human-friendly unit
fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1_048_576 => format!("{:.1} MB", b as f64 / 1_048_576.0),
        b if b >= 1_024 => format!("{:.1} KB", b as f64 / 1_024.0),
        b => format!("{b} B"),
    }
}
