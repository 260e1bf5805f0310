use tracing::instrument;

use super::{AppContext, Process, ProcessOutput};
use crate::{cli::ScaffoldProcess, errors::Result, scaffold};

impl Process for ScaffoldProcess {
    #[instrument(skip_all)]
    async fn execute(self, _ctx: &AppContext) -> Result<ProcessOutput> {
        let report = scaffold::scaffold(self.kind, &self.name, &self.output, self.force)?;

        let mut lines = vec![format!("Created project: {}", report.project_dir.display()), String::new()];
        for file in &report.files {
            lines.push(format!("  {file}"));
        }
        lines.push(String::new());
        lines.push(String::from("Next steps:"));
        for step in &report.next_steps {
            lines.push(format!("  {step}"));
        }

        Ok(ProcessOutput::success().stdout(lines.join("\n")))
    }
}
