use std::fs;

use color_eyre::eyre::Context;
use tracing::instrument;

use super::{AppContext, Process, ProcessOutput};
use crate::{
    cli::{ConfigInitProcess, ConfigPathProcess, ConfigSetProcess, ConfigShowProcess},
    errors::Result,
};

impl Process for ConfigInitProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        ctx.store.init(self.force)?;
        Ok(ProcessOutput::success().stdout(format!("Configuration written to {}", ctx.store.path().display())))
    }
}

impl Process for ConfigSetProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        ctx.store.set(&self.key, &self.value)?;
        Ok(ProcessOutput::success().stdout(format!("{} = {}", self.key, self.value)))
    }
}

impl Process for ConfigShowProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let path = ctx.store.path();
        let content = if path.exists() {
            fs::read_to_string(path).wrap_err_with(|| format!("Couldn't read config file {}", path.display()))?
        } else {
            // No file yet, show the defaults that apply
            toml::to_string_pretty(&ctx.config).wrap_err("Couldn't serialize configuration")?
        };
        Ok(ProcessOutput::success().stdout(format!("# {}\n{content}", path.display())))
    }
}

impl Process for ConfigPathProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        Ok(ProcessOutput::success().stdout(ctx.store.path().display().to_string()))
    }
}
