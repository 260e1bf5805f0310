use std::process::Command;

use color_eyre::eyre::Context;
use tracing::instrument;

use super::{AppContext, Process, ProcessOutput, spinner};
use crate::{
    ai::ProviderClient,
    cli::{ReviewFocus, ReviewProcess},
    context::ContextCollector,
    errors::Result,
};

impl Process for ReviewProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        let client = ProviderClient::from_config(&ctx.config)?;

        let (code, source) = if self.diff {
            match staged_diff()? {
                Some(diff) => (diff, String::from("staged changes")),
                None => {
                    return Ok(ProcessOutput::fail()
                        .stderr("No staged changes to review\nStage changes with: git add <files>"));
                }
            }
        } else {
            // Clap guarantees a path when --diff is not given
            let Some(path) = self.path else {
                return Ok(ProcessOutput::fail().stderr("Nothing to review, give a path or --diff"));
            };
            let collector = ContextCollector::new(&ctx.config.context);
            let bundle = if path.is_dir() {
                collector.collect(&path)?
            } else {
                collector.collect_files(std::slice::from_ref(&path))?
            };
            if bundle.is_empty() {
                return Ok(ProcessOutput::fail().stderr(format!("No reviewable code found at {}", path.display())));
            }
            (bundle.render(), path.display().to_string())
        };

        let prompt = format!("Please review the following code:\n\n{code}");

        let bar = spinner(format!("Reviewing {source}..."));
        let res = client.generate(Some(system_prompt(self.focus)), &prompt, None).await;
        bar.finish_and_clear();
        let res = res?;

        let mut output = ProcessOutput::success().stdout(res.text);
        if let (Some(input), Some(generated)) = (res.input_tokens, res.output_tokens) {
            output = output.stderr(format!("Tokens: {}", input + generated));
        }
        Ok(output)
    }
}

/// The staged git diff, or `None` when nothing is staged
fn staged_diff() -> Result<Option<String>> {
    let result = Command::new("git")
        .args(["diff", "--cached"])
        .output()
        .wrap_err("Couldn't run git, is it installed?")?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(color_eyre::eyre::eyre!("git diff failed: {}", stderr.trim()).into());
    }
    let diff = String::from_utf8_lossy(&result.stdout).trim().to_string();
    Ok((!diff.is_empty()).then_some(diff))
}

fn system_prompt(focus: ReviewFocus) -> &'static str {
    match focus {
        ReviewFocus::All => {
            "You are an expert code reviewer. Review the provided code comprehensively, looking at:
- Code quality and readability
- Potential bugs or errors
- Security issues
- Performance concerns
- Best practices and patterns

Provide constructive feedback with specific suggestions for improvement. Use markdown formatting."
        }
        ReviewFocus::Security => {
            "You are a security-focused code reviewer. Analyze the provided code for:
- Injection vulnerabilities (SQL, command, XSS)
- Authentication/authorization issues
- Data exposure risks
- Insecure dependencies
- Input validation problems
- Cryptography misuse

Provide specific security concerns with remediation suggestions."
        }
        ReviewFocus::Performance => {
            "You are a performance-focused code reviewer. Analyze the provided code for:
- Algorithmic complexity issues
- Memory inefficiencies
- Unnecessary computations
- Database query optimization
- Caching opportunities
- Resource management

Provide specific performance concerns with optimization suggestions."
        }
        ReviewFocus::Style => {
            "You are a code style reviewer. Analyze the provided code for:
- Naming conventions
- Code organization
- Documentation quality
- Consistency with common patterns
- Readability improvements
- Refactoring opportunities

Provide specific style suggestions to improve code quality."
        }
        ReviewFocus::Bugs => {
            "You are a bug-finding code reviewer. Analyze the provided code for:
- Logic errors
- Edge cases not handled
- Null/undefined issues
- Type mismatches
- Race conditions
- Error handling gaps

Provide specific bug risks with suggested fixes."
        }
    }
}
