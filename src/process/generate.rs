use std::{fs, path::Path};

use color_eyre::eyre::Context;
use tracing::instrument;

use super::{AppContext, Process, ProcessOutput, spinner};
use crate::{ai::ProviderClient, cli::GenerateProcess, context::ContextCollector, errors::Result, jira::JiraClient};

const GENERATE_SYSTEM_PROMPT: &str = "You are an expert programmer assistant. Generate clean, well-documented code \
                                      based on the user's request.

Guidelines:
- Write idiomatic, production-quality code
- Include type hints (for Python) or appropriate type annotations
- Add brief comments for complex logic
- Follow best practices for the language
- If generating a complete file, include necessary imports

If context is provided, use it to understand the existing codebase style and patterns.

Respond with just the code unless the user asks for explanations. Use markdown code blocks with the appropriate \
                                      language tag.";

impl Process for GenerateProcess {
    #[instrument(skip_all)]
    async fn execute(self, ctx: &AppContext) -> Result<ProcessOutput> {
        // Resolve the provider before any collection or network activity
        let client = ProviderClient::from_config(&ctx.config)?;

        let mut prompt = self.prompt;
        if let Some(language) = &self.language {
            prompt = format!("Generate {language} code: {prompt}");
        }

        let mut notes = Vec::new();
        let mut parts = Vec::new();

        // Jira context is best-effort, a failure never aborts the generation
        if let Some(key) = &self.jira {
            match issue_context(ctx, key).await {
                Ok(context) => {
                    parts.push(context);
                    notes.push(format!("Using Jira context: {key}"));
                }
                Err(err) => {
                    tracing::warn!("Couldn't fetch Jira issue {key}: {err}");
                    notes.push(format!("Couldn't fetch Jira issue {key}: {err}"));
                }
            }
        }

        let collector = ContextCollector::new(&ctx.config.context);
        if !self.context.is_empty() {
            let mut files = Vec::new();
            for path in &self.context {
                if path.is_dir() {
                    let bundle = collector.collect(path)?;
                    if !bundle.is_empty() {
                        parts.push(bundle.render());
                    }
                } else {
                    files.push(path.clone());
                }
            }
            if !files.is_empty() {
                parts.push(collector.collect_files(&files)?.render());
            }
            notes.push(format!("Using context from {} path(s)", self.context.len()));
        } else if !self.no_context
            && let Some(summary) = collector.collect_summary(Path::new("."))?
        {
            parts.push(summary);
            notes.push(String::from("Using project context"));
        }
        let context = (!parts.is_empty()).then(|| parts.join("\n\n"));

        let bar = spinner(format!("Generating code with {}...", client.provider_name()));
        let res = client.generate(Some(GENERATE_SYSTEM_PROMPT), &prompt, context.as_deref()).await;
        bar.finish_and_clear();
        let res = res?;

        if let (Some(input), Some(output)) = (res.input_tokens, res.output_tokens) {
            notes.push(format!("Tokens: {}", input + output));
        }

        if let Some(path) = &self.output {
            let code = extract_code(&res.text);
            fs::write(path, code).wrap_err_with(|| format!("Couldn't write {}", path.display()))?;
            notes.push(format!("Written to {}", path.display()));
        }

        let mut output = ProcessOutput::success().stdout(res.text);
        if !notes.is_empty() {
            output = output.stderr(notes.join("\n"));
        }
        Ok(output)
    }
}

async fn issue_context(ctx: &AppContext, key: &str) -> Result<String> {
    let jira = JiraClient::from_config(&ctx.config)?;
    Ok(jira.get_issue(key).await?.to_context())
}

/// Extracts the content of fenced code blocks, or the whole text when there
/// are none
fn extract_code(content: &str) -> String {
    let mut code_lines = Vec::new();
    let mut in_code_block = false;
    for line in content.lines() {
        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            code_lines.push(line);
        }
    }
    if code_lines.is_empty() {
        content.to_string()
    } else {
        code_lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extract_code_from_fences() {
        let content = "Here you go:\n```rust\nfn main() {}\n```\nEnjoy!";
        assert_eq!(extract_code(content), "fn main() {}");
    }

    #[test]
    fn test_extract_code_multiple_blocks() {
        let content = "```python\na = 1\n```\ntext\n```python\nb = 2\n```";
        assert_eq!(extract_code(content), "a = 1\nb = 2");
    }

    #[test]
    fn test_extract_code_without_fences() {
        let content = "just plain code";
        assert_eq!(extract_code(content), content);
    }
}
