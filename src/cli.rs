use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::scaffold::ProjectKind;

/// AI-assisted development workflows from the command line
///
/// Forwards prompts to an LLM provider together with context gathered from
/// the project, reviews code, scaffolds new projects and talks to Jira.
#[derive(Parser)]
#[cfg_attr(debug_assertions, derive(Debug))]
#[command(author, version, infer_subcommands = true, subcommand_required = true)]
pub struct Cli {
    /// Path of an alternative configuration file
    #[arg(long, global = true, hide = true)]
    pub config: Option<PathBuf>,

    /// Command to be executed
    #[command(subcommand)]
    pub process: CliProcess,
}

#[derive(Subcommand)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum CliProcess {
    /// Generates code from a natural language prompt
    Generate(GenerateProcess),

    /// Gets AI feedback on code
    Review(ReviewProcess),

    /// Creates a new project skeleton
    Scaffold(ScaffoldProcess),

    /// Inspects and tunes project context collection
    #[command(subcommand)]
    Context(ContextProcess),

    /// Works with Jira issues
    #[command(subcommand)]
    Jira(JiraProcess),

    /// Manages the configuration file
    #[command(subcommand)]
    Config(ConfigProcess),
}

/// Generates code from a natural language prompt
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct GenerateProcess {
    /// What code to generate
    pub prompt: String,

    /// Target programming language
    #[arg(short = 'l', long)]
    pub language: Option<String>,

    /// Write the generated code to a file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// File or directory to use as context (can be given multiple times)
    #[arg(short = 'c', long = "context")]
    pub context: Vec<PathBuf>,

    /// Jira issue key to use as context
    #[arg(short = 'j', long = "jira")]
    pub jira: Option<String>,

    /// Disable automatic project context collection
    #[arg(long, conflicts_with = "context")]
    pub no_context: bool,
}

/// Gets AI feedback on code
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ReviewProcess {
    /// File or directory to review
    #[arg(required_unless_present = "diff")]
    pub path: Option<PathBuf>,

    /// Focus area for the review
    #[arg(short = 'f', long, value_enum, default_value_t = ReviewFocus::All)]
    pub focus: ReviewFocus,

    /// Review staged git changes only
    #[arg(short = 'd', long)]
    pub diff: bool,
}

#[derive(ValueEnum, Copy, Clone, PartialEq, Eq, Debug)]
pub enum ReviewFocus {
    All,
    Security,
    Performance,
    Style,
    Bugs,
}

/// Creates a new project skeleton
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ScaffoldProcess {
    /// Kind of project to scaffold
    #[arg(value_enum)]
    pub kind: ProjectKind,

    /// Project name
    pub name: String,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    pub output: PathBuf,

    /// Overwrite existing files
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(Subcommand)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ContextProcess {
    /// Shows what context would be collected from a directory
    Show(ContextShowProcess),
    /// Previews the rendered context blob
    Preview(ContextPreviewProcess),
    /// Adds a pattern to the persisted ignore list
    Ignore(ContextIgnoreProcess),
}

/// Shows what context would be collected from a directory
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ContextShowProcess {
    /// Directory to inspect
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// List every file instead of the per-extension summary
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Previews the rendered context blob
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ContextPreviewProcess {
    /// Directory to collect from
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Number of files to preview
    #[arg(short = 'n', long, default_value_t = 5)]
    pub files: usize,
}

/// Adds a pattern to the persisted ignore list
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ContextIgnoreProcess {
    /// Gitignore-style pattern to exclude from collection
    pub pattern: String,
}

#[derive(Subcommand)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum JiraProcess {
    /// Shows the details of an issue
    View(JiraViewProcess),
    /// Lists open issues assigned to you
    Mine(JiraMineProcess),
    /// Lists issues of a project
    List(JiraListProcess),
    /// Creates a new issue
    Create(JiraCreateProcess),
    /// Adds a comment to an issue
    Comment(JiraCommentProcess),
    /// Moves an issue through its workflow
    Transition(JiraTransitionProcess),
    /// Lists the projects you can see
    Projects(JiraProjectsProcess),
    /// Starts working on an issue
    Work(JiraWorkProcess),
}

/// Shows the details of an issue
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraViewProcess {
    /// Issue key, e.g. PROJ-123
    pub key: String,
}

/// Lists open issues assigned to you
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraMineProcess {
    /// Maximum number of issues to list
    #[arg(short = 'n', long, default_value_t = crate::jira::DEFAULT_SEARCH_LIMIT)]
    pub limit: u32,
}

/// Lists issues of a project
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraListProcess {
    /// Project key, defaults to jira.default_project
    pub project: Option<String>,

    /// Only issues in this status
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Maximum number of issues to list
    #[arg(short = 'n', long, default_value_t = crate::jira::DEFAULT_SEARCH_LIMIT)]
    pub limit: u32,
}

/// Creates a new issue
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraCreateProcess {
    /// Issue summary
    pub summary: String,

    /// Project key, defaults to jira.default_project
    #[arg(short = 'p', long)]
    pub project: Option<String>,

    /// Issue description
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Issue type name
    #[arg(short = 't', long, default_value = "Task")]
    pub issue_type: String,
}

/// Adds a comment to an issue
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraCommentProcess {
    /// Issue key, e.g. PROJ-123
    pub key: String,

    /// Comment body
    pub body: String,
}

/// Moves an issue through its workflow
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraTransitionProcess {
    /// Issue key, e.g. PROJ-123
    pub key: String,

    /// Name of the target status, matched case-insensitively
    pub status: String,
}

/// Lists the projects you can see
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraProjectsProcess {}

/// Starts working on an issue
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct JiraWorkProcess {
    /// Issue key, e.g. PROJ-123
    pub key: String,

    /// Draft an implementation plan through the provider
    #[arg(long)]
    pub plan: bool,

    /// Transition the issue to "In Progress"
    #[arg(long)]
    pub start: bool,
}

#[derive(Subcommand)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub enum ConfigProcess {
    /// Writes a fresh default configuration file
    Init(ConfigInitProcess),
    /// Sets a configuration value by dotted key
    Set(ConfigSetProcess),
    /// Shows the effective configuration
    Show(ConfigShowProcess),
    /// Prints the configuration file path
    Path(ConfigPathProcess),
}

/// Writes a fresh default configuration file
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ConfigInitProcess {
    /// Overwrite an existing configuration file
    #[arg(short = 'f', long)]
    pub force: bool,
}

/// Sets a configuration value by dotted key
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ConfigSetProcess {
    /// Dotted key, e.g. default.provider
    pub key: String,

    /// The value to set
    pub value: String,
}

/// Shows the effective configuration
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ConfigShowProcess {}

/// Prints the configuration file path
#[derive(Args)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct ConfigPathProcess {}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_review_requires_path_or_diff() {
        assert!(Cli::try_parse_from(["flow", "review"]).is_err());
        assert!(Cli::try_parse_from(["flow", "review", "--diff"]).is_ok());
        assert!(Cli::try_parse_from(["flow", "review", "src/"]).is_ok());
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::try_parse_from([
            "flow", "generate", "a csv parser", "-l", "rust", "-c", "a.rs", "-c", "b.rs", "--jira", "PROJ-1",
        ])
        .unwrap();
        let CliProcess::Generate(p) = cli.process else {
            panic!("expected generate");
        };
        assert_eq!(p.language.as_deref(), Some("rust"));
        assert_eq!(p.context.len(), 2);
        assert_eq!(p.jira.as_deref(), Some("PROJ-1"));
    }
}
