use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use color_eyre::eyre::Context;

use crate::errors::{Result, UserFacingError};

/// The kinds of Python projects that can be scaffolded
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectKind {
    /// A Typer-based command-line tool
    Cli,
    /// A FastAPI REST service
    Api,
    /// A plain library package
    Library,
    /// A Flask web application
    Webapp,
}

/// The result of a scaffold run
#[derive(Debug)]
pub struct ScaffoldReport {
    /// Directory the project was created in
    pub project_dir: PathBuf,
    /// Relative paths of every file written, in template order
    pub files: Vec<String>,
    /// Suggested shell commands to get started
    pub next_steps: Vec<String>,
}

/// Creates a new project of the given kind under `output`.
///
/// The project name is normalized to a valid Python package name (hyphens
/// become underscores) for package paths and module references, while the
/// directory keeps the name as given. Refuses to touch an existing directory
/// unless `force` is set.
pub fn scaffold(kind: ProjectKind, name: &str, output: &Path, force: bool) -> Result<ScaffoldReport> {
    let package = name.replace('-', "_");
    let project_dir = output.join(name);
    if project_dir.exists() && !force {
        return Err(UserFacingError::ProjectExists(project_dir).into());
    }

    let mut files = Vec::new();
    for (path_template, content) in template(kind) {
        let relative = path_template.replace("{name}", &package);
        let file_path = project_dir.join(&relative);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Couldn't create directory {}", parent.display()))?;
        }
        let content = content.replace("{{name}}", &package);
        fs::write(&file_path, content)
            .wrap_err_with(|| format!("Couldn't write {}", file_path.display()))?;
        files.push(relative);
    }

    Ok(ScaffoldReport {
        project_dir,
        files,
        next_steps: next_steps(kind, name, &package),
    })
}

fn next_steps(kind: ProjectKind, name: &str, package: &str) -> Vec<String> {
    let mut steps = vec![
        format!("cd {name}"),
        String::from("python -m venv .venv && source .venv/bin/activate"),
        String::from("pip install -e \".[dev]\""),
    ];
    match kind {
        ProjectKind::Cli => steps.push(format!("{package} --help")),
        ProjectKind::Api => steps.push(format!("uvicorn {package}.main:app --reload")),
        ProjectKind::Webapp => steps.push(format!("flask --app {package}.app run --debug")),
        ProjectKind::Library => {}
    }
    steps
}

/// The file set for each project kind, as `(path, content)` pairs.
///
/// Paths may hold a `{name}` placeholder and contents a `{{name}}`
/// placeholder, both substituted with the normalized package name.
fn template(kind: ProjectKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ProjectKind::Cli => CLI_TEMPLATE,
        ProjectKind::Api => API_TEMPLATE,
        ProjectKind::Library => LIBRARY_TEMPLATE,
        ProjectKind::Webapp => WEBAPP_TEMPLATE,
    }
}

const PYTHON_GITIGNORE: &str = "__pycache__/\n*.py[cod]\n.venv/\ndist/\n*.egg-info/\n.pytest_cache/\n";

const CLI_TEMPLATE: &[(&str, &str)] = &[
    (
        "src/{name}/__init__.py",
        r##""""{{name}} - A command-line tool."""

__version__ = "0.1.0"
"##,
    ),
    (
        "src/{name}/__main__.py",
        r##""""Entry point for {{name}}."""

from {{name}}.cli import app


def main() -> None:
    app()


if __name__ == "__main__":
    main()
"##,
    ),
    (
        "src/{name}/cli.py",
        r##""""CLI definitions using Typer."""

import typer
from rich.console import Console

from {{name}} import __version__

app = typer.Typer(
    name="{{name}}",
    help="{{name}} - A command-line tool.",
    no_args_is_help=True,
)

console = Console()


@app.callback()
def main(
    version: bool = typer.Option(False, "--version", "-v", help="Show version"),
) -> None:
    """{{name}} CLI."""
    if version:
        console.print(f"{{name}} version {__version__}")
        raise typer.Exit()


@app.command()
def hello(name: str = typer.Argument("World", help="Name to greet")) -> None:
    """Say hello."""
    console.print(f"Hello, {name}!")
"##,
    ),
    (
        "pyproject.toml",
        r##"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "{{name}}"
version = "0.1.0"
description = "A command-line tool"
readme = "README.md"
requires-python = ">=3.11"
dependencies = [
    "typer[all]>=0.9.0",
    "rich>=13.0.0",
]

[project.scripts]
{{name}} = "{{name}}.__main__:main"

[tool.hatch.build.targets.wheel]
packages = ["src/{{name}}"]
"##,
    ),
    (
        "README.md",
        r##"# {{name}}

A command-line tool.

## Installation

```bash
pip install -e .
```

## Usage

```bash
{{name}} --help
{{name}} hello World
```
"##,
    ),
    ("tests/__init__.py", ""),
    (
        "tests/test_cli.py",
        r##""""Tests for CLI."""

from typer.testing import CliRunner
from {{name}}.cli import app


runner = CliRunner()


def test_hello():
    result = runner.invoke(app, ["hello", "Test"])
    assert result.exit_code == 0
    assert "Hello, Test!" in result.stdout
"##,
    ),
    (".gitignore", PYTHON_GITIGNORE),
];

const API_TEMPLATE: &[(&str, &str)] = &[
    (
        "src/{name}/__init__.py",
        r##""""{{name}} - A REST API."""

__version__ = "0.1.0"
"##,
    ),
    (
        "src/{name}/main.py",
        r##""""Main FastAPI application."""

from fastapi import FastAPI
from {{name}}.routes import router

app = FastAPI(
    title="{{name}}",
    version="0.1.0",
)

app.include_router(router)


@app.get("/health")
def health_check():
    return {"status": "healthy"}
"##,
    ),
    (
        "src/{name}/routes.py",
        r##""""API routes."""

from fastapi import APIRouter

router = APIRouter(prefix="/api/v1")


@router.get("/items")
def list_items():
    return {"items": []}


@router.get("/items/{item_id}")
def get_item(item_id: int):
    return {"id": item_id, "name": f"Item {item_id}"}
"##,
    ),
    (
        "pyproject.toml",
        r##"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "{{name}}"
version = "0.1.0"
description = "A REST API"
readme = "README.md"
requires-python = ">=3.11"
dependencies = [
    "fastapi>=0.109.0",
    "uvicorn[standard]>=0.27.0",
]

[project.optional-dependencies]
dev = [
    "pytest>=8.0.0",
    "httpx>=0.27.0",
]

[tool.hatch.build.targets.wheel]
packages = ["src/{{name}}"]
"##,
    ),
    (
        "README.md",
        r##"# {{name}}

A REST API built with FastAPI.

## Installation

```bash
pip install -e ".[dev]"
```

## Running

```bash
uvicorn {{name}}.main:app --reload
```

## API Docs

Once running, visit:
- http://localhost:8000/docs (Swagger UI)
- http://localhost:8000/redoc (ReDoc)
"##,
    ),
    ("tests/__init__.py", ""),
    (
        "tests/test_api.py",
        r##""""Tests for API."""

from fastapi.testclient import TestClient
from {{name}}.main import app


client = TestClient(app)


def test_health():
    response = client.get("/health")
    assert response.status_code == 200
    assert response.json() == {"status": "healthy"}


def test_list_items():
    response = client.get("/api/v1/items")
    assert response.status_code == 200
"##,
    ),
    (".gitignore", PYTHON_GITIGNORE),
];

const LIBRARY_TEMPLATE: &[(&str, &str)] = &[
    (
        "src/{name}/__init__.py",
        r##""""{{name}} - A Python library."""

__version__ = "0.1.0"

from {{name}}.core import example_function

__all__ = ["example_function"]
"##,
    ),
    (
        "src/{name}/core.py",
        r##""""Core functionality."""


def example_function(value: str) -> str:
    """An example function.

    Args:
        value: Input value.

    Returns:
        Processed value.
    """
    return f"processed: {value}"
"##,
    ),
    (
        "pyproject.toml",
        r##"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "{{name}}"
version = "0.1.0"
description = "A Python library"
readme = "README.md"
requires-python = ">=3.11"
dependencies = []

[project.optional-dependencies]
dev = [
    "pytest>=8.0.0",
    "pytest-cov>=4.0.0",
]

[tool.hatch.build.targets.wheel]
packages = ["src/{{name}}"]
"##,
    ),
    (
        "README.md",
        r##"# {{name}}

A Python library.

## Installation

```bash
pip install {{name}}
```

## Usage

```python
from {{name}} import example_function

result = example_function("hello")
print(result)  # "processed: hello"
```
"##,
    ),
    ("tests/__init__.py", ""),
    (
        "tests/test_core.py",
        r##""""Tests for core functionality."""

from {{name}} import example_function


def test_example_function():
    result = example_function("test")
    assert result == "processed: test"
"##,
    ),
    (".gitignore", PYTHON_GITIGNORE),
];

const WEBAPP_TEMPLATE: &[(&str, &str)] = &[
    (
        "src/{name}/__init__.py",
        r##""""{{name}} - A web application."""

__version__ = "0.1.0"
"##,
    ),
    (
        "src/{name}/app.py",
        r##""""Flask web application."""

from flask import Flask, render_template

app = Flask(__name__)


@app.route("/")
def index():
    return render_template("index.html", title="{{name}}")


@app.route("/health")
def health():
    return {"status": "healthy"}


if __name__ == "__main__":
    app.run(debug=True)
"##,
    ),
    (
        "src/{name}/templates/index.html",
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }}</title>
    <link rel="stylesheet" href="{{ url_for('static', filename='style.css') }}">
</head>
<body>
    <main>
        <h1>Welcome to {{ title }}</h1>
        <p>Your web application is running!</p>
    </main>
</body>
</html>
"##,
    ),
    (
        "src/{name}/static/style.css",
        r##"* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: system-ui, -apple-system, sans-serif;
    line-height: 1.6;
    color: #333;
    background: #f5f5f5;
}

main {
    max-width: 800px;
    margin: 2rem auto;
    padding: 2rem;
    background: white;
    border-radius: 8px;
    box-shadow: 0 2px 4px rgba(0,0,0,0.1);
}

h1 {
    margin-bottom: 1rem;
    color: #2563eb;
}
"##,
    ),
    (
        "pyproject.toml",
        r##"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

[project]
name = "{{name}}"
version = "0.1.0"
description = "A web application"
readme = "README.md"
requires-python = ">=3.11"
dependencies = [
    "flask>=3.0.0",
]

[project.optional-dependencies]
dev = [
    "pytest>=8.0.0",
]

[tool.hatch.build.targets.wheel]
packages = ["src/{{name}}"]
"##,
    ),
    (
        "README.md",
        r##"# {{name}}

A web application built with Flask.

## Installation

```bash
pip install -e ".[dev]"
```

## Running

```bash
flask --app {{name}}.app run --debug
```

Then visit http://localhost:5000
"##,
    ),
    ("tests/__init__.py", ""),
    (
        ".gitignore",
        "__pycache__/\n*.py[cod]\n.venv/\ndist/\n*.egg-info/\n.pytest_cache/\ninstance/\n",
    ),
];
