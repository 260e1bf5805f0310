use std::path::Path;

/// Extensions that are skipped during collection, they carry no textual signal
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz",
    "rar", "7z", "exe", "dll", "so", "dylib", "pyc", "pyo", "class", "o", "a", "rlib", "woff", "woff2", "ttf",
    "eot", "mp3", "mp4", "wav", "avi", "mov", "db", "sqlite", "sqlite3",
];

/// Whether a file is likely binary, judged by its extension
pub fn is_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// The fenced-code-block language tag for a file, judged by its extension
pub fn language_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return "text";
    };
    match ext.to_ascii_lowercase().as_str() {
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "java" => "java",
        "kt" => "kotlin",
        "go" => "go",
        "rs" => "rust",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" | "bash" | "zsh" => "bash",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "sql" => "sql",
        "md" => "markdown",
        _ => "text",
    }
}
