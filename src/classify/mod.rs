//! Category labels for the breakdown ledgers. Framework detection is a collaborator behind
//! [ProjectClassifier]; language ids coming from the host are mapped to display labels here.

use std::{collections::BTreeMap, path::Path};

use crate::ledger::UNKNOWN_CATEGORY;

/// Detects the frameworks of a project. Called once per workspace folder set change, never
/// per tick.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectClassifier {
    /// Framework labels for the project rooted at `root`. An empty result means nothing was
    /// detected.
    fn classify(&self, root: &Path) -> Vec<String>;
}

/// Frameworks declared per workspace folder name in the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfiguredClassifier {
    frameworks: BTreeMap<String, Vec<String>>,
}

impl ConfiguredClassifier {
    pub fn new(frameworks: BTreeMap<String, Vec<String>>) -> Self {
        Self { frameworks }
    }
}

impl ProjectClassifier for ConfiguredClassifier {
    fn classify(&self, root: &Path) -> Vec<String> {
        root.file_name()
            .and_then(|name| self.frameworks.get(name.to_string_lossy().as_ref()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Maps a host language id such as `typescriptreact` to the label stored in the ledger.
pub fn normalize_language_label(language_id: &str) -> String {
    let label = match language_id.to_lowercase().as_str() {
        "typescript" | "typescriptreact" => "TypeScript",
        "javascript" | "javascriptreact" => "JavaScript",
        "python" => "Python",
        "go" => "Go",
        "rust" => "Rust",
        "c" => "C",
        "cpp" => "C++",
        "csharp" => "C#",
        "java" => "Java",
        "php" => "PHP",
        "ruby" => "Ruby",
        "swift" => "Swift",
        "kotlin" => "Kotlin",
        "dart" => "Dart",
        "shellscript" | "shell" | "bash" | "zsh" => "Shell",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "html" => "HTML",
        "css" => "CSS",
        "scss" => "SCSS",
        "less" => "LESS",
        "markdown" | "md" => "Markdown",
        "sql" => "SQL",
        "dockerfile" => "Dockerfile",
        "" => UNKNOWN_CATEGORY,
        _ => return title_case_words(language_id),
    };
    label.to_owned()
}

/// Uppercases the first character of every word. Word characters are alphanumerics and `_`.
fn title_case_words(value: &str) -> String {
    let mut previous_is_word = false;
    value
        .chars()
        .map(|c| {
            let is_word = c.is_alphanumeric() || c == '_';
            let mapped = if is_word && !previous_is_word {
                c.to_ascii_uppercase()
            } else {
                c
            };
            previous_is_word = is_word;
            mapped
        })
        .collect()
}
