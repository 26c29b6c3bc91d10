//! Rule file loading.
//!
//! Rules are declared in TOML as an ordered array of tables. Each entry
//! carries a regex `pattern` and exactly one resolver field:
//!
//! ```toml
//! [[rules]]
//! pattern = '\.pdf$'
//! dest = 'documents/'
//!
//! [[rules]]
//! pattern = '(^|/)\.git/$'
//! action = 'skip-recurse'
//!
//! [[rules]]
//! pattern = '\.'
//! handler = 'extension-dir'
//! ```
//!
//! A `dest` ending in `/` places the matched item inside that directory
//! under its own name; without the slash the item is renamed to exactly
//! that path. `{0}`, `{1}`, ... and `{name}` placeholders are substituted
//! from the regex match. When no rule file is given, a built-in default
//! table modeled on common extension groups is used.

use crate::rules::{Action, Resolver, Rule, RuleError, RuleSet, lookup_handler};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A rule file as deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// One declarative rule record.
///
/// Exactly one of `dest`, `action` and `handler` must be set; anything
/// else is a fatal configuration error.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    pub pattern: String,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub handler: Option<String>,
}

impl RuleFile {
    /// Loads a rule file from disk.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        if !path.exists() {
            return Err(RuleError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| RuleError::IoError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| RuleError::FileInvalid(e.to_string()))
    }

    /// Compiles the declared entries into an ordered [`RuleSet`].
    ///
    /// Declaration order is preserved; the classifier applies the first
    /// matching rule.
    pub fn compile(self) -> Result<RuleSet, RuleError> {
        let rules = self
            .rules
            .into_iter()
            .map(compile_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet::new(rules))
    }
}

fn compile_entry(entry: RuleEntry) -> Result<Rule, RuleError> {
    let pattern = Regex::new(&entry.pattern).map_err(|e| RuleError::InvalidPattern {
        pattern: entry.pattern.clone(),
        reason: e.to_string(),
    })?;

    let resolver = match (entry.dest, entry.action, entry.handler) {
        (Some(dest), None, None) => Resolver::Template(dest),
        (None, Some(action), None) => match action.as_str() {
            "skip" => Resolver::Constant(Action::Skip),
            "skip-recurse" => Resolver::Constant(Action::SkipRecurse),
            _ => {
                return Err(RuleError::UnknownAction {
                    pattern: entry.pattern,
                    action,
                });
            }
        },
        (None, None, Some(handler)) => match lookup_handler(&handler) {
            Some(func) => Resolver::Handler {
                name: handler,
                func,
            },
            None => {
                return Err(RuleError::UnknownHandler {
                    pattern: entry.pattern,
                    handler,
                });
            }
        },
        _ => {
            return Err(RuleError::MalformedRule {
                pattern: entry.pattern,
            });
        }
    };

    Ok(Rule { pattern, resolver })
}

/// The built-in rule table used when no rule file is supplied.
///
/// Common extension groups first, then fallbacks: version-control
/// directories are never descended into, files with an unrecognized
/// extension go to `other/<ext>_files/`, extensionless files to
/// `other/`, and unmatched directories to `directories/`.
pub fn default_rules() -> RuleSet {
    let entries = [
        (
            r"(^|/)\.(git|hg|svn)/$",
            RawResolver::Action(Action::SkipRecurse),
        ),
        (
            r"\.(pdf|docx?|odt|rtf|txt|md|epub)$",
            RawResolver::Dest("documents/"),
        ),
        (
            r"\.(png|jpe?g|gif|bmp|svg|webp|tiff?)$",
            RawResolver::Dest("images/"),
        ),
        (r"\.(mp3|flac|ogg|wav|m4a|aac)$", RawResolver::Dest("music/")),
        (r"\.(mp4|mkv|avi|mov|webm|wmv)$", RawResolver::Dest("videos/")),
        (
            r"\.(zip|rar|7z|tar|gz|bz2|xz)$",
            RawResolver::Dest("archives/"),
        ),
        (
            r"\.(rs|py|c|cpp|h|java|js|ts|sh|rb|go)$",
            RawResolver::Dest("code/"),
        ),
        (
            r"\.(?P<ext>[^./]+)$",
            RawResolver::Dest("other/{ext}_files/"),
        ),
        (r"(^|/)[^./]+$", RawResolver::Dest("other/")),
        (r"/$", RawResolver::Dest("directories/")),
    ];

    let rules = entries
        .into_iter()
        .map(|(pattern, raw)| Rule {
            pattern: Regex::new(pattern).expect("built-in rule pattern must compile"),
            resolver: match raw {
                RawResolver::Dest(d) => Resolver::Template(d.to_string()),
                RawResolver::Action(a) => Resolver::Constant(a),
            },
        })
        .collect();
    RuleSet::new(rules)
}

enum RawResolver {
    Dest(&'static str),
    Action(Action),
}
