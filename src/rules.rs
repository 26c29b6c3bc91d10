//! Ordered classification rules.
//!
//! A [`RuleSet`] holds an ordered list of (pattern, resolver) pairs and
//! resolves a [`PathEntity`] to a destination or a control signal. Order
//! is total: the first rule whose pattern matches wins, regardless of how
//! specific later rules are.
//!
//! Resolvers come in three shapes:
//! - a destination template with positional (`{0}`, `{1}`, ...) and named
//!   (`{group}`) placeholders bound to the regex match,
//! - a constant control action ([`Action::Skip`] / [`Action::SkipRecurse`]),
//! - a named handler function registered in this module, which receives
//!   the match and the entity and decides for itself.

use crate::paths::PathEntity;
use regex::{Captures, Regex};
use std::path::PathBuf;

/// Errors in rule configuration.
///
/// These are fatal: a broken rule file or a template referencing a
/// capture group that does not exist must abort the run before any file
/// is moved, rather than being swallowed as an unhandled path.
#[derive(Debug)]
pub enum RuleError {
    /// Rule file not found at the specified path.
    FileNotFound(PathBuf),
    /// Invalid TOML syntax or structure in the rule file.
    FileInvalid(String),
    /// IO error while reading the rule file.
    IoError(String),
    /// A rule pattern failed to compile.
    InvalidPattern { pattern: String, reason: String },
    /// A rule did not specify exactly one of dest, action or handler.
    MalformedRule { pattern: String },
    /// A rule named an unknown control action.
    UnknownAction { pattern: String, action: String },
    /// A rule named a handler that is not registered.
    UnknownHandler { pattern: String, handler: String },
    /// A destination template referenced a positional group out of range.
    PlaceholderOutOfRange { template: String, index: usize },
    /// A destination template referenced an unknown named group.
    UnknownPlaceholder { template: String, name: String },
    /// A destination template had unbalanced braces.
    UnbalancedTemplate { template: String },
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(path) => {
                write!(f, "Rule file not found: {}", path.display())
            }
            Self::FileInvalid(msg) => write!(f, "Invalid rule file: {}", msg),
            Self::IoError(msg) => write!(f, "IO error reading rule file: {}", msg),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid pattern '{}': {}", pattern, reason)
            }
            Self::MalformedRule { pattern } => {
                write!(
                    f,
                    "Rule '{}' must specify exactly one of dest, action or handler",
                    pattern
                )
            }
            Self::UnknownAction { pattern, action } => {
                write!(
                    f,
                    "Rule '{}' names unknown action '{}' (expected 'skip' or 'skip-recurse')",
                    pattern, action
                )
            }
            Self::UnknownHandler { pattern, handler } => {
                write!(f, "Rule '{}' names unknown handler '{}'", pattern, handler)
            }
            Self::PlaceholderOutOfRange { template, index } => {
                write!(
                    f,
                    "Destination template placeholder {{{}}} out of range: {}",
                    index, template
                )
            }
            Self::UnknownPlaceholder { template, name } => {
                write!(
                    f,
                    "Destination template placeholder {{{}}} unknown: {}",
                    name, template
                )
            }
            Self::UnbalancedTemplate { template } => {
                write!(f, "Destination template has unbalanced braces: {}", template)
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// Constant control actions a rule may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the item in place and continue.
    Skip,
    /// Do not descend into this directory on the current pass. The
    /// directory itself may still be relocated by another rule.
    SkipRecurse,
}

/// What a handler function resolved a matched entity to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A raw destination string; trailing `/` means "into this directory".
    Dest(String),
    /// A constant control action.
    Act(Action),
    /// The handler declined this entity.
    Unhandled,
}

/// A registered handler: receives the regex captures and the entity.
pub type HandlerFn = fn(&Captures<'_>, &PathEntity) -> Resolution;

/// Looks up a handler function by its registered name.
///
/// Handlers are named, statically registered functions rather than
/// arbitrary injected code, so rule files stay declarative.
pub fn lookup_handler(name: &str) -> Option<HandlerFn> {
    match name {
        "extension-dir" => Some(extension_dir),
        "directories" => Some(directories),
        _ => None,
    }
}

/// Files a regular file into a folder named after its lowercased
/// extension; declines directories and extensionless files.
fn extension_dir(_caps: &Captures<'_>, entity: &PathEntity) -> Resolution {
    if entity.is_directory {
        return Resolution::Unhandled;
    }
    match &entity.extension {
        Some(ext) => Resolution::Dest(format!("{}/", ext.to_lowercase())),
        None => Resolution::Unhandled,
    }
}

/// Moves directory entities into a `directories/` folder; declines files.
fn directories(_caps: &Captures<'_>, entity: &PathEntity) -> Resolution {
    if entity.is_directory {
        Resolution::Dest("directories/".to_string())
    } else {
        Resolution::Unhandled
    }
}

/// How a matched rule resolves its entity.
pub enum Resolver {
    /// Destination template with `{0}`/`{name}` placeholders.
    Template(String),
    /// Constant control action.
    Constant(Action),
    /// Named, registered handler function.
    Handler { name: String, func: HandlerFn },
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template(t) => f.debug_tuple("Template").field(t).finish(),
            Self::Constant(a) => f.debug_tuple("Constant").field(a).finish(),
            Self::Handler { name, .. } => f.debug_tuple("Handler").field(name).finish(),
        }
    }
}

/// One classification rule.
#[derive(Debug)]
pub struct Rule {
    pub pattern: Regex,
    pub resolver: Resolver,
}

/// A resolved destination for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Target is a directory; the item keeps its original name.
    Into(String),
    /// The item is placed at exactly this path, original name discarded.
    RenameTo(String),
}

impl Destination {
    /// Tags a raw destination string by its trailing slash.
    pub fn from_raw(raw: String) -> Self {
        if raw.ends_with('/') {
            Destination::Into(raw)
        } else {
            Destination::RenameTo(raw)
        }
    }

    /// The raw destination string.
    pub fn raw(&self) -> &str {
        match self {
            Destination::Into(s) | Destination::RenameTo(s) => s,
        }
    }
}

/// Outcome of classifying one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Relocate the entity to this destination.
    Move(Destination),
    /// Leave the entity in place.
    Skip,
    /// Suppress descent into this directory for the current pass.
    SkipRecurse,
    /// No applicable rule.
    Unhandled,
}

/// An ordered, immutable sequence of rules. First match wins.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolves an entity to a destination or control signal.
    ///
    /// Patterns are tested against the full canonical relative path, not
    /// just the basename, so rules may anchor on ancestor directory
    /// names. Template substitution failures propagate as [`RuleError`]
    /// rather than being reported as unhandled.
    pub fn classify(&self, entity: &PathEntity) -> Result<Classification, RuleError> {
        for rule in &self.rules {
            let Some(caps) = rule.pattern.captures(&entity.relative_path) else {
                continue;
            };
            return match &rule.resolver {
                Resolver::Constant(Action::Skip) => Ok(Classification::Skip),
                Resolver::Constant(Action::SkipRecurse) => Ok(Classification::SkipRecurse),
                Resolver::Template(template) => {
                    let dst = substitute(template, &rule.pattern, &caps)?;
                    Ok(Classification::Move(Destination::from_raw(dst)))
                }
                Resolver::Handler { func, .. } => Ok(match func(&caps, entity) {
                    Resolution::Dest(dst) => Classification::Move(Destination::from_raw(dst)),
                    Resolution::Act(Action::Skip) => Classification::Skip,
                    Resolution::Act(Action::SkipRecurse) => Classification::SkipRecurse,
                    Resolution::Unhandled => Classification::Unhandled,
                }),
            };
        }
        Ok(Classification::Unhandled)
    }
}

/// Substitutes `{0}`/`{1}`/`{name}` placeholders in a destination
/// template with the corresponding capture groups.
///
/// Group 0 is the whole match. A placeholder referencing a group that
/// does not exist in the pattern is a fatal configuration error; a group
/// that exists but did not participate in this match substitutes as the
/// empty string. `{{` and `}}` escape literal braces.
fn substitute(template: &str, pattern: &Regex, caps: &Captures<'_>) -> Result<String, RuleError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let rest = &template[idx + 1..];
                let Some(end) = rest.find('}') else {
                    return Err(RuleError::UnbalancedTemplate {
                        template: template.to_string(),
                    });
                };
                let key = &rest[..end];
                // consume up to and including the closing brace
                while let Some((i, _)) = chars.next() {
                    if i == idx + 1 + end {
                        break;
                    }
                }
                if let Ok(index) = key.parse::<usize>() {
                    if index >= caps.len() {
                        return Err(RuleError::PlaceholderOutOfRange {
                            template: template.to_string(),
                            index,
                        });
                    }
                    out.push_str(caps.get(index).map_or("", |m| m.as_str()));
                } else {
                    let declared = pattern.capture_names().flatten().any(|n| n == key);
                    if !declared {
                        return Err(RuleError::UnknownPlaceholder {
                            template: template.to_string(),
                            name: key.to_string(),
                        });
                    }
                    out.push_str(caps.name(key).map_or("", |m| m.as_str()));
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(RuleError::UnbalancedTemplate {
                        template: template.to_string(),
                    });
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, resolver: Resolver) -> Rule {
        Rule {
            pattern: Regex::new(pattern).expect("bad test pattern"),
            resolver,
        }
    }

    fn classify(rules: Vec<Rule>, path: &str) -> Result<Classification, RuleError> {
        RuleSet::new(rules).classify(&PathEntity::new(path))
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            rule(r"\.pdf$", Resolver::Template("first/".into())),
            rule(r"story\.pdf$", Resolver::Template("second/".into())),
        ];
        let got = classify(rules, "story.pdf").unwrap();
        assert_eq!(
            got,
            Classification::Move(Destination::Into("first/".into()))
        );
    }

    #[test]
    fn test_no_match_is_unhandled() {
        let rules = vec![rule(r"\.pdf$", Resolver::Template("docs/".into()))];
        assert_eq!(classify(rules, "image.png").unwrap(), Classification::Unhandled);
    }

    #[test]
    fn test_constant_actions() {
        let rules = vec![
            rule(r"^keep\.txt$", Resolver::Constant(Action::Skip)),
            rule(r"^node_modules/$", Resolver::Constant(Action::SkipRecurse)),
        ];
        let set = RuleSet::new(rules);
        assert_eq!(
            set.classify(&PathEntity::new("keep.txt")).unwrap(),
            Classification::Skip
        );
        assert_eq!(
            set.classify(&PathEntity::new("node_modules/")).unwrap(),
            Classification::SkipRecurse
        );
    }

    #[test]
    fn test_positional_placeholders() {
        let rules = vec![rule(
            r"([^_]*)_([^_]*)\.mp3$",
            Resolver::Template("music/{1}/{2}.mp3".into()),
        )];
        let got = classify(rules, "awesome_song.mp3").unwrap();
        assert_eq!(
            got,
            Classification::Move(Destination::RenameTo("music/awesome/song.mp3".into()))
        );
    }

    #[test]
    fn test_whole_match_placeholder() {
        let rules = vec![rule(r"\w+\.log$", Resolver::Template("logs/{0}".into()))];
        let got = classify(rules, "app.log").unwrap();
        assert_eq!(
            got,
            Classification::Move(Destination::RenameTo("logs/app.log".into()))
        );
    }

    #[test]
    fn test_named_placeholders() {
        let rules = vec![rule(
            r"^(?P<year>\d{4})-(?P<month>\d{2})-.+\.jpg$",
            Resolver::Template("images/{year}/{month}/".into()),
        )];
        let got = classify(rules, "2016-03-12 13.34.21.jpg").unwrap();
        assert_eq!(
            got,
            Classification::Move(Destination::Into("images/2016/03/".into()))
        );
    }

    #[test]
    fn test_placeholder_out_of_range_is_fatal() {
        let rules = vec![rule(
            r"(\w+)_(\w+)\.(pdf)$",
            Resolver::Template("{4}/".into()),
        )];
        let err = classify(rules, "hello_cruel.pdf").unwrap_err();
        assert!(matches!(err, RuleError::PlaceholderOutOfRange { index: 4, .. }));
    }

    #[test]
    fn test_unknown_named_placeholder_is_fatal() {
        let rules = vec![rule(
            r"(?P<name>\w+)\.pdf$",
            Resolver::Template("{unknown}/".into()),
        )];
        let err = classify(rules, "hello.pdf").unwrap_err();
        assert!(matches!(err, RuleError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_brace_escapes() {
        let rules = vec![rule(r"^a\.cfg$", Resolver::Template("{{literal}}/{0}".into()))];
        let got = classify(rules, "a.cfg").unwrap();
        assert_eq!(
            got,
            Classification::Move(Destination::RenameTo("{literal}/a.cfg".into()))
        );
    }

    #[test]
    fn test_handler_extension_dir() {
        let func = lookup_handler("extension-dir").unwrap();
        let rules = vec![rule(
            r".",
            Resolver::Handler {
                name: "extension-dir".into(),
                func,
            },
        )];
        let set = RuleSet::new(rules);
        assert_eq!(
            set.classify(&PathEntity::new("photo.JPG")).unwrap(),
            Classification::Move(Destination::Into("jpg/".into()))
        );
        // handlers may decline directories
        assert_eq!(
            set.classify(&PathEntity::new("somedir/")).unwrap(),
            Classification::Unhandled
        );
    }

    #[test]
    fn test_handler_directories() {
        let func = lookup_handler("directories").unwrap();
        let rules = vec![rule(
            r".",
            Resolver::Handler {
                name: "directories".into(),
                func,
            },
        )];
        let set = RuleSet::new(rules);
        assert_eq!(
            set.classify(&PathEntity::new("stuff/")).unwrap(),
            Classification::Move(Destination::Into("directories/".into()))
        );
        assert_eq!(
            set.classify(&PathEntity::new("stuff.txt")).unwrap(),
            Classification::Unhandled
        );
    }

    #[test]
    fn test_matches_ancestor_directories() {
        let rules = vec![rule(
            r"^archive/.*\.txt$",
            Resolver::Template("old-texts/".into()),
        )];
        let set = RuleSet::new(rules);
        assert_eq!(
            set.classify(&PathEntity::new("archive/notes.txt")).unwrap(),
            Classification::Move(Destination::Into("old-texts/".into()))
        );
        assert_eq!(
            set.classify(&PathEntity::new("notes.txt")).unwrap(),
            Classification::Unhandled
        );
    }
}
