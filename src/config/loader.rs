//! Rules loader.
//!
//! Pipeline for a user rules file:
//! 1. Size check and read, UTF-8 BOM stripped
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing
//! 4. Merge over the built-in rules
//! 5. Deserialization to [`RulesDocument`]
//! 6. Validation
//! 7. Freeze into `Arc<Rules>`

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use serde_yaml::Value;

use crate::config::Rules;
use crate::config::schema::RulesDocument;
use crate::config::validation::Validator;
use crate::error::ConfigError;
use crate::game::win::WinConditionRegistry;

/// Label used in errors and warnings for the embedded rules.
pub const BUILTIN_SOURCE: &str = "<builtin>";

const BUILTIN_RULES: &str = include_str!("../../rules/builtin.yaml");

/// Parsed once; every loader merges over a clone.
static BUILTIN_VALUE: LazyLock<Result<Value, String>> =
    LazyLock::new(|| serde_yaml::from_str(BUILTIN_RULES).map_err(|e| e.to_string()));

/// Doc, section, entry. Fields below an entry are replaced whole.
const MERGE_DEPTH: usize = 3;

// ============================================================================
// Public API
// ============================================================================

/// Options for [`RulesLoader`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Size limits.
    pub limits: ConfigLimits,

    /// Merge user files over the built-in rules. When `false` a file must
    /// be complete on its own.
    pub merge_builtin: bool,

    /// Win conditions mode definitions may name.
    pub conditions: WinConditionRegistry,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            limits: ConfigLimits::default(),
            merge_builtin: true,
            conditions: WinConditionRegistry::default(),
        }
    }
}

/// Limits that keep a hostile rules file from exhausting memory.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum rules file size in bytes.
    pub max_config_size: usize,

    /// Maximum number of roles after merging.
    pub max_roles: usize,

    /// Maximum number of modes after merging.
    pub max_modes: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("WOLFDEN_MAX_CONFIG_SIZE", 1024 * 1024),
            max_roles: env_or("WOLFDEN_MAX_ROLES", 256),
            max_modes: env_or("WOLFDEN_MAX_MODES", 64),
        }
    }
}

/// Loaded rules plus anything worth telling the user.
#[derive(Debug)]
pub struct LoadResult {
    /// Frozen rules.
    pub rules: Arc<Rules>,

    /// Non-fatal findings.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal finding during loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// What was found.
    pub message: String,

    /// Field path or file it was found at.
    pub location: Option<String>,
}

/// Turns YAML into validated [`Rules`].
#[derive(Debug, Default)]
pub struct RulesLoader {
    options: LoaderOptions,
}

impl RulesLoader {
    /// Creates a loader.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads the rules file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing or larger than the configured limit
    /// - A required environment variable is unset
    /// - YAML parsing or deserialization fails
    /// - Validation reports at least one error
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        self.check_size(size)?;

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_from_str(&raw, path)
    }

    /// Loads rules from text; `source` is used in messages only.
    ///
    /// # Errors
    ///
    /// Same as [`RulesLoader::load`], minus the file access.
    pub fn load_from_str(&self, raw: &str, source: &Path) -> Result<LoadResult, ConfigError> {
        self.check_size(raw.len())?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env = EnvSubstitution::new();
        let expanded = env.substitute(raw, source)?;
        let mut warnings = env.warnings;

        let overlay: Value = serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            path: source.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;
        if overlay.is_null() {
            return Err(ConfigError::ParseError {
                path: source.to_path_buf(),
                line: None,
                message: "Rules file is empty".to_string(),
            });
        }

        let merged = if self.options.merge_builtin {
            let mut base = builtin_value()?;
            merge(&mut base, overlay, MERGE_DEPTH);
            base
        } else {
            overlay
        };

        let doc = deserialize(merged, source)?;
        let mut result = self.freeze(&doc, &source.display().to_string())?;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    /// Loads only the embedded rules.
    ///
    /// # Errors
    ///
    /// Fails only if the embedded rules are themselves broken.
    pub fn load_builtin(&self) -> Result<LoadResult, ConfigError> {
        let doc = deserialize(builtin_value()?, Path::new(BUILTIN_SOURCE))?;
        self.freeze(&doc, BUILTIN_SOURCE)
    }

    fn check_size(&self, size: usize) -> Result<(), ConfigError> {
        let max = self.options.limits.max_config_size;
        if size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }
        Ok(())
    }

    fn freeze(&self, doc: &RulesDocument, source: &str) -> Result<LoadResult, ConfigError> {
        let result = Validator::new().validate(doc, &self.options.limits, &self.options.conditions);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: source.to_string(),
                errors: result.errors,
            });
        }

        let warnings = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult {
            rules: Arc::new(Rules::from_document(doc)?),
            warnings,
        })
    }
}

fn builtin_value() -> Result<Value, ConfigError> {
    BUILTIN_VALUE
        .as_ref()
        .cloned()
        .map_err(|message| ConfigError::ParseError {
            path: PathBuf::from(BUILTIN_SOURCE),
            line: None,
            message: message.clone(),
        })
}

fn deserialize(value: Value, source: &Path) -> Result<RulesDocument, ConfigError> {
    serde_yaml::from_value(value).map_err(|e| ConfigError::ParseError {
        path: source.to_path_buf(),
        line: None,
        message: format!("Failed to deserialize rules: {e}"),
    })
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Expands `${VAR}` references in raw YAML text before parsing, so the
/// substituted values still get YAML type inference.
///
/// - `${VAR}` expands to the value, or to nothing with a warning
/// - `${VAR:-default}` falls back to `default`
/// - `${VAR:?message}` fails when unset
/// - `$$` is a literal `$`
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    fn substitute(&mut self, raw: &str, source: &Path) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let tail = &rest[at + 1..];

            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
                continue;
            }
            let Some(body) = tail.strip_prefix('{') else {
                out.push('$');
                rest = tail;
                continue;
            };
            let Some(end) = closing_brace(body) else {
                let offset = raw.len() - rest.len() + at;
                return Err(ConfigError::ParseError {
                    path: source.to_path_buf(),
                    line: Some(line_of(raw, offset)),
                    message: "Unclosed environment variable reference".to_string(),
                });
            };

            out.push_str(&self.expand(&body[..end], source)?);
            rest = &body[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn expand(&mut self, spec: &str, source: &Path) -> Result<String, ConfigError> {
        let split = [spec.find(":-"), spec.find(":?")].into_iter().flatten().min();
        let (name, fallback) = match split {
            Some(i) => (&spec[..i], Some((&spec[i + 1..i + 2], &spec[i + 2..]))),
            None => (spec, None),
        };

        if let Ok(value) = std::env::var(name) {
            return Ok(value);
        }
        match fallback {
            Some(("-", default)) => Ok(default.to_string()),
            Some((_, message)) => Err(ConfigError::EnvVarNotSet {
                var: name.to_string(),
                location: format!("{}: {message}", source.display()),
            }),
            None => {
                self.warnings.push(LoadWarning {
                    message: format!(
                        "Environment variable '{name}' is not set, using empty string"
                    ),
                    location: Some(source.display().to_string()),
                });
                Ok(String::new())
            }
        }
    }
}

/// Byte index of the `}` closing a reference whose body starts at `body`.
/// Nested braces in defaults are balanced.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads a limit from the environment, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Merges `overlay` into `base`, descending into mappings for at most
/// `depth` levels. Anything deeper is replaced whole.
fn merge(base: &mut Value, overlay: Value, depth: usize) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) if depth > 0 => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value, depth - 1),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
