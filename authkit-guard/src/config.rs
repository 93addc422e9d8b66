//! Guard configuration.
//!
//! Settings are loaded from the `[guard]` section of an `authkit.toml`
//! file and turned into an immutable [`GuardConfig`] snapshot:
//!
//! ```toml
//! [guard]
//! features = ["base", "otp", "remember"]
//! table_prefix = "account"
//! validation = "raise"
//! generation = "migration"
//! output_dir = "./db/migrate"
//! skip_tables = ["account_remember_keys"]
//! environment_var = "APP_ENV"
//! ```
//!
//! `${VAR}` references are expanded from the process environment before
//! parsing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use authkit_schema::{FeatureRegistry, TemplateContext, template::DEFAULT_PREFIX};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::environment::{DEFAULT_ENVIRONMENT_VAR, EnvironmentSource};
use crate::error::{GuardError, GuardResult};
use crate::logger::{DiagnosticSink, LoggerRegistry, LoggerSelection};
use crate::mode::{GenerationMode, ValidationMode};

/// Default directory for emitted migration files.
pub const DEFAULT_OUTPUT_DIR: &str = "./migrations";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthkitConfig {
    /// Schema guard settings.
    #[serde(default)]
    pub guard: GuardSettings,
}

impl AuthkitConfig {
    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> GuardResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GuardError::ConfigIo {
            path: path.to_path_buf(),
            source: e,
        })?;

        content.parse()
    }
}

impl FromStr for AuthkitConfig {
    type Err = GuardError;

    fn from_str(content: &str) -> GuardResult<Self> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }
}

/// Raw `[guard]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardSettings {
    /// Built-in features to enable, in declaration order.
    #[serde(default)]
    pub features: Vec<String>,

    /// Table naming prefix.
    #[serde(default = "default_prefix")]
    pub table_prefix: String,

    /// Validation mode name.
    #[serde(default = "default_validation")]
    pub validation: String,

    /// Generation mode name.
    #[serde(default)]
    pub generation: Option<String>,

    /// Tables that are never checked.
    #[serde(default)]
    pub skip_tables: Vec<String>,

    /// Directory for emitted migration files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Named logger key.
    #[serde(default)]
    pub logger: Option<String>,

    /// Fixed environment tag. Takes precedence over `environment_var`.
    #[serde(default)]
    pub environment: Option<String>,

    /// Variable holding the environment tag.
    #[serde(default = "default_environment_var")]
    pub environment_var: String,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_validation() -> String {
    "warn".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_environment_var() -> String {
    DEFAULT_ENVIRONMENT_VAR.to_string()
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            table_prefix: default_prefix(),
            validation: default_validation(),
            generation: None,
            skip_tables: Vec::new(),
            output_dir: default_output_dir(),
            logger: None,
            environment: None,
            environment_var: default_environment_var(),
        }
    }
}

impl GuardSettings {
    /// Parse the settings into a configuration snapshot.
    ///
    /// Unknown mode values and unknown feature names fail immediately.
    pub fn into_config(self) -> GuardResult<GuardConfig> {
        let validation: ValidationMode = self.validation.parse()?;
        let generation = match &self.generation {
            Some(value) => GenerationMode::parse(value, &self.output_dir)?,
            None => GenerationMode::None,
        };

        let template = TemplateContext::new(self.table_prefix);
        let registry = FeatureRegistry::builtin(self.features.as_slice(), &template)?;

        let environment = match self.environment {
            Some(tag) => EnvironmentSource::tag(tag),
            None => EnvironmentSource::variable(self.environment_var),
        };

        let mut config = GuardConfig::new()
            .registry(registry)
            .template(template)
            .validation(validation)
            .generation(generation)
            .skip_tables(self.skip_tables)
            .environment(environment);
        if let Some(name) = self.logger {
            config = config.named_logger(name);
        }
        Ok(config)
    }
}

/// Called with a status code when the halt policy fires.
pub type ExitHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Immutable configuration snapshot for a schema guard.
///
/// Built from [`GuardSettings`] or with the consuming builder methods. The
/// builder is the only way to install a custom validation handler, a direct
/// sink or an exit handler.
#[derive(Clone)]
pub struct GuardConfig {
    registry: FeatureRegistry,
    template: TemplateContext,
    validation: ValidationMode,
    generation: GenerationMode,
    skip_tables: IndexSet<String>,
    logger: LoggerSelection,
    logger_registry: Option<Arc<LoggerRegistry>>,
    environment: EnvironmentSource,
    exit_handler: ExitHandler,
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("registry", &self.registry)
            .field("template", &self.template)
            .field("validation", &self.validation)
            .field("generation", &self.generation)
            .field("skip_tables", &self.skip_tables)
            .field("logger", &self.logger)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            registry: FeatureRegistry::new(),
            template: TemplateContext::default(),
            validation: ValidationMode::default(),
            generation: GenerationMode::default(),
            skip_tables: IndexSet::new(),
            logger: LoggerSelection::default(),
            logger_registry: None,
            environment: EnvironmentSource::default(),
            exit_handler: Arc::new(exit_process),
        }
    }
}

impl GuardConfig {
    /// Create a configuration with default settings and no features.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active features.
    pub fn registry(mut self, registry: FeatureRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the template evaluation context for registries that do not
    /// carry their own.
    pub fn template(mut self, template: TemplateContext) -> Self {
        self.template = template;
        self
    }

    /// Set the validation mode.
    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    /// Set the generation mode.
    pub fn generation(mut self, mode: GenerationMode) -> Self {
        self.generation = mode;
        self
    }

    /// Never check this table.
    pub fn skip_table(mut self, table: impl Into<String>) -> Self {
        self.skip_tables.insert(table.into());
        self
    }

    /// Never check these tables.
    pub fn skip_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_tables.extend(tables.into_iter().map(Into::into));
        self
    }

    /// Send diagnostics to this sink.
    pub fn logger(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.logger = LoggerSelection::Sink(sink);
        self
    }

    /// Look the sink up by name in the logger registry.
    pub fn named_logger(mut self, name: impl Into<String>) -> Self {
        self.logger = LoggerSelection::Named(name.into());
        self
    }

    /// Application logger registry for named and ambient sinks.
    pub fn logger_registry(mut self, registry: Arc<LoggerRegistry>) -> Self {
        self.logger_registry = Some(registry);
        self
    }

    /// Set where the environment tag comes from.
    pub fn environment(mut self, source: EnvironmentSource) -> Self {
        self.environment = source;
        self
    }

    /// Replace the process exit used by the halt policy.
    pub fn exit_handler(mut self, handler: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit_handler = Arc::new(handler);
        self
    }

    /// Active features.
    pub fn features(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Template evaluation context.
    ///
    /// A registry built for a specific context (see
    /// [`FeatureRegistry::builtin`]) always uses that context, so accessor
    /// names and rendered templates share one prefix.
    pub fn template_context(&self) -> &TemplateContext {
        self.registry.context().unwrap_or(&self.template)
    }

    /// Validation mode.
    pub fn validation_mode(&self) -> &ValidationMode {
        &self.validation
    }

    /// Generation mode.
    pub fn generation_mode(&self) -> &GenerationMode {
        &self.generation
    }

    /// Check whether a table is on the skip list.
    pub fn is_skipped(&self, table: &str) -> bool {
        self.skip_tables.contains(table)
    }

    /// Skipped tables.
    pub fn skipped_tables(&self) -> impl Iterator<Item = &str> {
        self.skip_tables.iter().map(String::as_str)
    }

    /// Logger selection.
    pub fn logger_selection(&self) -> &LoggerSelection {
        &self.logger
    }

    /// Logger registry, if any.
    pub fn logger_registry_ref(&self) -> Option<&Arc<LoggerRegistry>> {
        self.logger_registry.as_ref()
    }

    /// Environment tag source.
    pub fn environment_source(&self) -> &EnvironmentSource {
        &self.environment
    }

    pub(crate) fn exit(&self, code: i32) {
        (self.exit_handler)(code);
    }
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
