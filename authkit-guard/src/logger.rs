//! Diagnostic sinks and logger resolution.
//!
//! Operator-facing diagnostics (missing table reports, generated DDL,
//! refusals) go through a [`DiagnosticSink`]. The sink is resolved once per
//! guard through an ordered list of providers:
//!
//! 1. an explicit sink from the configuration,
//! 2. a named sink looked up in a [`LoggerRegistry`],
//! 3. the registry's ambient sink,
//! 4. the host's `tracing` subscriber, when one is installed,
//! 5. standard output.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Verbose detail.
    Debug,
    /// Informational.
    Info,
    /// Something needs attention.
    Warn,
    /// Something is broken.
    Error,
}

impl Severity {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for operator-facing diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Emit a record.
    fn emit(&self, severity: Severity, message: &str);

    /// Emit at debug severity.
    fn debug(&self, message: &str) {
        self.emit(Severity::Debug, message);
    }

    /// Emit at info severity.
    fn info(&self, message: &str) {
        self.emit(Severity::Info, message);
    }

    /// Emit at warn severity.
    fn warn(&self, message: &str) {
        self.emit(Severity::Warn, message);
    }

    /// Emit at error severity.
    fn error(&self, message: &str) {
        self.emit(Severity::Error, message);
    }
}

/// Forwards records to the current `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "authkit::guard", "{}", message),
            Severity::Info => tracing::info!(target: "authkit::guard", "{}", message),
            Severity::Warn => tracing::warn!(target: "authkit::guard", "{}", message),
            Severity::Error => tracing::error!(target: "authkit::guard", "{}", message),
        }
    }
}

/// Prints records to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&self, severity: Severity, message: &str) {
        println!("[authkit] {}: {}", severity.as_str().to_uppercase(), message);
    }
}

/// A captured diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Record severity.
    pub severity: Severity,
    /// Record text.
    pub message: String,
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Messages captured at exactly `severity`.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Check whether a record at `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.severity == severity && r.message.contains(needle))
    }

    /// Number of captured records at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    /// Drop all captured records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str) {
        self.records.lock().push(LogRecord {
            severity,
            message: message.to_string(),
        });
    }
}

/// Application-level named sinks plus an ambient default.
#[derive(Default)]
pub struct LoggerRegistry {
    named: RwLock<IndexMap<String, Arc<dyn DiagnosticSink>>>,
    ambient: RwLock<Option<Arc<dyn DiagnosticSink>>>,
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.named.read().keys().cloned().collect();
        f.debug_struct("LoggerRegistry")
            .field("named", &names)
            .field("ambient", &self.ambient.read().is_some())
            .finish()
    }
}

impl LoggerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named sink, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, sink: Arc<dyn DiagnosticSink>) {
        self.named.write().insert(name.into(), sink);
    }

    /// Look up a named sink.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DiagnosticSink>> {
        self.named.read().get(name).cloned()
    }

    /// Set the ambient sink.
    pub fn set_ambient(&self, sink: Arc<dyn DiagnosticSink>) {
        *self.ambient.write() = Some(sink);
    }

    /// The ambient sink, if any.
    pub fn ambient(&self) -> Option<Arc<dyn DiagnosticSink>> {
        self.ambient.read().clone()
    }
}

/// How the configuration selects its sink.
#[derive(Clone, Default)]
pub enum LoggerSelection {
    /// Use the fallback chain.
    #[default]
    Default,
    /// A direct sink reference.
    Sink(Arc<dyn DiagnosticSink>),
    /// A key looked up in the logger registry.
    Named(String),
}

impl fmt::Debug for LoggerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Sink(_) => f.write_str("Sink(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// A sink provider in the fallback chain.
pub type SinkProvider = Box<dyn Fn() -> Option<Arc<dyn DiagnosticSink>> + Send + Sync>;

struct Resolved {
    source: &'static str,
    sink: Arc<dyn DiagnosticSink>,
}

/// Resolves a [`DiagnosticSink`] through an ordered provider chain.
///
/// Providers run at most once: the first hit is cached for the lifetime of
/// the resolver. Standard output terminates every chain.
pub struct LoggerResolver {
    providers: Vec<(&'static str, SinkProvider)>,
    resolved: OnceLock<Resolved>,
}

impl fmt::Debug for LoggerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|(name, _)| *name).collect();
        f.debug_struct("LoggerResolver")
            .field("providers", &names)
            .field("resolved", &self.resolved.get().map(|r| r.source))
            .finish()
    }
}

impl LoggerResolver {
    /// Build the standard chain for a selection and optional registry.
    pub fn new(selection: &LoggerSelection, registry: Option<Arc<LoggerRegistry>>) -> Self {
        let mut providers: Vec<(&'static str, SinkProvider)> = Vec::new();

        match selection {
            LoggerSelection::Sink(sink) => {
                let sink = sink.clone();
                providers.push(("explicit", Box::new(move || Some(sink.clone()))));
            }
            LoggerSelection::Named(name) => {
                let name = name.clone();
                let registry = registry.clone();
                providers.push((
                    "named",
                    Box::new(move || {
                        let found = registry.as_ref().and_then(|r| r.get(&name));
                        if found.is_none() {
                            debug!(logger = %name, "Named logger not registered");
                        }
                        found
                    }),
                ));
            }
            LoggerSelection::Default => {}
        }

        if let Some(registry) = registry {
            providers.push(("ambient", Box::new(move || registry.ambient())));
        }

        providers.push((
            "tracing",
            Box::new(|| {
                subscriber_installed().then(|| Arc::new(TracingSink) as Arc<dyn DiagnosticSink>)
            }),
        ));

        Self::with_providers(providers)
    }

    /// Build a resolver from explicit providers. Standard output is appended.
    pub fn with_providers(mut providers: Vec<(&'static str, SinkProvider)>) -> Self {
        providers.push((
            "stdout",
            Box::new(|| Some(Arc::new(StdoutSink) as Arc<dyn DiagnosticSink>)),
        ));
        Self {
            providers,
            resolved: OnceLock::new(),
        }
    }

    /// The resolved sink.
    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        self.resolve().sink.clone()
    }

    /// Name of the provider that supplied the sink.
    pub fn source(&self) -> &'static str {
        self.resolve().source
    }

    fn resolve(&self) -> &Resolved {
        self.resolved.get_or_init(|| {
            for (source, provider) in &self.providers {
                if let Some(sink) = provider() {
                    debug!(source = *source, "Resolved diagnostic sink");
                    return Resolved {
                        source: *source,
                        sink,
                    };
                }
            }
            Resolved {
                source: "stdout",
                sink: Arc::new(StdoutSink),
            }
        })
    }
}

/// Check whether a `tracing` subscriber is in effect for this thread.
fn subscriber_installed() -> bool {
    tracing::dispatcher::get_default(|dispatch| {
        !dispatch.is::<tracing::subscriber::NoSubscriber>()
    })
}
