//! Features and the typed feature registry.

use std::fmt;
use std::sync::Arc;

use crate::builtin;
use crate::error::{SchemaError, SchemaResult};
use crate::requirement::TableRequirement;
use crate::template::TemplateContext;

/// A named, independently enablable unit of authentication behavior.
pub trait Feature: Send + Sync {
    /// The feature name, e.g. `otp`.
    fn name(&self) -> &str;

    /// Tables exposed through named requirement accessors.
    fn required_tables(&self) -> Vec<TableRequirement>;

    /// Templated schema definition creating this feature's tables.
    fn schema_template(&self) -> Option<&str> {
        None
    }
}

/// A declarative feature: a name, its accessors and an optional template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDefinition {
    name: String,
    tables: Vec<TableRequirement>,
    template: Option<String>,
}

impl FeatureDefinition {
    /// Create a feature with no tables.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            template: None,
        }
    }

    /// Declare a table exposed through the given accessor.
    pub fn table(mut self, accessor: impl Into<String>, table: impl Into<String>) -> Self {
        self.tables.push(TableRequirement::new(accessor, table));
        self
    }

    /// Attach a schema template.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl Feature for FeatureDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_tables(&self) -> Vec<TableRequirement> {
        self.tables.clone()
    }

    fn schema_template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

/// The set of active features, in declaration order.
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    features: Vec<Arc<dyn Feature>>,
    context: Option<TemplateContext>,
}

impl fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.names())
            .field("context", &self.context)
            .finish()
    }
}

impl FeatureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from built-in feature names.
    ///
    /// Accessor table names are rendered with `ctx`, and the registry keeps
    /// `ctx` so discovery renders the schema templates with the same prefix.
    pub fn builtin<S: AsRef<str>>(names: &[S], ctx: &TemplateContext) -> SchemaResult<Self> {
        let mut registry = Self::new().with_context(ctx.clone());
        for name in names {
            let name = name.as_ref();
            let feature =
                builtin::feature(name, ctx)?.ok_or_else(|| SchemaError::unknown_feature(name))?;
            registry.register(feature)?;
        }
        Ok(registry)
    }

    /// Record the template context the features were built for.
    pub fn with_context(mut self, ctx: TemplateContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Template context recorded for this registry, if any.
    pub fn context(&self) -> Option<&TemplateContext> {
        self.context.as_ref()
    }

    /// Register a feature. Names must be unique.
    pub fn register(&mut self, feature: impl Feature + 'static) -> SchemaResult<()> {
        self.register_arc(Arc::new(feature))
    }

    /// Register a shared feature. Names must be unique.
    pub fn register_arc(&mut self, feature: Arc<dyn Feature>) -> SchemaResult<()> {
        if self.get(feature.name()).is_some() {
            return Err(SchemaError::DuplicateFeature {
                name: feature.name().to_string(),
            });
        }
        self.features.push(feature);
        Ok(())
    }

    /// Register a feature, builder style.
    pub fn with(mut self, feature: impl Feature + 'static) -> SchemaResult<Self> {
        self.register(feature)?;
        Ok(self)
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<&dyn Feature> {
        self.features
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Iterate active features in declaration order.
    pub fn features(&self) -> impl Iterator<Item = &dyn Feature> {
        self.features.iter().map(|f| f.as_ref())
    }

    /// Names of the active features.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    /// Number of active features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if no feature is active.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let feature = FeatureDefinition::new("otp")
            .table("otp_keys_table", "account_otp_keys")
            .template("CREATE TABLE account_otp_keys (id INTEGER);");

        assert_eq!(feature.name(), "otp");
        assert_eq!(
            feature.required_tables(),
            vec![TableRequirement::new("otp_keys_table", "account_otp_keys")]
        );
        assert!(feature.schema_template().is_some());
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = FeatureRegistry::new();
        registry.register(FeatureDefinition::new("otp")).unwrap();
        let err = registry.register(FeatureDefinition::new("otp")).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFeature { .. }));
    }

    #[test]
    fn test_declaration_order() {
        let registry = FeatureRegistry::new()
            .with(FeatureDefinition::new("base"))
            .unwrap()
            .with(FeatureDefinition::new("remember"))
            .unwrap()
            .with(FeatureDefinition::new("otp"))
            .unwrap();

        assert_eq!(registry.names(), vec!["base", "remember", "otp"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("remember").is_some());
        assert!(registry.get("lockout").is_none());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = FeatureRegistry::builtin(&["base", "otp"], &TemplateContext::default()).unwrap();
        assert_eq!(registry.names(), vec!["base", "otp"]);
    }

    #[test]
    fn test_builtin_records_context() {
        let ctx = TemplateContext::new("member");
        let registry = FeatureRegistry::builtin(&["base"], &ctx).unwrap();
        assert_eq!(registry.context(), Some(&ctx));
        assert!(FeatureRegistry::new().context().is_none());
    }

    #[test]
    fn test_builtin_unknown_feature() {
        let err = FeatureRegistry::builtin(&["base", "telepathy"], &TemplateContext::default())
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFeature { name } if name == "telepathy"));
    }
}
