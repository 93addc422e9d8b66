//! Requirement discovery across the active features.

use tracing::debug;

use crate::error::SchemaResult;
use crate::feature::{Feature, FeatureRegistry};
use crate::parser::{TableDefinition, parse_tables};
use crate::requirement::{FeatureRequirement, RequirementSet};
use crate::template::TemplateContext;

/// Discover every table required by the features in `registry`.
///
/// Explicit requirements come from each feature's accessors. Hidden
/// requirements are recovered by rendering the feature's schema template
/// with `ctx` and extracting every created table not already declared by
/// that feature. A template that fails to render or parse only loses that
/// feature's hidden tables. No database is touched.
pub fn discover(registry: &FeatureRegistry, ctx: &TemplateContext) -> RequirementSet {
    let mut set = RequirementSet::new();

    for feature in registry.features() {
        let explicit = feature.required_tables();
        for req in &explicit {
            set.insert(FeatureRequirement::explicit(
                feature.name(),
                req.accessor.as_str(),
                req.table.as_str(),
            ));
        }

        let tables = match template_tables(feature, ctx) {
            Ok(tables) => tables,
            Err(e) => {
                debug!(feature = feature.name(), error = %e, "Omitting hidden tables");
                continue;
            }
        };

        for table in tables {
            if !explicit.iter().any(|r| r.table == table.name) {
                debug!(feature = feature.name(), table = %table.name, "Found hidden table");
                set.insert(FeatureRequirement::hidden(feature.name(), table.name.as_str()));
            }
            set.add_definition(table);
        }
    }

    debug!(
        features = registry.len(),
        tables = set.len(),
        "Discovered table requirements"
    );
    set
}

/// Render a feature's template and parse the tables it creates.
pub fn template_tables(
    feature: &dyn Feature,
    ctx: &TemplateContext,
) -> SchemaResult<Vec<TableDefinition>> {
    match feature.schema_template() {
        Some(template) => parse_tables(&ctx.render(feature.name(), template)?),
        None => Ok(Vec::new()),
    }
}
