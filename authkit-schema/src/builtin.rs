//! Built-in feature catalog.
//!
//! Each entry declares its requirement accessors and the schema template
//! that creates its tables. Table names are templates too, so the whole
//! catalog follows the configured prefix. The `base` feature creates its
//! password hash table only inside its template; it has no accessor.

use crate::error::SchemaResult;
use crate::feature::FeatureDefinition;
use crate::template::TemplateContext;

struct Builtin {
    name: &'static str,
    tables: &'static [(&'static str, &'static str)],
    schema: &'static str,
}

const CATALOG: &[Builtin] = &[
    Builtin {
        name: "base",
        tables: &[("accounts_table", "{{ prefix | plural }}")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix | plural }} (
    id INTEGER PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    status_id INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS {{ prefix }}_password_hashes (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    password_hash VARCHAR(255) NOT NULL
);
"#,
    },
    Builtin {
        name: "otp",
        tables: &[("otp_keys_table", "{{ prefix }}_otp_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_otp_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    num_failures INTEGER NOT NULL DEFAULT 0,
    last_use TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "recovery_codes",
        tables: &[("recovery_codes_table", "{{ prefix }}_recovery_codes")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_recovery_codes (
    id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    code VARCHAR(255) NOT NULL,
    PRIMARY KEY (id, code)
);
"#,
    },
    Builtin {
        name: "sms_codes",
        tables: &[("sms_codes_table", "{{ prefix }}_sms_codes")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_sms_codes (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    phone_number VARCHAR(255) NOT NULL,
    num_failures INTEGER,
    code VARCHAR(255),
    code_issued_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "remember",
        tables: &[("remember_table", "{{ prefix }}_remember_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_remember_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL
);
"#,
    },
    Builtin {
        name: "verify_account",
        tables: &[("verify_account_table", "{{ prefix }}_verification_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_verification_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    requested_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    email_last_sent TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "reset_password",
        tables: &[("reset_password_table", "{{ prefix }}_password_reset_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_password_reset_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL,
    email_last_sent TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "lockout",
        tables: &[
            ("account_login_failures_table", "{{ prefix }}_login_failures"),
            ("account_lockouts_table", "{{ prefix }}_lockouts"),
        ],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_login_failures (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    number INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS {{ prefix }}_lockouts (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL,
    email_last_sent TIMESTAMP
);
"#,
    },
    Builtin {
        name: "email_auth",
        tables: &[("email_auth_table", "{{ prefix }}_email_auth_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_email_auth_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL,
    email_last_sent TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "verify_login_change",
        tables: &[("verify_login_change_table", "{{ prefix }}_login_change_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_login_change_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    login VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL
);
"#,
    },
    Builtin {
        name: "active_sessions",
        tables: &[("active_sessions_table", "{{ prefix }}_active_session_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_active_session_keys (
    session_id VARCHAR(255) NOT NULL,
    account_id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_use TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (session_id, account_id)
);
"#,
    },
    Builtin {
        name: "audit_logging",
        tables: &[("audit_logging_table", "{{ prefix }}_authentication_audit_logs")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_authentication_audit_logs (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    message TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS audit_account_at_idx
    ON {{ prefix }}_authentication_audit_logs (account_id, at);
"#,
    },
    Builtin {
        name: "password_expiration",
        tables: &[("password_expiration_table", "{{ prefix }}_password_change_times")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_password_change_times (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    changed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Builtin {
        name: "single_session",
        tables: &[("single_session_table", "{{ prefix }}_session_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_session_keys (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL
);
"#,
    },
    Builtin {
        name: "disallow_password_reuse",
        tables: &[(
            "previous_password_hash_table",
            "{{ prefix }}_previous_password_hashes",
        )],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_previous_password_hashes (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    password_hash VARCHAR(255) NOT NULL
);
"#,
    },
    Builtin {
        name: "webauthn",
        tables: &[
            ("webauthn_user_ids_table", "{{ prefix }}_webauthn_user_ids"),
            ("webauthn_keys_table", "{{ prefix }}_webauthn_keys"),
        ],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_webauthn_user_ids (
    id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
    webauthn_id VARCHAR(255) NOT NULL
);

CREATE TABLE IF NOT EXISTS {{ prefix }}_webauthn_keys (
    account_id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    webauthn_id VARCHAR(255) NOT NULL,
    public_key VARCHAR(255) NOT NULL,
    sign_count INTEGER NOT NULL,
    last_use TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (account_id, webauthn_id)
);
"#,
    },
    Builtin {
        name: "jwt_refresh",
        tables: &[("jwt_refresh_token_table", "{{ prefix }}_jwt_refresh_keys")],
        schema: r#"
CREATE TABLE IF NOT EXISTS {{ prefix }}_jwt_refresh_keys (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES {{ prefix | plural }}(id),
    key VARCHAR(255) NOT NULL,
    deadline TIMESTAMP NOT NULL
);
"#,
    },
];

/// Names of every built-in feature, in catalog order.
pub fn names() -> Vec<&'static str> {
    CATALOG.iter().map(|b| b.name).collect()
}

/// Build the named built-in feature, or `None` if it is not in the catalog.
///
/// Accessor table names are rendered with `ctx`; the schema template is
/// kept unrendered, as discovery renders it.
pub fn feature(name: &str, ctx: &TemplateContext) -> SchemaResult<Option<FeatureDefinition>> {
    let Some(builtin) = CATALOG.iter().find(|b| b.name == name) else {
        return Ok(None);
    };

    let mut feature = FeatureDefinition::new(builtin.name).template(builtin.schema);
    for (accessor, table) in builtin.tables {
        feature = feature.table(*accessor, ctx.render(builtin.name, table)?);
    }
    Ok(Some(feature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::parser::created_tables;

    #[test]
    fn test_catalog_names_unique() {
        let mut names = names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_unknown_feature() {
        assert!(feature("telepathy", &TemplateContext::default()).unwrap().is_none());
    }

    #[test]
    fn test_base_tables() {
        let base = feature("base", &TemplateContext::default()).unwrap().unwrap();
        let tables: Vec<String> = base.required_tables().into_iter().map(|t| t.table).collect();
        assert_eq!(tables, vec!["accounts"]);
    }

    #[test]
    fn test_prefix_applies_to_accessors() {
        let otp = feature("otp", &TemplateContext::new("user")).unwrap().unwrap();
        assert_eq!(otp.required_tables()[0].table, "user_otp_keys");
    }

    #[test]
    fn test_every_template_creates_its_accessor_tables() {
        let ctx = TemplateContext::default();
        for name in names() {
            let feature = feature(name, &ctx).unwrap().unwrap();
            let template = feature.schema_template().unwrap();
            let rendered = ctx.render(name, template).unwrap();
            let created = created_tables(&rendered).unwrap();

            for req in feature.required_tables() {
                assert!(
                    created.contains(&req.table),
                    "feature `{}` does not create `{}`",
                    name,
                    req.table
                );
            }
        }
    }
}
