use std::sync::OnceLock;

use log::*;
use regex::Regex;

use crate::db::traits::StoreError;

fn schema_error_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:no such (?:column|table): |has no column named )([\w.]+)").ok()).as_ref()
}

fn missing_schema_item(message: &str) -> Option<String> {
    let captures = schema_error_regex()?.captures(message)?;
    captures.get(1).map(|m| m.as_str().to_string())
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => match missing_schema_item(db_err.message()) {
                Some(missing) => {
                    warn!("🗃️ The database schema is missing {missing}. {db_err}");
                    StoreError::SchemaCompatibility { missing }
                },
                None => StoreError::DatabaseError(db_err.to_string()),
            },
            _ => StoreError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::DatabaseError(format!("Migration failed: {e}"))
    }
}

#[cfg(test)]
mod test {
    use super::missing_schema_item;

    #[test]
    fn detects_missing_columns_and_tables() {
        assert_eq!(missing_schema_item("no such column: paid_at").as_deref(), Some("paid_at"));
        assert_eq!(missing_schema_item("no such table: po_audit_logs").as_deref(), Some("po_audit_logs"));
        assert_eq!(missing_schema_item("table payments has no column named paid_at").as_deref(), Some("paid_at"));
        assert_eq!(missing_schema_item("UNIQUE constraint failed: payments.external_payment_id"), None);
    }
}
