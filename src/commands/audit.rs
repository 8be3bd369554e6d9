use crate::audit::{snapshot_current, AuditEntry, AuditedTable};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use serde::Serialize;
use serde_json::Value;

use super::{Page, Paginated};

/// Recorded changes of one row next to its live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordHistory {
    pub table: AuditedTable,
    pub record_id: i64,
    /// `None` once the row has been deleted.
    pub current: Option<Value>,
    pub entries: Vec<AuditEntry>,
}

/// Audit entries, newest first.
pub fn list_audit_entries(db: &SharedDatabase, page: Page) -> Result<Paginated<AuditEntry>, AppError> {
    with_connection(db, "list audit entries", |conn| {
        let total = AuditEntry::count(conn)?;
        let results = AuditEntry::list(conn, page.effective_limit(), page.offset)?;
        Ok(Paginated {
            count: usize::try_from(total).unwrap_or_default(),
            results,
        })
    })
}

pub fn get_audit_entry(db: &SharedDatabase, id: i64) -> Result<AuditEntry, AppError> {
    with_connection(db, "load audit entry", |conn| {
        AuditEntry::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Audit entry"))
    })
}

/// Every change recorded for one row, oldest first.
pub fn get_record_history(
    db: &SharedDatabase,
    table: AuditedTable,
    record_id: i64,
) -> Result<RecordHistory, AppError> {
    if !table.has_record_id() {
        return Err(AppError::invalid(
            "table",
            format!("{table} rows have no single identifier"),
        ));
    }
    with_connection(db, "load record history", |conn| {
        Ok(RecordHistory {
            table,
            record_id,
            current: snapshot_current(conn, table, record_id)?,
            entries: AuditEntry::find_for_record(conn, table, record_id)?,
        })
    })
}

/// Remove one audit entry. Administrative pruning; the entry itself is not audited.
pub fn delete_audit_entry(db: &SharedDatabase, id: i64) -> Result<bool, AppError> {
    let deleted = with_transaction(db, "delete audit entry", |conn| Ok(AuditEntry::delete(conn, id)?))?;
    if deleted {
        log::info!("Pruned audit entry {id}");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditContext, Operation};
    use crate::commands::{categories, users};
    use crate::test_utils::{new_user, setup_shared_db};

    #[test]
    fn test_list_is_paginated_newest_first() {
        let (db, _dir) = setup_shared_db();
        for name in ["Sport", "Books", "Music"] {
            categories::create_category(&db, AuditContext::anonymous(), name, None).unwrap();
        }

        let page = list_audit_entries(&db, Page::new(Some(2), 0)).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.results.len(), 2);
        assert!(page.results[0].id > page.results[1].id);

        let rest = list_audit_entries(&db, Page::new(Some(2), 2)).unwrap();
        assert_eq!(rest.results.len(), 1);
    }

    #[test]
    fn test_record_history_and_prune() {
        let (db, _dir) = setup_shared_db();
        let user = users::create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap();
        users::delete_user(&db, AuditContext::anonymous(), user.id).unwrap();

        let history = get_record_history(&db, AuditedTable::Users, user.id).unwrap();
        assert!(history.current.is_none());
        let ops: Vec<Operation> = history.entries.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec![Operation::Created, Operation::Deleted]);

        let entry = get_audit_entry(&db, history.entries[0].id).unwrap();
        assert_eq!(entry.record_id, Some(user.id));

        assert!(delete_audit_entry(&db, entry.id).unwrap());
        assert!(!delete_audit_entry(&db, entry.id).unwrap());
        assert!(matches!(get_audit_entry(&db, entry.id).unwrap_err(), AppError::NotFound { .. }));
    }

    #[test]
    fn test_history_rejects_composite_key_tables() {
        let (db, _dir) = setup_shared_db();
        let err = get_record_history(&db, AuditedTable::Subscriptions, 1).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "table", .. }));
    }
}
