use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use tracing::debug;

use crate::accounts;
use crate::error::{Result, TallyError};
use crate::ledger::{parse_date, row_to_txn, TXN_COLS};
use crate::models::{GroupType, SplitEntry, SplitExpenseDraft, TransactionGroup};

/// Allocate the next date-coded display label for `date`: `YYYYMMDD-NNN`
/// with NNN one past the day's highest serial. The group's id itself is
/// the rowid, so label contention never corrupts id allocation; callers
/// run this inside the same write transaction as the insert.
fn next_label(conn: &Connection, date: NaiveDate) -> Result<String> {
    let date_code = date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64;
    let prefix = format!("{date_code:08}");
    let max_serial: i64 = conn.query_row(
        "SELECT COALESCE(MAX(CAST(substr(label, 10) AS INTEGER)), 0) \
         FROM transaction_groups WHERE label LIKE ?1",
        [format!("{prefix}-%")],
        |r| r.get(0),
    )?;
    Ok(format!("{prefix}-{:03}", max_serial + 1))
}

pub(crate) fn insert_group(
    conn: &Connection,
    date: NaiveDate,
    name: &str,
    group_type: GroupType,
    description: Option<&str>,
) -> Result<i64> {
    let label = next_label(conn, date)?;
    conn.execute(
        "INSERT INTO transaction_groups (label, name, group_type, description) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![label, name, group_type.as_str(), description],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, %label, "created transaction group");
    Ok(id)
}

pub(crate) fn add_member(conn: &Connection, transaction_id: i64, group_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO transaction_group_members (transaction_id, group_id) VALUES (?1, ?2)",
        [transaction_id, group_id],
    )?;
    Ok(())
}

pub(crate) fn delete_group_if_empty(conn: &Connection, group_id: i64) -> Result<()> {
    let members: i64 = conn.query_row(
        "SELECT count(*) FROM transaction_group_members WHERE group_id = ?1",
        [group_id],
        |r| r.get(0),
    )?;
    if members == 0 {
        conn.execute("DELETE FROM transaction_groups WHERE id = ?1", [group_id])?;
        debug!(group_id, "deleted empty transaction group");
    }
    Ok(())
}

pub fn get_group(conn: &Connection, id: i64) -> Result<TransactionGroup> {
    let row = conn
        .query_row(
            "SELECT id, label, name, group_type, description FROM transaction_groups WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                TallyError::NotFound(format!("transaction group {id}"))
            }
            other => TallyError::Db(other),
        })?;
    Ok(TransactionGroup {
        id: row.0,
        label: row.1,
        name: row.2,
        group_type: GroupType::parse(&row.3)?,
        description: row.4,
    })
}

fn member_ids(conn: &Connection, group_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM transaction_group_members WHERE group_id = ?1 ORDER BY transaction_id",
    )?;
    let ids = stmt
        .query_map([group_id], |r| r.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Entries must sum to the stated total exactly: the 0.0001 display-unit
/// epsilon is one minor unit at scale 10,000, so a single unit off fails.
fn validate_draft(conn: &Connection, draft: &SplitExpenseDraft) -> Result<()> {
    if draft.entries.is_empty() {
        return Err(TallyError::InvalidArgument("split draft has no entries".to_string()));
    }
    parse_date(&draft.date)?;
    accounts::get_account(conn, draft.payment_account_id)?;
    for entry in &draft.entries {
        if entry.amount_minor <= 0 {
            return Err(TallyError::InvalidArgument(format!(
                "split entry amount must be positive, got {} minor units",
                entry.amount_minor
            )));
        }
        if entry.category_account_id == draft.payment_account_id {
            return Err(TallyError::InvalidArgument(
                "split entry category equals the payment account".to_string(),
            ));
        }
        accounts::get_account(conn, entry.category_account_id)?;
    }
    let sum: i64 = draft.entries.iter().map(|e| e.amount_minor).sum();
    if sum != draft.total_minor {
        return Err(TallyError::Consistency(format!(
            "split entries sum to {sum} minor units but the draft total is {}",
            draft.total_minor
        )));
    }
    Ok(())
}

fn insert_entry_row(conn: &Connection, draft: &SplitExpenseDraft, entry: &SplitEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (amount_minor, debit_account_id, credit_account_id, date, notes, state) \
         VALUES (?1, ?2, ?3, ?4, ?5, 'confirmed')",
        rusqlite::params![
            entry.amount_minor,
            entry.category_account_id,
            draft.payment_account_id,
            draft.date,
            entry.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_entry_row(conn: &Connection, id: i64, draft: &SplitExpenseDraft, entry: &SplitEntry) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET amount_minor = ?1, debit_account_id = ?2, credit_account_id = ?3, \
         date = ?4, notes = ?5, updated_at = datetime('now') WHERE id = ?6",
        rusqlite::params![
            entry.amount_minor,
            entry.category_account_id,
            draft.payment_account_id,
            draft.date,
            entry.notes,
            id,
        ],
    )?;
    Ok(())
}

fn split_group_name(draft: &SplitExpenseDraft) -> String {
    format!("Split expense {}", draft.date)
}

#[derive(Debug)]
pub struct SplitResult {
    pub group_id: Option<i64>,
    pub transaction_ids: Vec<i64>,
}

/// Record a split expense: every entry credits the payment account and
/// debits its own category. One entry collapses to a plain transaction;
/// several get a Split group. All rows land in one write transaction.
pub fn create_split_expense(conn: &mut Connection, draft: &SplitExpenseDraft) -> Result<SplitResult> {
    validate_draft(conn, draft)?;
    let tx = conn.transaction()?;
    let result = if draft.entries.len() == 1 {
        let id = insert_entry_row(&tx, draft, &draft.entries[0])?;
        SplitResult { group_id: None, transaction_ids: vec![id] }
    } else {
        let date = parse_date(&draft.date)?;
        let group_id = insert_group(&tx, date, &split_group_name(draft), GroupType::Split, None)?;
        let mut ids = Vec::with_capacity(draft.entries.len());
        for entry in &draft.entries {
            let id = insert_entry_row(&tx, draft, entry)?;
            add_member(&tx, id, group_id)?;
            ids.push(id);
        }
        SplitResult { group_id: Some(group_id), transaction_ids: ids }
    };
    tx.commit()?;
    debug!(rows = result.transaction_ids.len(), group = ?result.group_id, "created split expense");
    Ok(result)
}

/// Reconcile an edited split against its persisted rows.
///
/// Entries referencing an existing member are updated in place and
/// retained; the rest become new rows. Existing members not retained are
/// removed from the group and deleted. A one-entry submission migrates
/// back to the single-transaction shape (group dissolved); a many-entry
/// submission without a group gets a fresh one. Idempotent: reapplying
/// the same draft leaves the same row set.
pub fn update_split_expense(conn: &mut Connection, draft: &SplitExpenseDraft) -> Result<SplitResult> {
    validate_draft(conn, draft)?;
    let tx = conn.transaction()?;

    let existing: Vec<i64> = match draft.group_id {
        Some(group_id) => {
            // Surface a dangling group id instead of quietly re-creating.
            let exists: i64 = tx.query_row(
                "SELECT count(*) FROM transaction_groups WHERE id = ?1",
                [group_id],
                |r| r.get(0),
            )?;
            if exists == 0 {
                return Err(TallyError::NotFound(format!("transaction group {group_id}")));
            }
            member_ids(&tx, group_id)?
        }
        None => draft.entries.iter().filter_map(|e| e.transaction_id).collect(),
    };
    let existing_set: HashSet<i64> = existing.iter().copied().collect();

    let mut retained = Vec::with_capacity(draft.entries.len());
    for entry in &draft.entries {
        match entry.transaction_id {
            Some(id) if existing_set.contains(&id) => {
                update_entry_row(&tx, id, draft, entry)?;
                retained.push(id);
            }
            _ => retained.push(insert_entry_row(&tx, draft, entry)?),
        }
    }
    let retained_set: HashSet<i64> = retained.iter().copied().collect();

    for id in &existing {
        if !retained_set.contains(id) {
            tx.execute("DELETE FROM transaction_group_members WHERE transaction_id = ?1", [id])?;
            tx.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
        }
    }

    let group_id = if retained.len() == 1 {
        // Collapsed: back to the single-transaction representation.
        tx.execute(
            "DELETE FROM transaction_group_members WHERE transaction_id = ?1",
            [retained[0]],
        )?;
        if let Some(group_id) = draft.group_id {
            delete_group_if_empty(&tx, group_id)?;
        }
        None
    } else {
        match draft.group_id {
            Some(group_id) => {
                tx.execute(
                    "UPDATE transaction_groups SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                    rusqlite::params![split_group_name(draft), group_id],
                )?;
                for id in &retained {
                    add_member(&tx, *id, group_id)?;
                }
                Some(group_id)
            }
            None => {
                let date = parse_date(&draft.date)?;
                let group_id =
                    insert_group(&tx, date, &split_group_name(draft), GroupType::Split, None)?;
                for id in &retained {
                    add_member(&tx, *id, group_id)?;
                }
                Some(group_id)
            }
        }
    };
    tx.commit()?;
    debug!(rows = retained.len(), group = ?group_id, "reconciled split expense");
    Ok(SplitResult { group_id, transaction_ids: retained })
}

/// Load a transaction back into the editing shape. Grouped rows pull in
/// all their split siblings; ungrouped rows become a one-entry draft.
pub fn read_split_as_draft(conn: &Connection, transaction_id: i64) -> Result<SplitExpenseDraft> {
    let txn = crate::ledger::get_transaction(conn, transaction_id)?;
    let split_group: Option<i64> = conn
        .query_row(
            "SELECT g.id FROM transaction_group_members m \
             JOIN transaction_groups g ON g.id = m.group_id \
             WHERE m.transaction_id = ?1 AND g.group_type = 'split'",
            [transaction_id],
            |r| r.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match split_group {
        Some(group_id) => {
            let sql = format!(
                "SELECT {TXN_COLS} FROM transactions WHERE id IN \
                 (SELECT transaction_id FROM transaction_group_members WHERE group_id = ?1) \
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let members = stmt
                .query_map([group_id], row_to_txn)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let total = members.iter().map(|t| t.amount_minor).sum();
            let entries = members
                .iter()
                .map(|t| SplitEntry {
                    transaction_id: Some(t.id),
                    category_account_id: t.debit_account_id,
                    amount_minor: t.amount_minor,
                    notes: t.notes.clone(),
                })
                .collect();
            Ok(SplitExpenseDraft {
                group_id: Some(group_id),
                payment_account_id: txn.credit_account_id,
                date: txn.date,
                total_minor: total,
                entries,
            })
        }
        None => Ok(SplitExpenseDraft {
            group_id: None,
            payment_account_id: txn.credit_account_id,
            date: txn.date.clone(),
            total_minor: txn.amount_minor,
            entries: vec![SplitEntry {
                transaction_id: Some(txn.id),
                category_account_id: txn.debit_account_id,
                amount_minor: txn.amount_minor,
                notes: txn.notes,
            }],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::{NewAccount, ASSET_ROOT, EXPENSE_ROOT};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    struct Fixture {
        payment: i64,
        food: i64,
        fuel: i64,
        fun: i64,
    }

    fn fixture(conn: &Connection) -> Fixture {
        Fixture {
            payment: accounts::create_account(conn, &NewAccount::under("Checking", ASSET_ROOT)).unwrap(),
            food: accounts::create_account(conn, &NewAccount::under("Food", EXPENSE_ROOT)).unwrap(),
            fuel: accounts::create_account(conn, &NewAccount::under("Fuel", EXPENSE_ROOT)).unwrap(),
            fun: accounts::create_account(conn, &NewAccount::under("Fun", EXPENSE_ROOT)).unwrap(),
        }
    }

    fn entry(category: i64, amount_minor: i64) -> SplitEntry {
        SplitEntry { transaction_id: None, category_account_id: category, amount_minor, notes: None }
    }

    fn draft(f: &Fixture, entries: Vec<SplitEntry>) -> SplitExpenseDraft {
        let total = entries.iter().map(|e| e.amount_minor).sum();
        SplitExpenseDraft {
            group_id: None,
            payment_account_id: f.payment,
            date: "2025-04-10".to_string(),
            total_minor: total,
            entries,
        }
    }

    fn row_count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_single_entry_creates_plain_transaction() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let result = create_split_expense(&mut conn, &draft(&f, vec![entry(f.food, 100_000)])).unwrap();
        assert!(result.group_id.is_none());
        assert_eq!(result.transaction_ids.len(), 1);
        assert_eq!(row_count(&conn, "transaction_groups"), 0);
    }

    #[test]
    fn test_multi_entry_creates_group_with_members() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let result = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000), entry(f.fun, 25_000)]),
        )
        .unwrap();
        let group_id = result.group_id.unwrap();
        assert_eq!(result.transaction_ids.len(), 3);
        assert_eq!(member_ids(&conn, group_id).unwrap().len(), 3);
        let group = get_group(&conn, group_id).unwrap();
        assert_eq!(group.group_type, GroupType::Split);
        assert_eq!(group.label, "20250410-001");
        // Every row credits the payment account.
        let credits: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions WHERE credit_account_id = ?1",
                [f.payment],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(credits, 3);
    }

    #[test]
    fn test_labels_serialize_within_a_day() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let d = draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]);
        let first = create_split_expense(&mut conn, &d).unwrap();
        let second = create_split_expense(&mut conn, &d).unwrap();
        assert_eq!(get_group(&conn, first.group_id.unwrap()).unwrap().label, "20250410-001");
        assert_eq!(get_group(&conn, second.group_id.unwrap()).unwrap().label, "20250410-002");
    }

    #[test]
    fn test_sum_mismatch_rejected_before_any_write() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let mut bad = draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]);
        bad.total_minor += 1; // one minor unit off
        let err = create_split_expense(&mut conn, &bad).unwrap_err();
        assert_eq!(err.code(), "consistency");
        assert_eq!(row_count(&conn, "transactions"), 0);
        assert_eq!(row_count(&conn, "transaction_groups"), 0);
    }

    #[test]
    fn test_expand_single_to_three() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let single = create_split_expense(&mut conn, &draft(&f, vec![entry(f.food, 175_000)])).unwrap();
        let kept = single.transaction_ids[0];

        let mut expanded = draft(
            &f,
            vec![
                SplitEntry {
                    transaction_id: Some(kept),
                    category_account_id: f.food,
                    amount_minor: 100_000,
                    notes: None,
                },
                entry(f.fuel, 50_000),
                entry(f.fun, 25_000),
            ],
        );
        expanded.group_id = None;
        let result = update_split_expense(&mut conn, &expanded).unwrap();

        assert!(result.group_id.is_some());
        assert!(result.transaction_ids.contains(&kept));
        assert_eq!(result.transaction_ids.len(), 3);
        assert_eq!(row_count(&conn, "transactions"), 3);
        assert_eq!(row_count(&conn, "transaction_groups"), 1);
        assert_eq!(member_ids(&conn, result.group_id.unwrap()).unwrap().len(), 3);
    }

    #[test]
    fn test_collapse_three_to_single() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let created = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000), entry(f.fun, 25_000)]),
        )
        .unwrap();
        let keep = created.transaction_ids[0];

        let mut collapsed = draft(
            &f,
            vec![SplitEntry {
                transaction_id: Some(keep),
                category_account_id: f.food,
                amount_minor: 175_000,
                notes: None,
            }],
        );
        collapsed.group_id = created.group_id;
        let result = update_split_expense(&mut conn, &collapsed).unwrap();

        assert!(result.group_id.is_none());
        assert_eq!(result.transaction_ids, vec![keep]);
        assert_eq!(row_count(&conn, "transactions"), 1);
        assert_eq!(row_count(&conn, "transaction_groups"), 0);
        assert_eq!(row_count(&conn, "transaction_group_members"), 0);
        let survivor = crate::ledger::get_transaction(&conn, keep).unwrap();
        assert_eq!(survivor.amount_minor, 175_000);
    }

    #[test]
    fn test_update_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let created = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]),
        )
        .unwrap();

        let resubmit = read_split_as_draft(&conn, created.transaction_ids[0]).unwrap();
        let first = update_split_expense(&mut conn, &resubmit).unwrap();
        let second = update_split_expense(&mut conn, &resubmit).unwrap();

        assert_eq!(first.transaction_ids, second.transaction_ids);
        assert_eq!(first.group_id, second.group_id);
        assert_eq!(row_count(&conn, "transactions"), 2);
        assert_eq!(row_count(&conn, "transaction_group_members"), 2);
        assert_eq!(row_count(&conn, "transaction_groups"), 1);
    }

    #[test]
    fn test_dropped_entry_row_is_deleted() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let created = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000), entry(f.fun, 25_000)]),
        )
        .unwrap();
        let dropped = created.transaction_ids[2];

        let mut resubmit = read_split_as_draft(&conn, created.transaction_ids[0]).unwrap();
        resubmit.entries.retain(|e| e.transaction_id != Some(dropped));
        resubmit.total_minor = resubmit.entries.iter().map(|e| e.amount_minor).sum();
        let result = update_split_expense(&mut conn, &resubmit).unwrap();

        assert_eq!(result.transaction_ids.len(), 2);
        assert_eq!(crate::ledger::get_transaction(&conn, dropped).unwrap_err().code(), "not_found");
        assert_eq!(member_ids(&conn, created.group_id.unwrap()).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_group_id_is_not_found() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let mut d = draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]);
        d.group_id = Some(999);
        assert_eq!(update_split_expense(&mut conn, &d).unwrap_err().code(), "not_found");
    }

    #[test]
    fn test_read_round_trips_both_shapes() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let single = create_split_expense(&mut conn, &draft(&f, vec![entry(f.food, 80_000)])).unwrap();
        let loaded = read_split_as_draft(&conn, single.transaction_ids[0]).unwrap();
        assert!(loaded.group_id.is_none());
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.total_minor, 80_000);
        assert_eq!(loaded.payment_account_id, f.payment);

        let multi = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]),
        )
        .unwrap();
        let loaded = read_split_as_draft(&conn, multi.transaction_ids[1]).unwrap();
        assert_eq!(loaded.group_id, multi.group_id);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.total_minor, 150_000);
    }

    #[test]
    fn test_deleting_last_member_removes_group() {
        let (_dir, mut conn) = test_db();
        let f = fixture(&conn);
        let created = create_split_expense(
            &mut conn,
            &draft(&f, vec![entry(f.food, 100_000), entry(f.fuel, 50_000)]),
        )
        .unwrap();
        for id in &created.transaction_ids {
            crate::ledger::delete_transaction(&mut conn, *id).unwrap();
        }
        assert_eq!(row_count(&conn, "transaction_groups"), 0);
    }
}
