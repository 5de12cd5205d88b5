use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::models::{
    pack_flags, unpack_flags, Account, AccountImportRow, AccountType, NewAccount, LIABILITY_ROOT,
};

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    let flags: i64 = row.get(4)?;
    let (active, countable, visible) = unpack_flags(flags);
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        currency: row.get(3)?,
        active,
        countable,
        visible,
        icon_name: row.get(5)?,
        color_hex: row.get(6)?,
        bill_date: row.get(7)?,
        payment_date: row.get(8)?,
        credit_limit_minor: row.get(9)?,
    })
}

const ACCOUNT_COLS: &str =
    "id, name, parent_id, currency, flags, icon_name, color_hex, bill_date, payment_date, credit_limit_minor";

fn validate_day_of_month(field: &str, day: Option<i64>) -> Result<()> {
    if let Some(d) = day {
        if !(1..=28).contains(&d) {
            return Err(TallyError::InvalidArgument(format!(
                "{field} must be between 1 and 28, got {d}"
            )));
        }
    }
    Ok(())
}

fn validate_new_account(conn: &Connection, account: &NewAccount) -> Result<()> {
    if account.name.trim().is_empty() {
        return Err(TallyError::InvalidArgument("account name is empty".to_string()));
    }
    if account.currency.trim().is_empty() {
        return Err(TallyError::InvalidArgument("account currency is empty".to_string()));
    }
    validate_day_of_month("bill_date", account.bill_date)?;
    validate_day_of_month("payment_date", account.payment_date)?;
    // Parent must exist; every non-root account hangs off the tree.
    get_account(conn, account.parent_id)?;
    Ok(())
}

pub fn create_account(conn: &Connection, account: &NewAccount) -> Result<i64> {
    validate_new_account(conn, account)?;
    conn.execute(
        "INSERT INTO accounts (name, parent_id, currency, flags, icon_name, color_hex, bill_date, payment_date, credit_limit_minor) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            account.name,
            account.parent_id,
            account.currency,
            pack_flags(account.active, account.countable, account.visible),
            account.icon_name,
            account.color_hex,
            account.bill_date,
            account.payment_date,
            account.credit_limit_minor,
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, name = %account.name, "created account");
    Ok(id)
}

pub fn update_account(conn: &Connection, id: i64, account: &NewAccount) -> Result<()> {
    let existing = get_account(conn, id)?;
    if existing.parent_id.is_none() {
        return Err(TallyError::InvalidArgument(format!(
            "root account {id} cannot be modified"
        )));
    }
    validate_new_account(conn, account)?;
    // Re-parenting must not make the account its own ancestor.
    let mut cursor = Some(account.parent_id);
    let mut seen = HashSet::new();
    while let Some(current) = cursor {
        if current == id {
            return Err(TallyError::InvalidArgument(format!(
                "moving account {id} under {} would create a cycle",
                account.parent_id
            )));
        }
        if !seen.insert(current) {
            return Err(TallyError::Consistency(format!(
                "account hierarchy contains a cycle at account {current}"
            )));
        }
        cursor = get_account(conn, current)?.parent_id;
    }
    conn.execute(
        "UPDATE accounts SET name = ?1, parent_id = ?2, currency = ?3, flags = ?4, icon_name = ?5, \
         color_hex = ?6, bill_date = ?7, payment_date = ?8, credit_limit_minor = ?9, \
         updated_at = datetime('now') WHERE id = ?10",
        rusqlite::params![
            account.name,
            account.parent_id,
            account.currency,
            pack_flags(account.active, account.countable, account.visible),
            account.icon_name,
            account.color_hex,
            account.bill_date,
            account.payment_date,
            account.credit_limit_minor,
            id,
        ],
    )?;
    debug!(id, "updated account");
    Ok(())
}

/// Hard delete. Normal flows deactivate via the `active` flag instead;
/// roots and accounts still referenced by the tree or the ledger stay.
pub fn delete_account(conn: &Connection, id: i64) -> Result<()> {
    let existing = get_account(conn, id)?;
    if existing.parent_id.is_none() {
        return Err(TallyError::InvalidArgument(format!(
            "root account {id} cannot be deleted"
        )));
    }
    let children: i64 = conn.query_row(
        "SELECT count(*) FROM accounts WHERE parent_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    if children > 0 {
        return Err(TallyError::Consistency(format!(
            "account {id} still has {children} child account(s)"
        )));
    }
    let postings: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE debit_account_id = ?1 OR credit_account_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    if postings > 0 {
        return Err(TallyError::Consistency(format!(
            "account {id} is referenced by {postings} transaction(s)"
        )));
    }
    conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
    debug!(id, "deleted account");
    Ok(())
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account> {
    let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id = ?1");
    conn.query_row(&sql, [id], row_to_account)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => TallyError::NotFound(format!("account {id}")),
            other => TallyError::Db(other),
        })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_account)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn list_active(conn: &Connection) -> Result<Vec<Account>> {
    Ok(list_accounts(conn)?.into_iter().filter(|a| a.active).collect())
}

/// Walk `parent_id` links to a root and map the root's fixed id to an
/// accounting type. A visited set guards against corrupt, cyclic
/// hierarchies; without it a bad parent link would loop forever.
pub fn resolve_type(conn: &Connection, account_id: i64) -> Result<AccountType> {
    let mut seen = HashSet::new();
    let mut current = account_id;
    loop {
        if !seen.insert(current) {
            return Err(TallyError::Consistency(format!(
                "account hierarchy contains a cycle at account {current}"
            )));
        }
        let account = get_account(conn, current)?;
        match account.parent_id {
            Some(parent) => current = parent,
            None => {
                return AccountType::from_root_id(account.id).ok_or_else(|| {
                    TallyError::Consistency(format!(
                        "account {} has no parent but is not one of the five roots",
                        account.id
                    ))
                });
            }
        }
    }
}

/// Balance in minor units: debits to the account minus credits from it,
/// aggregated on demand. Never cached, never stored — the transaction
/// log is the only source of truth.
pub fn balance_of(conn: &Connection, account_id: i64, as_of: Option<&str>) -> Result<i64> {
    get_account(conn, account_id)?;
    let cutoff = as_of.unwrap_or("9999-12-31");
    let debits: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_minor), 0) FROM transactions \
         WHERE debit_account_id = ?1 AND date <= ?2",
        rusqlite::params![account_id, cutoff],
        |r| r.get(0),
    )?;
    let credits: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_minor), 0) FROM transactions \
         WHERE credit_account_id = ?1 AND date <= ?2",
        rusqlite::params![account_id, cutoff],
        |r| r.get(0),
    )?;
    Ok(debits - credits)
}

/// Find or create an invisible liability account for a lender. Loan
/// bootstrapping calls this so repeat loans from the same lender share
/// one account.
pub fn get_or_create_hidden_liability(conn: &Connection, name: &str) -> Result<i64> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM accounts WHERE name = ?1 AND parent_id = ?2",
            rusqlite::params![name, LIABILITY_ROOT],
            |r| r.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if let Some(id) = found {
        return Ok(id);
    }
    let mut account = NewAccount::under(name, LIABILITY_ROOT);
    account.visible = false;
    account.countable = false;
    create_account(conn, &account)
}

/// Consume pre-parsed import rows. Parent names resolve against the five
/// root names first, then accounts created earlier in this batch, then
/// any existing account by name.
pub fn import_accounts(conn: &Connection, rows: &[AccountImportRow]) -> Result<Vec<i64>> {
    let mut by_name: HashMap<String, i64> = HashMap::new();
    for account in list_accounts(conn)? {
        by_name.entry(account.name.clone()).or_insert(account.id);
    }
    let mut created = Vec::with_capacity(rows.len());
    for row in rows {
        let parent_id = *by_name.get(&row.parent_name).ok_or_else(|| {
            TallyError::NotFound(format!("parent account '{}'", row.parent_name))
        })?;
        let id = create_account(
            conn,
            &NewAccount {
                name: row.name.clone(),
                parent_id,
                currency: row.currency.clone(),
                active: row.is_active,
                countable: row.is_countable,
                visible: row.is_visible,
                icon_name: row.icon_name.clone(),
                color_hex: row.color_hex.clone(),
                bill_date: None,
                payment_date: None,
                credit_limit_minor: -1,
            },
        )?;
        // Root names stay bound to the roots; a batch row that happens to
        // share one must not capture later parent_name lookups.
        if !crate::db::ROOT_ACCOUNTS.iter().any(|(_, name)| *name == row.name) {
            by_name.insert(row.name.clone(), id);
        }
        created.push(id);
    }
    debug!(count = created.len(), "imported accounts");
    Ok(created)
}
