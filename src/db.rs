use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id INTEGER,
    currency TEXT NOT NULL DEFAULT 'USD',
    flags INTEGER NOT NULL DEFAULT 7,
    icon_name TEXT,
    color_hex TEXT,
    bill_date INTEGER,
    payment_date INTEGER,
    credit_limit_minor INTEGER NOT NULL DEFAULT -1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (parent_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    amount_minor INTEGER NOT NULL CHECK (amount_minor > 0),
    debit_account_id INTEGER NOT NULL,
    credit_account_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    transfer_group_id TEXT,
    payee TEXT,
    member TEXT,
    notes TEXT,
    state TEXT NOT NULL DEFAULT 'confirmed',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    CHECK (debit_account_id <> credit_account_id),
    FOREIGN KEY (debit_account_id) REFERENCES accounts(id),
    FOREIGN KEY (credit_account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS transaction_groups (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    group_type TEXT NOT NULL,
    description TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transaction_group_members (
    transaction_id INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    PRIMARY KEY (transaction_id, group_id),
    FOREIGN KEY (transaction_id) REFERENCES transactions(id),
    FOREIGN KEY (group_id) REFERENCES transaction_groups(id)
);

CREATE INDEX IF NOT EXISTS idx_txn_debit ON transactions(debit_account_id, date);
CREATE INDEX IF NOT EXISTS idx_txn_credit ON transactions(credit_account_id, date);
CREATE INDEX IF NOT EXISTS idx_txn_transfer ON transactions(transfer_group_id);
CREATE INDEX IF NOT EXISTS idx_member_group ON transaction_group_members(group_id);
";

// (id, name) — the five fixed roots. Ids are load-bearing: an account's
// accounting type is derived from which root its parent chain reaches.
pub(crate) const ROOT_ACCOUNTS: &[(i64, &str)] = &[
    (1, "Asset"),
    (2, "Liability"),
    (3, "Equity"),
    (4, "Revenue"),
    (5, "Expense"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    for (id, name) in ROOT_ACCOUNTS {
        conn.execute(
            "INSERT OR IGNORE INTO accounts (id, name, parent_id, flags) VALUES (?1, ?2, NULL, 7)",
            rusqlite::params![id, name],
        )?;
    }
    Ok(())
}
