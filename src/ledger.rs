use chrono::{Duration, NaiveDate};
use rand::Rng;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::accounts;
use crate::amount;
use crate::error::{Result, TallyError};
use crate::groups;
use crate::loan;
use crate::models::{AccountType, GroupType, LoanType, Transaction, TxnState, Verb};

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| TallyError::InvalidArgument(format!("malformed date '{s}': expected YYYY-MM-DD")))
}

/// Input shape for the generic transaction path. `primary_account_id` is
/// always the debit side of the derived pair; `secondary_account_id` the
/// credit side (payment source, revenue source, or transfer source).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub verb: Verb,
    pub amount_minor: i64,
    pub date: String,
    pub primary_account_id: i64,
    pub secondary_account_id: Option<i64>,
    pub state: TxnState,
    pub payee: Option<String>,
    pub member: Option<String>,
    pub notes: Option<String>,
}

fn new_transfer_token() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}", rng.gen::<u64>())
}

/// The core verb → debit/credit translation:
///
///   Expense:  debit expense-subtree account, credit payment account
///   Income:   debit asset destination,       credit revenue account
///   Transfer: debit destination,             credit source
///
/// Transfers additionally get a random classification token. One row is
/// created per transfer; the token marks it, it never implies a twin row.
fn derive_pair(input: &NewTransaction) -> Result<(i64, i64, Option<String>)> {
    match input.verb {
        Verb::Loan | Verb::LoanPayment => {
            return Err(TallyError::Unsupported(format!(
                "verb '{}' cannot go through the generic transaction path; use the loan flow",
                input.verb.as_str()
            )));
        }
        Verb::Expense | Verb::Income | Verb::Transfer => {}
    }
    let secondary = input.secondary_account_id.ok_or_else(|| {
        TallyError::InvalidArgument(format!(
            "verb '{}' requires a secondary account",
            input.verb.as_str()
        ))
    })?;
    if secondary == input.primary_account_id {
        return Err(TallyError::InvalidArgument(
            "debit and credit accounts must differ".to_string(),
        ));
    }
    let token = match input.verb {
        Verb::Transfer => Some(new_transfer_token()),
        _ => None,
    };
    Ok((input.primary_account_id, secondary, token))
}

fn validate_common(conn: &Connection, input: &NewTransaction) -> Result<()> {
    if input.amount_minor <= 0 {
        return Err(TallyError::InvalidArgument(format!(
            "amount must be positive, got {} minor units",
            input.amount_minor
        )));
    }
    parse_date(&input.date)?;
    accounts::get_account(conn, input.primary_account_id)?;
    if let Some(secondary) = input.secondary_account_id {
        accounts::get_account(conn, secondary)?;
    }
    Ok(())
}

pub fn create_transaction(conn: &Connection, input: &NewTransaction) -> Result<i64> {
    validate_common(conn, input)?;
    let (debit, credit, token) = derive_pair(input)?;
    conn.execute(
        "INSERT INTO transactions (amount_minor, debit_account_id, credit_account_id, date, \
         transfer_group_id, payee, member, notes, state) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            input.amount_minor,
            debit,
            credit,
            input.date,
            token,
            input.payee,
            input.member,
            input.notes,
            input.state.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(id, verb = input.verb.as_str(), amount = input.amount_minor, "created transaction");
    Ok(id)
}

/// Re-derives the debit/credit pair from the new verb and selections.
/// The transfer token follows the verb: kept when the row stays a
/// transfer, cleared when it stops being one, stamped when it becomes one.
pub fn update_transaction(conn: &Connection, id: i64, input: &NewTransaction) -> Result<()> {
    let existing = get_transaction(conn, id)?;
    validate_common(conn, input)?;
    let (debit, credit, fresh_token) = derive_pair(input)?;
    let token = match input.verb {
        Verb::Transfer => existing.transfer_group_id.or(fresh_token),
        _ => None,
    };
    conn.execute(
        "UPDATE transactions SET amount_minor = ?1, debit_account_id = ?2, credit_account_id = ?3, \
         date = ?4, transfer_group_id = ?5, payee = ?6, member = ?7, notes = ?8, state = ?9, \
         updated_at = datetime('now') WHERE id = ?10",
        rusqlite::params![
            input.amount_minor,
            debit,
            credit,
            input.date,
            token,
            input.payee,
            input.member,
            input.notes,
            input.state.as_str(),
            id,
        ],
    )?;
    debug!(id, "updated transaction");
    Ok(())
}

/// Deletes the row, any rows sharing its transfer token, their group
/// memberships, and any groups left empty. Balances are computed on
/// demand, so removing rows needs no compensating adjustment.
pub fn delete_transaction(conn: &mut Connection, id: i64) -> Result<()> {
    let existing = get_transaction(conn, id)?;
    let tx = conn.transaction()?;
    let doomed: Vec<i64> = match &existing.transfer_group_id {
        Some(token) => {
            let mut stmt = tx.prepare("SELECT id FROM transactions WHERE transfer_group_id = ?1")?;
            let ids = stmt
                .query_map([token], |r| r.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        }
        None => vec![id],
    };
    for txn_id in &doomed {
        let group_ids: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT group_id FROM transaction_group_members WHERE transaction_id = ?1")?;
            let ids = stmt
                .query_map([txn_id], |r| r.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        tx.execute("DELETE FROM transaction_group_members WHERE transaction_id = ?1", [txn_id])?;
        tx.execute("DELETE FROM transactions WHERE id = ?1", [txn_id])?;
        for group_id in group_ids {
            groups::delete_group_if_empty(&tx, group_id)?;
        }
    }
    tx.commit()?;
    debug!(id, removed = doomed.len(), "deleted transaction");
    Ok(())
}

pub(crate) const TXN_COLS: &str =
    "id, amount_minor, debit_account_id, credit_account_id, date, transfer_group_id, payee, member, notes, state";

pub(crate) fn row_to_txn(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let state: String = row.get(9)?;
    Ok(Transaction {
        id: row.get(0)?,
        amount_minor: row.get(1)?,
        debit_account_id: row.get(2)?,
        credit_account_id: row.get(3)?,
        date: row.get(4)?,
        transfer_group_id: row.get(5)?,
        payee: row.get(6)?,
        member: row.get(7)?,
        notes: row.get(8)?,
        state: TxnState::parse(&state).unwrap_or(TxnState::Confirmed),
    })
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let sql = format!("SELECT {TXN_COLS} FROM transactions WHERE id = ?1");
    conn.query_row(&sql, [id], row_to_txn).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => TallyError::NotFound(format!("transaction {id}")),
        other => TallyError::Db(other),
    })
}

pub fn list_by_account(conn: &Connection, account_id: i64) -> Result<Vec<Transaction>> {
    accounts::get_account(conn, account_id)?;
    let sql = format!(
        "SELECT {TXN_COLS} FROM transactions \
         WHERE debit_account_id = ?1 OR credit_account_id = ?1 ORDER BY date, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([account_id], row_to_txn)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn list_by_date_range(conn: &Connection, from: &str, to: &str) -> Result<Vec<Transaction>> {
    parse_date(from)?;
    parse_date(to)?;
    let sql = format!(
        "SELECT {TXN_COLS} FROM transactions WHERE date BETWEEN ?1 AND ?2 ORDER BY date, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([from, to], row_to_txn)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Re-derive the user-facing verb for display from the account types on
/// each side of the row. Transfer-tagged rows short-circuit.
pub fn derive_verb(conn: &Connection, txn: &Transaction) -> Result<Verb> {
    if txn.transfer_group_id.is_some() {
        return Ok(Verb::Transfer);
    }
    let debit_type = accounts::resolve_type(conn, txn.debit_account_id)?;
    let credit_type = accounts::resolve_type(conn, txn.credit_account_id)?;
    Ok(match (debit_type, credit_type) {
        (AccountType::Expense, _) => Verb::Expense,
        (_, AccountType::Revenue) => Verb::Income,
        (AccountType::Asset, AccountType::Liability) => Verb::Loan,
        (AccountType::Liability, AccountType::Asset) => Verb::LoanPayment,
        _ => Verb::Transfer,
    })
}

pub fn list_with_verb(conn: &Connection, from: &str, to: &str) -> Result<Vec<(Transaction, Verb)>> {
    let txns = list_by_date_range(conn, from, to)?;
    let mut out = Vec::with_capacity(txns.len());
    for txn in txns {
        let verb = derive_verb(conn, &txn)?;
        out.push((txn, verb));
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct LoanRequest {
    pub principal_minor: i64,
    pub borrower_account_id: i64,
    pub lender_name: String,
    pub loan_type: LoanType,
    pub annual_rate_percent: f64,
    pub months: u32,
    pub payment_day: Option<i64>,
    pub start_date: String,
}

#[derive(Debug)]
pub struct LoanCreated {
    pub liability_account_id: i64,
    pub principal_transaction_id: i64,
    pub group_id: i64,
    pub planned_transaction_ids: Vec<i64>,
}

/// Bootstrap a loan: hidden lender liability, one Confirmed principal
/// row, a Loan group, and one Planned repayment row per schedule period
/// with an amount due. All rows land in a single write transaction.
///
/// Payment dates use the fixed 30-day period approximation
/// (`start_date + 30 × period days`), a retained modeling choice of the
/// product; see DESIGN.md.
pub fn create_loan(conn: &mut Connection, request: &LoanRequest) -> Result<LoanCreated> {
    if request.principal_minor <= 0 {
        return Err(TallyError::InvalidArgument(format!(
            "loan principal must be positive, got {} minor units",
            request.principal_minor
        )));
    }
    if let Some(day) = request.payment_day {
        if !(1..=28).contains(&day) {
            return Err(TallyError::InvalidArgument(format!(
                "payment day must be between 1 and 28, got {day}"
            )));
        }
    }
    if request.lender_name.trim().is_empty() {
        return Err(TallyError::InvalidArgument("lender name is empty".to_string()));
    }
    let start = parse_date(&request.start_date)?;
    if accounts::resolve_type(conn, request.borrower_account_id)? != AccountType::Asset {
        return Err(TallyError::InvalidArgument(format!(
            "borrower account {} is not an asset account",
            request.borrower_account_id
        )));
    }
    let payments = loan::schedule(
        amount::to_display(request.principal_minor),
        request.annual_rate_percent,
        request.months,
        request.loan_type,
    )?;

    let tx = conn.transaction()?;
    let liability_id = accounts::get_or_create_hidden_liability(&tx, &request.lender_name)?;
    if let Some(day) = request.payment_day {
        tx.execute(
            "UPDATE accounts SET payment_date = ?1, updated_at = datetime('now') WHERE id = ?2",
            rusqlite::params![day, liability_id],
        )?;
    }

    tx.execute(
        "INSERT INTO transactions (amount_minor, debit_account_id, credit_account_id, date, payee, notes, state) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            request.principal_minor,
            request.borrower_account_id,
            liability_id,
            request.start_date,
            request.lender_name,
            "loan principal",
            TxnState::Confirmed.as_str(),
        ],
    )?;
    let principal_txn_id = tx.last_insert_rowid();

    let group_id = groups::insert_group(
        &tx,
        start,
        &format!("Loan from {}", request.lender_name),
        GroupType::Loan,
        Some(&format!(
            "{} months at {}%",
            request.months, request.annual_rate_percent
        )),
    )?;
    groups::add_member(&tx, principal_txn_id, group_id)?;

    let mut planned_ids = Vec::with_capacity(payments.len());
    for (index, payment) in payments.iter().enumerate() {
        let due = start + Duration::days(30 * (index as i64 + 1));
        let total_minor = amount::to_minor_units(payment.total);
        // Zero-rate interest-only periods have nothing due; the store
        // only holds positive-amount rows.
        if total_minor == 0 {
            continue;
        }
        let notes = format!(
            "principal {} / interest {}",
            amount::to_display_string(amount::to_minor_units(payment.principal)),
            amount::to_display_string(amount::to_minor_units(payment.interest)),
        );
        tx.execute(
            "INSERT INTO transactions (amount_minor, debit_account_id, credit_account_id, date, payee, notes, state) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                total_minor,
                liability_id,
                request.borrower_account_id,
                due.format("%Y-%m-%d").to_string(),
                request.lender_name,
                notes,
                TxnState::Planned.as_str(),
            ],
        )?;
        let planned_id = tx.last_insert_rowid();
        groups::add_member(&tx, planned_id, group_id)?;
        planned_ids.push(planned_id);
    }
    tx.commit()?;
    info!(
        group_id,
        liability_id,
        periods = planned_ids.len(),
        lender = %request.lender_name,
        "created loan"
    );
    Ok(LoanCreated {
        liability_account_id: liability_id,
        principal_transaction_id: principal_txn_id,
        group_id,
        planned_transaction_ids: planned_ids,
    })
}
