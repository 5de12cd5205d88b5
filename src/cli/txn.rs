use comfy_table::{Cell, Table};

use crate::amount::parse_amount;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::ledger::{self, NewTransaction};
use crate::models::{TxnState, Verb};

#[allow(clippy::too_many_arguments)]
pub fn add(
    verb: &str,
    amount: &str,
    primary: i64,
    secondary: i64,
    date: &str,
    payee: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let conn = open_db()?;
    let id = ledger::create_transaction(
        &conn,
        &NewTransaction {
            verb: Verb::parse(verb)?,
            amount_minor: parse_amount(amount)?,
            date: date.to_string(),
            primary_account_id: primary,
            secondary_account_id: Some(secondary),
            state: TxnState::Confirmed,
            payee,
            member: None,
            notes,
        },
    )?;
    println!("Recorded transaction {id}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn update(
    id: i64,
    verb: &str,
    amount: &str,
    primary: i64,
    secondary: i64,
    date: &str,
    payee: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let conn = open_db()?;
    ledger::update_transaction(
        &conn,
        id,
        &NewTransaction {
            verb: Verb::parse(verb)?,
            amount_minor: parse_amount(amount)?,
            date: date.to_string(),
            primary_account_id: primary,
            secondary_account_id: Some(secondary),
            state: TxnState::Confirmed,
            payee,
            member: None,
            notes,
        },
    )?;
    println!("Updated transaction {id}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut conn = open_db()?;
    ledger::delete_transaction(&mut conn, id)?;
    println!("Deleted transaction {id}");
    Ok(())
}

pub fn list(from: &str, to: &str) -> Result<()> {
    let conn = open_db()?;
    let rows = ledger::list_with_verb(&conn, from, to)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Verb", "Amount", "Debit", "Credit", "State", "Payee"]);
    for (txn, verb) in rows {
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(&txn.date),
            Cell::new(verb.as_str()),
            Cell::new(money(txn.amount_minor)),
            Cell::new(txn.debit_account_id),
            Cell::new(txn.credit_account_id),
            Cell::new(txn.state.as_str()),
            Cell::new(txn.payee.unwrap_or_default()),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}
