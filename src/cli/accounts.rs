use comfy_table::{Cell, Table};

use crate::accounts;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{AccountImportRow, NewAccount};
use crate::settings;

pub fn add(
    name: &str,
    parent: i64,
    currency: Option<&str>,
    bill_date: Option<i64>,
    payment_date: Option<i64>,
) -> Result<()> {
    let conn = open_db()?;
    let mut account = NewAccount::under(name, parent);
    account.currency = currency
        .map(str::to_string)
        .unwrap_or_else(|| settings::load_settings().default_currency);
    account.bill_date = bill_date;
    account.payment_date = payment_date;
    let id = accounts::create_account(&conn, &account)?;
    println!("Added account {id}: {name}");
    Ok(())
}

pub fn list(all: bool) -> Result<()> {
    let conn = open_db()?;
    let listed = if all {
        accounts::list_accounts(&conn)?
    } else {
        accounts::list_active(&conn)?
            .into_iter()
            .filter(|a| a.visible)
            .collect()
    };

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Currency", "Balance"]);
    for account in listed {
        let account_type = accounts::resolve_type(&conn, account.id)?;
        let balance = accounts::balance_of(&conn, account.id, None)?;
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(&account.name),
            Cell::new(account_type.as_str()),
            Cell::new(&account.currency),
            Cell::new(money(balance)),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn import(file: &str) -> Result<()> {
    let conn = open_db()?;
    let content = std::fs::read_to_string(file)?;
    let rows: Vec<AccountImportRow> = serde_json::from_str(&content)
        .map_err(|e| crate::error::TallyError::InvalidArgument(format!("bad import file: {e}")))?;
    let ids = accounts::import_accounts(&conn, &rows)?;
    println!("Imported {} account(s)", ids.len());
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    accounts::delete_account(&conn, id)?;
    println!("Deleted account {id}");
    Ok(())
}
