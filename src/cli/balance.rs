use colored::Colorize;

use crate::accounts;
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;

pub fn run(account: i64, as_of: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let info = accounts::get_account(&conn, account)?;
    let balance = accounts::balance_of(&conn, account, as_of)?;
    let rendered = if balance < 0 {
        money(balance).red().to_string()
    } else {
        money(balance).green().to_string()
    };
    match as_of {
        Some(date) => println!("{} ({}) as of {date}: {rendered}", info.name, info.currency),
        None => println!("{} ({}): {rendered}", info.name, info.currency),
    }
    Ok(())
}
