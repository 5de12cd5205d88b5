use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{save_settings, Settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    match std::env::var("TALLY_DATA_DIR").ok().filter(|d| !d.is_empty()) {
        Some(dir) => std::fs::create_dir_all(dir)?,
        None => {
            let mut settings = Settings::default();
            if let Some(dir) = data_dir {
                settings.data_dir = dir;
            }
            std::fs::create_dir_all(&settings.data_dir)?;
            save_settings(&settings)?;
        }
    }

    let db_path = crate::settings::db_path();
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    println!("{} ledger at {}", "Initialized".green(), db_path.display());
    println!("Root accounts: 1=Asset 2=Liability 3=Equity 4=Revenue 5=Expense");
    Ok(())
}
