pub mod accounts;
pub mod balance;
pub mod init;
pub mod loan;
pub mod split;
pub mod txn;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db;
use crate::error::Result;
use crate::settings;

pub(crate) fn open_db() -> Result<Connection> {
    let conn = db::get_connection(&settings::db_path())?;
    db::init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(name = "tally", about = "Double-entry personal ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up tally: choose a data directory and initialize the ledger.
    Init {
        /// Path for tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage the chart of accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Record and inspect transactions.
    Txn {
        #[command(subcommand)]
        command: TxnCommands,
    },
    /// Create and edit split expenses.
    Split {
        #[command(subcommand)]
        command: SplitCommands,
    },
    /// Borrow money and materialize repayment schedules.
    Loan {
        #[command(subcommand)]
        command: LoanCommands,
    },
    /// Show an account's balance, computed from the transaction log.
    Balance {
        /// Account ID
        account: i64,
        /// Cutoff date: YYYY-MM-DD (default: all time)
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add an account under a parent (roots: 1=Asset 2=Liability 3=Equity 4=Revenue 5=Expense).
    Add {
        /// Account name, e.g. 'Checking'
        name: String,
        /// Parent account ID
        #[arg(long)]
        parent: i64,
        /// Currency code (default: from settings)
        #[arg(long)]
        currency: Option<String>,
        /// Billing day of month (1-28)
        #[arg(long = "bill-date")]
        bill_date: Option<i64>,
        /// Payment day of month (1-28)
        #[arg(long = "payment-date")]
        payment_date: Option<i64>,
    },
    /// List accounts with their derived types and balances.
    List {
        /// Include inactive and hidden accounts
        #[arg(long)]
        all: bool,
    },
    /// Import accounts from a pre-parsed JSON rows file.
    Import {
        /// Path to a JSON array of {name, parent_name, currency, is_active, is_countable, is_visible}
        file: String,
    },
    /// Hard-delete an account (roots and referenced accounts refuse).
    Delete {
        /// Account ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TxnCommands {
    /// Record a transaction.
    Add {
        /// Verb: expense, income, transfer
        verb: String,
        /// Amount, up to 4 decimal places
        amount: String,
        /// Primary account ID (expense category / income destination / transfer destination)
        #[arg(long)]
        primary: i64,
        /// Secondary account ID (payment source / revenue source / transfer source)
        #[arg(long)]
        secondary: i64,
        /// Transaction date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Payee
        #[arg(long)]
        payee: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Re-derive a transaction from new selections.
    Update {
        /// Transaction ID
        id: i64,
        /// Verb: expense, income, transfer
        verb: String,
        /// Amount, up to 4 decimal places
        amount: String,
        #[arg(long)]
        primary: i64,
        #[arg(long)]
        secondary: i64,
        #[arg(long)]
        date: String,
        #[arg(long)]
        payee: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a transaction (and any row sharing its transfer tag).
    Delete {
        /// Transaction ID
        id: i64,
    },
    /// List transactions in a date range with derived verbs.
    List {
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: String,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand)]
pub enum SplitCommands {
    /// Create a split expense from one payment account.
    Create {
        /// Payment account ID (credited by every entry)
        #[arg(long)]
        payment: i64,
        /// Transaction date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Entry as 'category_id:amount', repeatable
        #[arg(long = "entry", required = true)]
        entries: Vec<String>,
    },
    /// Print a transaction's split draft as JSON for editing.
    Show {
        /// Any member transaction ID
        id: i64,
    },
    /// Apply an edited draft JSON file (reconciles rows and group).
    Apply {
        /// Path to a draft JSON file, as produced by `split show`
        file: String,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Borrow: create the lender liability, principal row, and planned repayments.
    Create {
        /// Principal amount
        amount: String,
        /// Borrower asset account ID (receives the principal)
        #[arg(long)]
        borrower: i64,
        /// Lender name (a hidden liability account is created or reused)
        #[arg(long)]
        lender: String,
        /// Loan type: interest_first, equal_principal, equal_installment
        #[arg(long = "type")]
        loan_type: String,
        /// Annual rate, percent
        #[arg(long)]
        rate: f64,
        /// Term in months
        #[arg(long)]
        months: u32,
        /// Payment day of month (1-28)
        #[arg(long = "payment-day")]
        payment_day: Option<i64>,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        start: String,
    },
    /// Preview an amortization schedule without writing anything.
    Schedule {
        /// Principal amount
        amount: String,
        #[arg(long = "type")]
        loan_type: String,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        months: u32,
    },
}
