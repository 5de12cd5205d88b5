mod accounts;
mod amount;
mod cli;
mod db;
mod error;
mod fmt;
mod groups;
mod ledger;
mod loan;
mod models;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AccountsCommands, Cli, Commands, LoanCommands, SplitCommands, TxnCommands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                parent,
                currency,
                bill_date,
                payment_date,
            } => cli::accounts::add(&name, parent, currency.as_deref(), bill_date, payment_date),
            AccountsCommands::List { all } => cli::accounts::list(all),
            AccountsCommands::Import { file } => cli::accounts::import(&file),
            AccountsCommands::Delete { id } => cli::accounts::delete(id),
        },
        Commands::Txn { command } => match command {
            TxnCommands::Add {
                verb,
                amount,
                primary,
                secondary,
                date,
                payee,
                notes,
            } => cli::txn::add(&verb, &amount, primary, secondary, &date, payee, notes),
            TxnCommands::Update {
                id,
                verb,
                amount,
                primary,
                secondary,
                date,
                payee,
                notes,
            } => cli::txn::update(id, &verb, &amount, primary, secondary, &date, payee, notes),
            TxnCommands::Delete { id } => cli::txn::delete(id),
            TxnCommands::List { from, to } => cli::txn::list(&from, &to),
        },
        Commands::Split { command } => match command {
            SplitCommands::Create {
                payment,
                date,
                entries,
            } => cli::split::create(payment, &date, &entries),
            SplitCommands::Show { id } => cli::split::show(id),
            SplitCommands::Apply { file } => cli::split::apply(&file),
        },
        Commands::Loan { command } => match command {
            LoanCommands::Create {
                amount,
                borrower,
                lender,
                loan_type,
                rate,
                months,
                payment_day,
                start,
            } => cli::loan::create(
                &amount,
                borrower,
                &lender,
                &loan_type,
                rate,
                months,
                payment_day,
                &start,
            ),
            LoanCommands::Schedule {
                amount,
                loan_type,
                rate,
                months,
            } => cli::loan::schedule(&amount, &loan_type, rate, months),
        },
        Commands::Balance { account, as_of } => cli::balance::run(account, as_of.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {e}", e.code());
        std::process::exit(1);
    }
}
