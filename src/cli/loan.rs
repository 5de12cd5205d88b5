use comfy_table::{Cell, Table};

use crate::amount::{parse_amount, to_display, to_minor_units};
use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::ledger::{self, LoanRequest};
use crate::loan;
use crate::models::LoanType;

#[allow(clippy::too_many_arguments)]
pub fn create(
    amount: &str,
    borrower: i64,
    lender: &str,
    loan_type: &str,
    rate: f64,
    months: u32,
    payment_day: Option<i64>,
    start: &str,
) -> Result<()> {
    let mut conn = open_db()?;
    let created = ledger::create_loan(
        &mut conn,
        &LoanRequest {
            principal_minor: parse_amount(amount)?,
            borrower_account_id: borrower,
            lender_name: lender.to_string(),
            loan_type: LoanType::parse(loan_type)?,
            annual_rate_percent: rate,
            months,
            payment_day,
            start_date: start.to_string(),
        },
    )?;
    println!(
        "Created loan group {}: liability account {}, {} planned payment(s)",
        created.group_id,
        created.liability_account_id,
        created.planned_transaction_ids.len()
    );
    Ok(())
}

pub fn schedule(amount: &str, loan_type: &str, rate: f64, months: u32) -> Result<()> {
    let principal = to_display(parse_amount(amount)?);
    let payments = loan::schedule(principal, rate, months, LoanType::parse(loan_type)?)?;

    let mut table = Table::new();
    table.set_header(vec!["Period", "Principal", "Interest", "Total"]);
    for (index, payment) in payments.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(money(to_minor_units(payment.principal))),
            Cell::new(money(to_minor_units(payment.interest))),
            Cell::new(money(to_minor_units(payment.total))),
        ]);
    }
    println!("Schedule\n{table}");
    Ok(())
}
