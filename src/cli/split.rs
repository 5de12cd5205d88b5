use crate::amount::parse_amount;
use crate::cli::open_db;
use crate::error::{Result, TallyError};
use crate::groups;
use crate::models::{SplitEntry, SplitExpenseDraft};

/// Parse 'category_id:amount' into a draft entry.
fn parse_entry(raw: &str) -> Result<SplitEntry> {
    let (category, amount) = raw.split_once(':').ok_or_else(|| {
        TallyError::InvalidArgument(format!("bad entry '{raw}': expected category_id:amount"))
    })?;
    Ok(SplitEntry {
        transaction_id: None,
        category_account_id: category
            .parse()
            .map_err(|_| TallyError::InvalidArgument(format!("bad category id '{category}'")))?,
        amount_minor: parse_amount(amount)?,
        notes: None,
    })
}

pub fn create(payment: i64, date: &str, raw_entries: &[String]) -> Result<()> {
    let mut conn = open_db()?;
    let entries = raw_entries.iter().map(|e| parse_entry(e)).collect::<Result<Vec<_>>>()?;
    let total = entries.iter().map(|e| e.amount_minor).sum();
    let result = groups::create_split_expense(
        &mut conn,
        &SplitExpenseDraft {
            group_id: None,
            payment_account_id: payment,
            date: date.to_string(),
            total_minor: total,
            entries,
        },
    )?;
    match result.group_id {
        Some(group_id) => println!(
            "Created split group {group_id} with {} transaction(s)",
            result.transaction_ids.len()
        ),
        None => println!("Created transaction {}", result.transaction_ids[0]),
    }
    Ok(())
}

pub fn show(id: i64) -> Result<()> {
    let conn = open_db()?;
    let draft = groups::read_split_as_draft(&conn, id)?;
    let json = serde_json::to_string_pretty(&draft)
        .map_err(|e| TallyError::InvalidArgument(e.to_string()))?;
    println!("{json}");
    Ok(())
}

pub fn apply(file: &str) -> Result<()> {
    let mut conn = open_db()?;
    let content = std::fs::read_to_string(file)?;
    let draft: SplitExpenseDraft = serde_json::from_str(&content)
        .map_err(|e| TallyError::InvalidArgument(format!("bad draft file: {e}")))?;
    let result = groups::update_split_expense(&mut conn, &draft)?;
    println!(
        "Reconciled split: {} transaction(s), group {:?}",
        result.transaction_ids.len(),
        result.group_id
    );
    Ok(())
}
