use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Accounting type, derived by walking an account's parents to one of the
/// five fixed roots. Never stored on the account row itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

pub const ASSET_ROOT: i64 = 1;
pub const LIABILITY_ROOT: i64 = 2;
pub const EQUITY_ROOT: i64 = 3;
pub const REVENUE_ROOT: i64 = 4;
pub const EXPENSE_ROOT: i64 = 5;

impl AccountType {
    pub fn from_root_id(id: i64) -> Option<AccountType> {
        match id {
            ASSET_ROOT => Some(AccountType::Asset),
            LIABILITY_ROOT => Some(AccountType::Liability),
            EQUITY_ROOT => Some(AccountType::Equity),
            REVENUE_ROOT => Some(AccountType::Revenue),
            EXPENSE_ROOT => Some(AccountType::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "Asset",
            AccountType::Liability => "Liability",
            AccountType::Equity => "Equity",
            AccountType::Revenue => "Revenue",
            AccountType::Expense => "Expense",
        }
    }
}

// Flag bits, storage layout only. The model always carries three booleans.
const FLAG_ACTIVE: i64 = 1;
const FLAG_COUNTABLE: i64 = 2;
const FLAG_VISIBLE: i64 = 4;

pub fn pack_flags(active: bool, countable: bool, visible: bool) -> i64 {
    let mut flags = 0;
    if active {
        flags |= FLAG_ACTIVE;
    }
    if countable {
        flags |= FLAG_COUNTABLE;
    }
    if visible {
        flags |= FLAG_VISIBLE;
    }
    flags
}

pub fn unpack_flags(flags: i64) -> (bool, bool, bool) {
    (
        flags & FLAG_ACTIVE != 0,
        flags & FLAG_COUNTABLE != 0,
        flags & FLAG_VISIBLE != 0,
    )
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub currency: String,
    pub active: bool,
    pub countable: bool,
    pub visible: bool,
    pub icon_name: Option<String>,
    pub color_hex: Option<String>,
    pub bill_date: Option<i64>,
    pub payment_date: Option<i64>,
    /// −1 means no credit limit applies.
    pub credit_limit_minor: i64,
}

/// Input shape for account creation; also the target of batch import rows.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub parent_id: i64,
    pub currency: String,
    pub active: bool,
    pub countable: bool,
    pub visible: bool,
    pub icon_name: Option<String>,
    pub color_hex: Option<String>,
    pub bill_date: Option<i64>,
    pub payment_date: Option<i64>,
    pub credit_limit_minor: i64,
}

impl NewAccount {
    pub fn under(name: &str, parent_id: i64) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            parent_id,
            currency: "USD".to_string(),
            active: true,
            countable: true,
            visible: true,
            icon_name: None,
            color_hex: None,
            bill_date: None,
            payment_date: None,
            credit_limit_minor: -1,
        }
    }
}

/// A pre-parsed import row. The importer (out of process) handles CSV;
/// the engine only maps `parent_name` to an account id and inserts.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountImportRow {
    pub name: String,
    pub parent_name: String,
    pub currency: String,
    pub is_active: bool,
    pub is_countable: bool,
    pub is_visible: bool,
    pub icon_name: Option<String>,
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Planned,
    Estimated,
    Confirmed,
}

impl TxnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::Planned => "planned",
            TxnState::Estimated => "estimated",
            TxnState::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Result<TxnState> {
        match s {
            "planned" => Ok(TxnState::Planned),
            "estimated" => Ok(TxnState::Estimated),
            "confirmed" => Ok(TxnState::Confirmed),
            other => Err(TallyError::InvalidArgument(format!(
                "unknown transaction state '{other}'"
            ))),
        }
    }
}

/// User-facing transaction verbs. Only the first three may pass through
/// the generic create/update path; loan verbs go through `create_loan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Expense,
    Income,
    Transfer,
    Loan,
    LoanPayment,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Expense => "expense",
            Verb::Income => "income",
            Verb::Transfer => "transfer",
            Verb::Loan => "loan",
            Verb::LoanPayment => "loan_payment",
        }
    }

    pub fn parse(s: &str) -> Result<Verb> {
        match s {
            "expense" => Ok(Verb::Expense),
            "income" => Ok(Verb::Income),
            "transfer" => Ok(Verb::Transfer),
            "loan" => Ok(Verb::Loan),
            "loan_payment" => Ok(Verb::LoanPayment),
            other => Err(TallyError::InvalidArgument(format!("unknown verb '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub amount_minor: i64,
    pub debit_account_id: i64,
    pub credit_account_id: i64,
    pub date: String,
    pub transfer_group_id: Option<String>,
    pub payee: Option<String>,
    pub member: Option<String>,
    pub notes: Option<String>,
    pub state: TxnState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    Loan,
    Installment,
    Split,
    Custom,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Loan => "loan",
            GroupType::Installment => "installment",
            GroupType::Split => "split",
            GroupType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Result<GroupType> {
        match s {
            "loan" => Ok(GroupType::Loan),
            "installment" => Ok(GroupType::Installment),
            "split" => Ok(GroupType::Split),
            "custom" => Ok(GroupType::Custom),
            other => Err(TallyError::InvalidArgument(format!(
                "unknown group type '{other}'"
            ))),
        }
    }
}

/// A logical grouping of transactions. Stores no total and no status;
/// both are always derived from member rows.
#[derive(Debug, Clone)]
pub struct TransactionGroup {
    pub id: i64,
    pub label: String,
    pub name: String,
    pub group_type: GroupType,
    pub description: Option<String>,
}

/// One line of a split expense as submitted by the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Set when the line corresponds to an already-persisted transaction.
    pub transaction_id: Option<i64>,
    pub category_account_id: i64,
    pub amount_minor: i64,
    pub notes: Option<String>,
}

/// Transient editing shape for a split expense; never persisted as such.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitExpenseDraft {
    pub group_id: Option<i64>,
    pub payment_account_id: i64,
    pub date: String,
    pub total_minor: i64,
    pub entries: Vec<SplitEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanType {
    InterestFirst,
    EqualPrincipal,
    EqualInstallment,
}

impl LoanType {
    pub fn parse(s: &str) -> Result<LoanType> {
        match s {
            "interest_first" => Ok(LoanType::InterestFirst),
            "equal_principal" => Ok(LoanType::EqualPrincipal),
            "equal_installment" => Ok(LoanType::EqualInstallment),
            other => Err(TallyError::InvalidArgument(format!(
                "unknown loan type '{other}'"
            ))),
        }
    }
}

/// One computed amortization period. Display units; materialized into
/// Planned transactions, never stored as a row itself.
#[derive(Debug, Clone, Copy)]
pub struct LoanPayment {
    pub principal: f64,
    pub interest: f64,
    pub total: f64,
}
