use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub const PORTFOLIO_WITHDRAWALS_LABEL: &str = "Portfolio Withdrawals";
pub const INCOME_SHORTAGE_LABEL: &str = "Income Shortage";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    #[serde(alias = "taxDeferred", alias = "tax_deferred")]
    TaxDeferred,
    #[serde(alias = "taxFree", alias = "tax_free")]
    TaxFree,
    Taxable,
    Cash,
}

/// An account or holding. Only `balance`, `contribution` and `return_rate`
/// take part in the projection; the rest is carried for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub balance: f64,
    /// Annual amount in today's money, added only before retirement.
    pub contribution: f64,
    /// Annual return in percent, e.g. 7 for 7%.
    pub return_rate: f64,
    pub category: AssetCategory,
}

/// A recurring income such as a pension or annuity, active between two ages
/// inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStream {
    pub id: String,
    pub name: String,
    pub monthly_amount: f64,
    pub start_age: i32,
    pub end_age: i32,
    /// Cost-of-living adjustment in percent per year.
    pub cola_rate: f64,
    #[serde(default)]
    pub is_taxable: bool,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSettings {
    pub current_age: i32,
    pub retirement_age: i32,
    /// Last simulated age, inclusive.
    pub planning_horizon: i32,
    /// Target spending per month in today's money.
    pub monthly_spending: f64,
    pub inflation_rate: f64,
    /// Kept for the input contract; each asset carries its own return rate.
    #[serde(default)]
    pub pre_retirement_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BreakdownLine {
    Income { name: String, amount: f64 },
    PortfolioWithdrawals(f64),
    IncomeShortage(f64),
}

impl BreakdownLine {
    pub fn label(&self) -> &str {
        match self {
            BreakdownLine::Income { name, .. } => name,
            BreakdownLine::PortfolioWithdrawals(_) => PORTFOLIO_WITHDRAWALS_LABEL,
            BreakdownLine::IncomeShortage(_) => INCOME_SHORTAGE_LABEL,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            BreakdownLine::Income { amount, .. } => *amount,
            BreakdownLine::PortfolioWithdrawals(amount) => *amount,
            BreakdownLine::IncomeShortage(amount) => *amount,
        }
    }
}

/// Where a year's money came from. Serializes as a JSON object keyed by
/// label, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Breakdown {
    lines: Vec<BreakdownLine>,
}

impl Breakdown {
    pub fn push(&mut self, line: BreakdownLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[BreakdownLine] {
        &self.lines
    }

    /// Flattens to `(label, amount)` pairs. A repeated label keeps the
    /// position of its first occurrence and the amount of its last.
    pub fn entries(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let label = line.label();
            match entries.iter_mut().find(|(existing, _)| *existing == label) {
                Some(entry) => entry.1 = line.amount(),
                None => entries.push((label, line.amount())),
            }
        }
        entries
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(existing, _)| *existing == label)
            .map(|(_, amount)| amount)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }
}

impl Serialize for Breakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (label, amount) in entries {
            map.serialize_entry(label, &amount)?;
        }
        map.end()
    }
}

/// One simulated year. Monetary fields are rounded to whole units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearData {
    pub age: i32,
    pub year: i32,
    pub expenses: f64,
    pub income: f64,
    pub balance: f64,
    pub shortfall: f64,
    pub withdrawals: f64,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub success: bool,
    pub depletion_age: Option<i32>,
    /// Unrounded, in future dollars.
    pub final_balance: f64,
    pub data: Vec<YearData>,
}
