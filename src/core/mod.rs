mod engine;
mod types;
mod validate;

pub use engine::{run_simulation, run_simulation_from_year};
pub use types::{
    Asset, AssetCategory, Breakdown, BreakdownLine, FinancialSettings, INCOME_SHORTAGE_LABEL,
    IncomeStream, PORTFOLIO_WITHDRAWALS_LABEL, SimulationResult, YearData,
};
pub use validate::{InputError, MAX_AGE, validate_inputs};
