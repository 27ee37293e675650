use chrono::Datelike;

use super::types::{
    Asset, Breakdown, BreakdownLine, FinancialSettings, IncomeStream, SimulationResult, YearData,
};

/// Working copy of an asset. Only the fields the projection touches.
#[derive(Debug, Clone, Copy)]
struct Holding {
    balance: f64,
    contribution: f64,
    return_rate: f64,
}

impl Holding {
    fn from_asset(asset: &Asset) -> Self {
        Self {
            balance: asset.balance,
            contribution: asset.contribution,
            return_rate: asset.return_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DrawdownOutcome {
    withdrawn: f64,
    shortfall: f64,
    depleted: bool,
}

pub fn run_simulation(
    settings: &FinancialSettings,
    assets: &[Asset],
    income_streams: &[IncomeStream],
) -> SimulationResult {
    let start_year = chrono::Local::now().year();
    run_simulation_from_year(settings, assets, income_streams, start_year)
}

/// Same as [`run_simulation`] with the calendar year of the first simulated
/// age given explicitly.
pub fn run_simulation_from_year(
    settings: &FinancialSettings,
    assets: &[Asset],
    income_streams: &[IncomeStream],
    start_year: i32,
) -> SimulationResult {
    let mut holdings = assets.iter().map(Holding::from_asset).collect::<Vec<_>>();
    let mut final_balance = total_balance(&holdings);
    let mut depletion_age = None;

    let year_count = (i64::from(settings.planning_horizon) - i64::from(settings.current_age) + 1)
        .max(0) as usize;
    let mut data = Vec::with_capacity(year_count);

    for (years_elapsed, age) in (settings.current_age..=settings.planning_horizon).enumerate() {
        let is_retired = age >= settings.retirement_age;
        let multiplier = inflation_multiplier(settings.inflation_rate, years_elapsed);
        let required_expense = settings.monthly_spending * 12.0 * multiplier;

        let mut breakdown = Breakdown::default();
        let mut fixed_income = 0.0;
        for stream in income_streams {
            let Some(amount) = stream_annual_amount(stream, age, years_elapsed) else {
                continue;
            };
            fixed_income += amount;
            breakdown.push(BreakdownLine::Income {
                name: stream.name.clone(),
                amount: round_currency(amount),
            });
        }

        apply_growth_and_contributions(&mut holdings, is_retired, multiplier);

        let withdrawal_needed = if is_retired {
            (required_expense - fixed_income).max(0.0)
        } else {
            0.0
        };
        let outcome = withdraw_proportionally(&mut holdings, withdrawal_needed);
        if outcome.depleted && depletion_age.is_none() {
            depletion_age = Some(age);
        }

        let year_end_balance = total_balance(&holdings);
        final_balance = year_end_balance;

        breakdown.push(BreakdownLine::PortfolioWithdrawals(round_currency(outcome.withdrawn)));
        if outcome.shortfall > 0.0 {
            breakdown.push(BreakdownLine::IncomeShortage(round_currency(outcome.shortfall)));
        }

        data.push(YearData {
            age,
            year: start_year.saturating_add(years_elapsed as i32),
            expenses: round_currency(required_expense),
            income: round_currency(fixed_income + outcome.withdrawn),
            balance: round_currency(year_end_balance),
            shortfall: round_currency(outcome.shortfall),
            withdrawals: round_currency(outcome.withdrawn),
            breakdown,
        });
    }

    SimulationResult {
        success: depletion_age.is_none(),
        depletion_age,
        final_balance,
        data,
    }
}

fn inflation_multiplier(inflation_rate: f64, years_elapsed: usize) -> f64 {
    (1.0 + inflation_rate / 100.0).powf(years_elapsed as f64)
}

// COLA compounds from the first simulated year, not from the stream's start age.
fn stream_annual_amount(stream: &IncomeStream, age: i32, years_elapsed: usize) -> Option<f64> {
    if age < stream.start_age || age > stream.end_age {
        return None;
    }
    let growth = (1.0 + stream.cola_rate / 100.0).powf(years_elapsed as f64);
    Some(stream.monthly_amount * 12.0 * growth)
}

// Growth is earned on the balance before this year's contribution.
fn apply_growth_and_contributions(holdings: &mut [Holding], is_retired: bool, multiplier: f64) {
    for holding in holdings.iter_mut() {
        holding.balance += holding.balance * holding.return_rate / 100.0;
        if !is_retired {
            holding.balance += holding.contribution * multiplier;
        }
    }
}

fn withdraw_proportionally(holdings: &mut [Holding], withdrawal_needed: f64) -> DrawdownOutcome {
    if withdrawal_needed <= 0.0 {
        return DrawdownOutcome::default();
    }

    let total_available = total_balance(holdings);
    if total_available <= 0.0 {
        return DrawdownOutcome {
            withdrawn: 0.0,
            shortfall: withdrawal_needed,
            depleted: true,
        };
    }

    if total_available >= withdrawal_needed {
        for holding in holdings.iter_mut() {
            holding.balance -= withdrawal_needed * (holding.balance / total_available);
        }
        return DrawdownOutcome {
            withdrawn: withdrawal_needed,
            shortfall: 0.0,
            depleted: false,
        };
    }

    for holding in holdings.iter_mut() {
        holding.balance = 0.0;
    }
    DrawdownOutcome {
        withdrawn: total_available,
        shortfall: withdrawal_needed - total_available,
        depleted: true,
    }
}

fn total_balance(holdings: &[Holding]) -> f64 {
    holdings.iter().fold(0.0, |acc, h| acc + h.balance)
}

fn round_currency(value: f64) -> f64 {
    value.round()
}
