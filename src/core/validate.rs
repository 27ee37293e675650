use std::collections::HashSet;

use thiserror::Error;

use super::types::{Asset, FinancialSettings, IncomeStream};

pub const MAX_AGE: i32 = 150;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{field} must be between 0 and 150, got {value}")]
    AgeOutOfRange { field: &'static str, value: i32 },
    #[error("planningHorizon ({horizon}) must be >= currentAge ({current})")]
    HorizonBeforeCurrentAge { current: i32, horizon: i32 },
    #[error("{field} must be a finite amount >= 0")]
    InvalidAmount { field: String },
    #[error("{field} must be a finite percentage > -100")]
    InvalidRate { field: String },
    #[error("income stream '{name}' ends (age {end_age}) before it starts (age {start_age})")]
    StreamEndsBeforeStart {
        name: String,
        start_age: i32,
        end_age: i32,
    },
    #[error("{kind} id must not be empty")]
    EmptyId { kind: &'static str },
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
}

/// Checks inputs before they are handed to the engine. The engine itself
/// accepts anything.
pub fn validate_inputs(
    settings: &FinancialSettings,
    assets: &[Asset],
    income_streams: &[IncomeStream],
) -> Result<(), InputError> {
    validate_settings(settings)?;

    let mut seen = HashSet::new();
    for asset in assets {
        check_id("asset", &asset.id, &mut seen)?;
        check_amount(asset.balance, || format!("asset '{}' balance", asset.name))?;
        check_amount(asset.contribution, || {
            format!("asset '{}' contribution", asset.name)
        })?;
        check_rate(asset.return_rate, || {
            format!("asset '{}' returnRate", asset.name)
        })?;
    }

    let mut seen = HashSet::new();
    for stream in income_streams {
        check_id("income stream", &stream.id, &mut seen)?;
        check_amount(stream.monthly_amount, || {
            format!("income stream '{}' monthlyAmount", stream.name)
        })?;
        check_rate(stream.cola_rate, || {
            format!("income stream '{}' colaRate", stream.name)
        })?;
        check_age("startAge", stream.start_age)?;
        check_age("endAge", stream.end_age)?;
        if stream.end_age < stream.start_age {
            return Err(InputError::StreamEndsBeforeStart {
                name: stream.name.clone(),
                start_age: stream.start_age,
                end_age: stream.end_age,
            });
        }
    }

    Ok(())
}

fn validate_settings(settings: &FinancialSettings) -> Result<(), InputError> {
    check_age("currentAge", settings.current_age)?;
    check_age("retirementAge", settings.retirement_age)?;
    check_age("planningHorizon", settings.planning_horizon)?;
    if settings.planning_horizon < settings.current_age {
        return Err(InputError::HorizonBeforeCurrentAge {
            current: settings.current_age,
            horizon: settings.planning_horizon,
        });
    }
    check_amount(settings.monthly_spending, || "monthlySpending".to_string())?;
    check_rate(settings.inflation_rate, || "inflationRate".to_string())?;
    check_rate(settings.pre_retirement_return, || {
        "preRetirementReturn".to_string()
    })?;
    Ok(())
}

fn check_age(field: &'static str, value: i32) -> Result<(), InputError> {
    if (0..=MAX_AGE).contains(&value) {
        Ok(())
    } else {
        Err(InputError::AgeOutOfRange { field, value })
    }
}

fn check_amount(value: f64, field: impl FnOnce() -> String) -> Result<(), InputError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidAmount { field: field() })
    }
}

fn check_rate(value: f64, field: impl FnOnce() -> String) -> Result<(), InputError> {
    if value.is_finite() && value > -100.0 {
        Ok(())
    } else {
        Err(InputError::InvalidRate { field: field() })
    }
}

fn check_id<'a>(
    kind: &'static str,
    id: &'a str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), InputError> {
    if id.trim().is_empty() {
        return Err(InputError::EmptyId { kind });
    }
    if !seen.insert(id) {
        return Err(InputError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AssetCategory;

    fn sample_settings() -> FinancialSettings {
        FinancialSettings {
            current_age: 45,
            retirement_age: 62,
            planning_horizon: 95,
            monthly_spending: 6_000.0,
            inflation_rate: 2.5,
            pre_retirement_return: 7.0,
        }
    }

    fn sample_asset(id: &str) -> Asset {
        Asset {
            id: id.to_string(),
            name: "401(k)".to_string(),
            balance: 250_000.0,
            contribution: 20_000.0,
            return_rate: 7.0,
            category: AssetCategory::TaxDeferred,
        }
    }

    fn sample_stream(id: &str) -> IncomeStream {
        IncomeStream {
            id: id.to_string(),
            name: "Social Security".to_string(),
            monthly_amount: 2_800.0,
            start_age: 67,
            end_age: 95,
            cola_rate: 2.0,
            is_taxable: true,
            color: "#10b981".to_string(),
        }
    }

    #[test]
    fn accepts_typical_household() {
        let result = validate_inputs(
            &sample_settings(),
            &[sample_asset("a"), sample_asset("b")],
            &[sample_stream("ss")],
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn accepts_already_retired_household() {
        let mut settings = sample_settings();
        settings.current_age = 70;
        settings.retirement_age = 65;
        assert_eq!(validate_inputs(&settings, &[], &[]), Ok(()));
    }

    #[test]
    fn rejects_horizon_before_current_age() {
        let mut settings = sample_settings();
        settings.planning_horizon = 40;
        let err = validate_inputs(&settings, &[], &[]).expect_err("must reject horizon");
        assert!(err.to_string().contains("planningHorizon"));
    }

    #[test]
    fn rejects_negative_age() {
        let mut settings = sample_settings();
        settings.current_age = -1;
        let err = validate_inputs(&settings, &[], &[]).expect_err("must reject negative age");
        assert_eq!(
            err,
            InputError::AgeOutOfRange {
                field: "currentAge",
                value: -1
            }
        );
    }

    #[test]
    fn rejects_non_finite_spending() {
        let mut settings = sample_settings();
        settings.monthly_spending = f64::NAN;
        let err = validate_inputs(&settings, &[], &[]).expect_err("must reject NaN");
        assert!(err.to_string().contains("monthlySpending"));
    }

    #[test]
    fn rejects_inflation_at_minus_hundred() {
        let mut settings = sample_settings();
        settings.inflation_rate = -100.0;
        let err = validate_inputs(&settings, &[], &[]).expect_err("must reject -100%");
        assert!(err.to_string().contains("inflationRate"));
    }

    #[test]
    fn rejects_negative_asset_balance() {
        let mut asset = sample_asset("a");
        asset.balance = -5.0;
        let err = validate_inputs(&sample_settings(), &[asset], &[]).expect_err("negative");
        assert!(err.to_string().contains("401(k)"));
    }

    #[test]
    fn rejects_duplicate_asset_ids() {
        let err = validate_inputs(
            &sample_settings(),
            &[sample_asset("a"), sample_asset("a")],
            &[],
        )
        .expect_err("must reject duplicate");
        assert_eq!(
            err,
            InputError::DuplicateId {
                kind: "asset",
                id: "a".to_string()
            }
        );
    }

    #[test]
    fn allows_same_id_across_assets_and_streams() {
        let result = validate_inputs(&sample_settings(), &[sample_asset("x")], &[sample_stream("x")]);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn rejects_stream_ending_before_start() {
        let mut stream = sample_stream("ss");
        stream.end_age = 60;
        let err = validate_inputs(&sample_settings(), &[], &[stream]).expect_err("bad window");
        assert!(matches!(err, InputError::StreamEndsBeforeStart { .. }));
    }

    #[test]
    fn rejects_blank_stream_id() {
        let stream = sample_stream("  ");
        let err = validate_inputs(&sample_settings(), &[], &[stream]).expect_err("blank id");
        assert_eq!(
            err,
            InputError::EmptyId {
                kind: "income stream"
            }
        );
    }
}
