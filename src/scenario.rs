//! Versioned JSON scenario library: the on-disk bundle of named input sets
//! that the CLI and HTTP server feed into the engine.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::{
    Asset, AssetCategory, FinancialSettings, IncomeStream, InputError, validate_inputs,
};

pub const LIBRARY_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("malformed scenario file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported scenario file version {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("scenario file contains no scenarios")]
    Empty,
    #[error("duplicate scenario id '{0}'")]
    DuplicateId(String),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("cannot delete the only remaining scenario")]
    LastScenario,
    #[error("scenario '{name}' has invalid inputs: {source}")]
    InvalidInputs {
        name: String,
        #[source]
        source: InputError,
    },
    #[error("scenario file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub settings: FinancialSettings,
    pub assets: Vec<Asset>,
    pub income_streams: Vec<IncomeStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioLibrary {
    pub version: u32,
    pub scenarios: Vec<Scenario>,
    pub active_scenario_id: String,
}

impl ScenarioLibrary {
    pub fn with_default(created_at: DateTime<Utc>) -> Self {
        let scenario = Scenario {
            id: scenario_id_for(created_at, 0),
            name: "Base Plan".to_string(),
            created_at,
            settings: FinancialSettings {
                current_age: 45,
                retirement_age: 65,
                planning_horizon: 95,
                monthly_spending: 5_000.0,
                inflation_rate: 3.0,
                pre_retirement_return: 7.0,
            },
            assets: vec![
                Asset {
                    id: "asset-401k".to_string(),
                    name: "401(k)".to_string(),
                    balance: 350_000.0,
                    contribution: 23_000.0,
                    return_rate: 7.0,
                    category: AssetCategory::TaxDeferred,
                },
                Asset {
                    id: "asset-roth".to_string(),
                    name: "Roth IRA".to_string(),
                    balance: 80_000.0,
                    contribution: 7_000.0,
                    return_rate: 7.0,
                    category: AssetCategory::TaxFree,
                },
                Asset {
                    id: "asset-savings".to_string(),
                    name: "High-Yield Savings".to_string(),
                    balance: 40_000.0,
                    contribution: 0.0,
                    return_rate: 4.0,
                    category: AssetCategory::Cash,
                },
            ],
            income_streams: vec![IncomeStream {
                id: "income-ss".to_string(),
                name: "Social Security".to_string(),
                monthly_amount: 2_500.0,
                start_age: 67,
                end_age: 95,
                cola_rate: 2.0,
                is_taxable: true,
                color: "#10b981".to_string(),
            }],
        };
        Self {
            version: LIBRARY_VERSION,
            active_scenario_id: scenario.id.clone(),
            scenarios: vec![scenario],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let library = serde_json::from_str::<ScenarioLibrary>(json)?;
        library.validate()?;
        Ok(library)
    }

    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let library = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            scenarios = library.scenarios.len(),
            "loaded scenario library"
        );
        Ok(library)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ScenarioError> {
        self.validate()?;
        let json = self.to_json()?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "saved scenario library");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.version != LIBRARY_VERSION {
            return Err(ScenarioError::UnsupportedVersion(self.version));
        }
        if self.scenarios.is_empty() {
            return Err(ScenarioError::Empty);
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(ScenarioError::DuplicateId(scenario.id.clone()));
            }
            validate_inputs(
                &scenario.settings,
                &scenario.assets,
                &scenario.income_streams,
            )
            .map_err(|source| ScenarioError::InvalidInputs {
                name: scenario.name.clone(),
                source,
            })?;
        }

        if !seen.contains(self.active_scenario_id.as_str()) {
            return Err(ScenarioError::UnknownScenario(
                self.active_scenario_id.clone(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn active(&self) -> Option<&Scenario> {
        self.get(&self.active_scenario_id)
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), ScenarioError> {
        if self.get(id).is_none() {
            return Err(ScenarioError::UnknownScenario(id.to_string()));
        }
        self.active_scenario_id = id.to_string();
        Ok(())
    }

    pub fn add(
        &mut self,
        name: &str,
        settings: FinancialSettings,
        assets: Vec<Asset>,
        income_streams: Vec<IncomeStream>,
        created_at: DateTime<Utc>,
    ) -> Result<String, ScenarioError> {
        validate_inputs(&settings, &assets, &income_streams).map_err(|source| {
            ScenarioError::InvalidInputs {
                name: name.to_string(),
                source,
            }
        })?;
        let id = self.fresh_id(created_at);
        debug!(%id, name, "adding scenario");
        self.scenarios.push(Scenario {
            id: id.clone(),
            name: name.to_string(),
            created_at,
            settings,
            assets,
            income_streams,
        });
        Ok(id)
    }

    /// Copies a scenario's inputs under a fresh id and makes the copy active.
    pub fn clone_scenario(
        &mut self,
        id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<String, ScenarioError> {
        let source = self
            .get(id)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))?;
        let new_id = self.fresh_id(created_at);
        self.scenarios.push(Scenario {
            id: new_id.clone(),
            name: format!("{} (Copy)", source.name),
            created_at,
            ..source
        });
        self.active_scenario_id = new_id.clone();
        Ok(new_id)
    }

    pub fn delete(&mut self, id: &str) -> Result<Scenario, ScenarioError> {
        let index = self
            .scenarios
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))?;
        if self.scenarios.len() == 1 {
            return Err(ScenarioError::LastScenario);
        }
        let removed = self.scenarios.remove(index);
        if self.active_scenario_id == removed.id {
            self.active_scenario_id = self.scenarios[0].id.clone();
        }
        Ok(removed)
    }

    fn fresh_id(&self, created_at: DateTime<Utc>) -> String {
        let mut attempt = 0;
        loop {
            let candidate = scenario_id_for(created_at, attempt);
            if self.get(&candidate).is_none() {
                return candidate;
            }
            attempt += 1;
        }
    }
}

fn scenario_id_for(created_at: DateTime<Utc>, attempt: u32) -> String {
    let millis = created_at.timestamp_millis();
    if attempt == 0 {
        format!("scenario-{millis}")
    } else {
        format!("scenario-{millis}-{attempt}")
    }
}
