//! Persistence collaborator for completed calculations.
//!
//! Storing is independent of computing: a store receives a finished result and
//! never alters it. The admin dashboard reads aggregates back through
//! [`CalculationStore::stats`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::core::{CalculatorInput, CalculatorResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationStats {
    pub total_calculations: u64,
    pub average_age: f64,
    pub gender_distribution: Vec<NamedCount>,
    pub plan_coverage: Vec<NamedCount>,
    pub average_monthly_savings_needed: f64,
}

impl CalculationStats {
    pub fn empty() -> Self {
        Self {
            total_calculations: 0,
            average_age: 0.0,
            gender_distribution: Vec::new(),
            plan_coverage: Vec::new(),
            average_monthly_savings_needed: 0.0,
        }
    }
}

pub trait CalculationStore: Send + Sync {
    /// Keep one input/result pair and return its generated identifier.
    fn record(
        &self,
        input: &CalculatorInput,
        result: &CalculatorResult,
    ) -> Result<RecordId, StoreError>;

    fn stats(&self) -> Result<CalculationStats, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredCalculation {
    id: RecordId,
    input: CalculatorInput,
    result: CalculatorResult,
}

/// Process-local store for development and single-instance deployments.
/// Records are never evicted, and `stats` rescans all of them.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<StoredCalculation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: RecordId) -> Result<Option<(CalculatorInput, CalculatorResult)>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records
            .iter()
            .find(|stored| stored.id == id)
            .map(|stored| (stored.input.clone(), stored.result.clone())))
    }
}

impl CalculationStore for InMemoryStore {
    fn record(
        &self,
        input: &CalculatorInput,
        result: &CalculatorResult,
    ) -> Result<RecordId, StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let id = RecordId(records.len() as u64 + 1);
        records.push(StoredCalculation {
            id,
            input: input.clone(),
            result: result.clone(),
        });
        Ok(id)
    }

    fn stats(&self) -> Result<CalculationStats, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(summarize(&records))
    }
}

fn summarize(records: &[StoredCalculation]) -> CalculationStats {
    if records.is_empty() {
        return CalculationStats::empty();
    }

    let total = records.len() as f64;
    let age_sum: f64 = records.iter().map(|r| r.input.age as f64).sum();
    let savings_sum: f64 = records
        .iter()
        .map(|r| r.result.monthly_savings_needed)
        .sum();

    let mut by_gender: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut by_plan: BTreeMap<bool, u64> = BTreeMap::new();
    for stored in records {
        *by_gender.entry(stored.input.gender.as_str()).or_default() += 1;
        *by_plan.entry(stored.input.has_plan).or_default() += 1;
    }

    CalculationStats {
        total_calculations: records.len() as u64,
        average_age: age_sum / total,
        gender_distribution: by_gender
            .into_iter()
            .map(|(name, value)| NamedCount {
                name: name.to_string(),
                value,
            })
            .collect(),
        // "Has Plan" first.
        plan_coverage: by_plan
            .into_iter()
            .rev()
            .map(|(has_plan, value)| NamedCount {
                name: plan_label(has_plan).to_string(),
                value,
            })
            .collect(),
        average_monthly_savings_needed: savings_sum / total,
    }
}

fn plan_label(has_plan: bool) -> &'static str {
    if has_plan { "Has Plan" } else { "No Plan" }
}
