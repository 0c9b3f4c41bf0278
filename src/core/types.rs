use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Validated calculator request. Optional fields read as zero/false downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorInput {
    pub age: u32,
    pub gender: Gender,
    pub has_plan: bool,
    pub current_monthly_premium: Option<f64>,
    pub has_deductible: Option<bool>,
    pub deductible_amount: Option<f64>,
    pub co_insurance_percentage: Option<f64>,
    pub critical_illness_cover: Option<f64>,
}

impl CalculatorInput {
    /// Premium that feeds the projection; ignored when there is no plan.
    pub fn effective_monthly_premium(&self) -> f64 {
        if self.has_plan {
            self.current_monthly_premium.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    pub fn has_deductible(&self) -> bool {
        self.has_deductible.unwrap_or(false)
    }

    pub fn deductible(&self) -> f64 {
        self.deductible_amount.unwrap_or(0.0)
    }

    pub fn co_insurance(&self) -> f64 {
        self.co_insurance_percentage.unwrap_or(0.0)
    }

    pub fn critical_illness(&self) -> f64 {
        self.critical_illness_cover.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorResult {
    pub monthly_savings_needed: f64,
    pub yearly_savings_needed: f64,
    pub low_inflation_premium: f64,
    pub high_inflation_premium: f64,
    #[serde(rename = "expectedOOP")]
    pub expected_oop: f64,
    pub projected_savings: f64,
    pub guidance_messages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfPocketYear {
    pub age: u32,
    pub expected_claim: f64,
    pub out_of_pocket: f64,
    pub inflated_out_of_pocket: f64,
}
