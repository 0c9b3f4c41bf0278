mod engine;
mod error;
mod types;

pub use engine::{
    BASE_CLAIM_AMOUNT, CLAIM_INFLATION_RATE, HIGH_INFLATION_RATE, HORIZON_AGE, LOW_INFLATION_RATE,
    MIN_MONTHLY_SAVINGS, PREMIUM_SAVINGS_SHARE, SAVINGS_BALANCE_MESSAGE, SAVINGS_GROWTH_RATE,
    age_factor, expected_out_of_pocket, future_premium, guidance_messages, monthly_savings_needed,
    out_of_pocket_schedule, projected_savings, run_calculation, severity_factor,
    utilization_factor,
};
pub use error::{FieldIssue, ValidationError};
pub use types::{CalculatorInput, CalculatorResult, Gender, OutOfPocketYear};
