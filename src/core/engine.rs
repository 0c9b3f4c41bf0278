use tracing::debug;

use super::types::{CalculatorInput, CalculatorResult, OutOfPocketYear};

/// Every projection runs to this age.
pub const HORIZON_AGE: u32 = 75;
pub const LOW_INFLATION_RATE: f64 = 0.05;
pub const HIGH_INFLATION_RATE: f64 = 0.08;
pub const BASE_CLAIM_AMOUNT: f64 = 5_000.0;
pub const CLAIM_INFLATION_RATE: f64 = 0.05;
pub const SAVINGS_GROWTH_RATE: f64 = 0.04;
pub const PREMIUM_SAVINGS_SHARE: f64 = 0.2;
pub const MIN_MONTHLY_SAVINGS: f64 = 100.0;

pub const NO_PLAN_MESSAGE: &str = "Without insurance, even a single hospital admission could cost several months of income. Building an emergency buffer or exploring affordable HSIT protection can help.";
pub const COPAYMENT_MESSAGE: &str = "Plans with copayment features mean you share part of each hospital bill. Make sure you have accessible savings to cover this.";
pub const CRITICAL_ILLNESS_MESSAGE: &str = "In the event of a critical illness, income loss can make sustaining current lifestyle and paying future premiums difficult. Consider whether a CI plan fits your needs.";
pub const DEPENDENTS_MESSAGE: &str = "If you have dependents, consider additional HSIT or CI coverage, savings and emergency buffer to meet potential higher healthcare needs.";
pub const HIGHER_RISK_MESSAGE: &str = "You may need to save more or purchase HSIT plans earlier if you have higher health risks, such as pre-existing conditions, family history of chronic illnesses, or high-stress lifestyle.";
pub const SAVINGS_BALANCE_MESSAGE: &str =
    "Consider your current savings and EPF balances to meet future healthcare expenditures.";

// (exclusive upper age, factor); ages past the last bound take the top factor.
const AGE_FACTOR_BANDS: [(u32, f64); 11] = [
    (25, 0.70),
    (30, 0.85),
    (35, 1.00),
    (40, 1.20),
    (45, 1.50),
    (50, 1.90),
    (55, 2.40),
    (60, 3.00),
    (65, 3.80),
    (70, 4.80),
    (75, 6.00),
];
const AGE_FACTOR_TOP: f64 = 7.50;

const UTILIZATION_BANDS: [(u32, f64); 5] = [(30, 0.3), (40, 0.5), (50, 0.8), (60, 1.2), (70, 1.8)];
const UTILIZATION_TOP: f64 = 2.5;

const SEVERITY_BANDS: [(u32, f64); 5] = [(30, 0.5), (40, 0.7), (50, 1.0), (60, 1.3), (70, 1.7)];
const SEVERITY_TOP: f64 = 2.2;

fn band_lookup(bands: &[(u32, f64)], top: f64, age: u32) -> f64 {
    let idx = bands.partition_point(|&(upper, _)| upper <= age);
    bands.get(idx).map_or(top, |&(_, factor)| factor)
}

/// Relative premium cost for `age`, normalised so the 30-34 band is 1.0.
pub fn age_factor(age: u32) -> f64 {
    band_lookup(&AGE_FACTOR_BANDS, AGE_FACTOR_TOP, age)
}

pub fn utilization_factor(age: u32) -> f64 {
    band_lookup(&UTILIZATION_BANDS, UTILIZATION_TOP, age)
}

pub fn severity_factor(age: u32) -> f64 {
    band_lookup(&SEVERITY_BANDS, SEVERITY_TOP, age)
}

fn years_to_horizon(age: u32) -> u32 {
    HORIZON_AGE.saturating_sub(age)
}

/// Monthly premium at the horizon age: repriced to the horizon age band, then
/// compounded by `inflation_rate` for each remaining year. Unrounded.
pub fn future_premium(age: u32, monthly_premium: f64, inflation_rate: f64) -> f64 {
    let years = years_to_horizon(age);
    let repricing = age_factor(HORIZON_AGE) / age_factor(age);
    monthly_premium * repricing * (1.0 + inflation_rate).powi(years as i32)
}

/// Year-by-year out-of-pocket exposure from `age` through the horizon age,
/// both ends inclusive.
pub fn out_of_pocket_schedule(
    age: u32,
    deductible: f64,
    co_insurance_percentage: f64,
) -> Vec<OutOfPocketYear> {
    let co_insurance = co_insurance_percentage / 100.0;
    (age..=HORIZON_AGE)
        .map(|year_age| {
            let expected_claim =
                utilization_factor(year_age) * severity_factor(year_age) * BASE_CLAIM_AMOUNT;
            let deductible_paid = deductible.min(expected_claim);
            let out_of_pocket = deductible_paid + (expected_claim - deductible_paid) * co_insurance;
            let claim_inflation = (1.0 + CLAIM_INFLATION_RATE).powi((year_age - age) as i32);
            OutOfPocketYear {
                age: year_age,
                expected_claim,
                out_of_pocket,
                inflated_out_of_pocket: out_of_pocket * claim_inflation,
            }
        })
        .collect()
}

/// Cumulative inflated out-of-pocket exposure to the horizon age.
pub fn expected_out_of_pocket(
    age: u32,
    has_deductible: bool,
    deductible: f64,
    co_insurance_percentage: f64,
) -> f64 {
    if !has_deductible || (deductible == 0.0 && co_insurance_percentage == 0.0) {
        return 0.0;
    }
    out_of_pocket_schedule(age, deductible, co_insurance_percentage)
        .iter()
        .map(|year| year.inflated_out_of_pocket)
        .sum()
}

/// Share of the low-inflation premium plus a straight-line monthly slice of
/// the out-of-pocket total, floored at `MIN_MONTHLY_SAVINGS`.
///
/// The slice is spread over at least one year, so ages at or past the horizon
/// stay finite.
pub fn monthly_savings_needed(age: u32, low_inflation_premium: f64, expected_oop: f64) -> f64 {
    let years_remaining = years_to_horizon(age).max(1) as f64;
    let needed = low_inflation_premium * PREMIUM_SAVINGS_SHARE + expected_oop / years_remaining / 12.0;
    needed.max(MIN_MONTHLY_SAVINGS)
}

/// Pot at the horizon when `monthly_savings` is saved every year. Each year the
/// running total grows first and the year's contribution lands after.
pub fn projected_savings(age: u32, monthly_savings: f64, growth_rate: f64) -> f64 {
    let annual_contribution = monthly_savings * 12.0;
    let mut total = 0.0;
    for _ in 0..=years_to_horizon(age) {
        total = total * (1.0 + growth_rate) + annual_contribution;
    }
    total
}

pub fn guidance_messages(input: &CalculatorInput) -> Vec<String> {
    let mut messages = Vec::new();

    if !input.has_plan {
        messages.push(NO_PLAN_MESSAGE.to_string());
    }
    if input.has_deductible() && (input.deductible() > 0.0 || input.co_insurance() > 0.0) {
        messages.push(COPAYMENT_MESSAGE.to_string());
    }
    if input.critical_illness() == 0.0 {
        messages.push(CRITICAL_ILLNESS_MESSAGE.to_string());
    }
    if input.age > 40 {
        messages.push(DEPENDENTS_MESSAGE.to_string());
    }
    if input.age > 50 {
        messages.push(HIGHER_RISK_MESSAGE.to_string());
    }
    messages.push(SAVINGS_BALANCE_MESSAGE.to_string());

    messages
}

pub fn run_calculation(input: &CalculatorInput) -> CalculatorResult {
    let premium = input.effective_monthly_premium();
    let (low_inflation_premium, high_inflation_premium) = if premium > 0.0 {
        (
            future_premium(input.age, premium, LOW_INFLATION_RATE),
            future_premium(input.age, premium, HIGH_INFLATION_RATE),
        )
    } else {
        (0.0, 0.0)
    };

    let expected_oop = expected_out_of_pocket(
        input.age,
        input.has_deductible(),
        input.deductible(),
        input.co_insurance(),
    );

    let monthly = monthly_savings_needed(input.age, low_inflation_premium, expected_oop);
    let projected = projected_savings(input.age, monthly, SAVINGS_GROWTH_RATE);
    let guidance = guidance_messages(input);

    debug!(
        age = input.age,
        gender = input.gender.as_str(),
        monthly_savings_needed = monthly,
        expected_oop,
        guidance_count = guidance.len(),
        "calculation complete"
    );

    CalculatorResult {
        monthly_savings_needed: monthly,
        yearly_savings_needed: monthly * 12.0,
        low_inflation_premium,
        high_inflation_premium,
        expected_oop,
        projected_savings: projected,
        guidance_messages: guidance,
    }
}
