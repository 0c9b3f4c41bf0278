use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{
    CalculatorInput, CalculatorResult, FieldIssue, Gender, ValidationError, run_calculation,
};
use crate::store::{CalculationStats, CalculationStore, InMemoryStore};

const MIN_AGE: f64 = 18.0;
const MAX_AGE: f64 = 100.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGender {
    Male,
    Female,
}

impl From<CliGender> for Gender {
    fn from(value: CliGender) -> Self {
        match value {
            CliGender::Male => Gender::Male,
            CliGender::Female => Gender::Female,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "HSIT_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
    #[arg(long, env = "HSIT_PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(
        long,
        env = "HSIT_NO_PERSIST",
        help = "Run without storing calculations; admin stats stay empty"
    )]
    pub no_persist: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CalculateArgs {
    #[arg(long, help = "Current age in years (18-100)")]
    pub age: u32,
    #[arg(long, value_enum)]
    pub gender: CliGender,
    #[arg(long, help = "Already holds a hospital and surgical insurance plan")]
    pub has_plan: bool,
    #[arg(long, help = "Current monthly premium, used only with --has-plan")]
    pub monthly_premium: Option<f64>,
    #[arg(long)]
    pub has_deductible: bool,
    #[arg(long)]
    pub deductible: Option<f64>,
    #[arg(long, help = "Co-insurance share of each claim in percent (0-100)")]
    pub co_insurance: Option<f64>,
    #[arg(long)]
    pub critical_illness_cover: Option<f64>,
}

/// Raw request body. Fields stay untyped JSON so that `build_input` can
/// report every missing, mistyped or out-of-range field at once. `null`
/// reads as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalculatePayload {
    pub age: Option<Value>,
    pub gender: Option<Value>,
    #[serde(rename = "hasHSITPlan")]
    pub has_plan: Option<Value>,
    pub current_monthly_premium: Option<Value>,
    pub has_deductible: Option<Value>,
    pub deductible_amount: Option<Value>,
    pub co_insurance_percentage: Option<Value>,
    pub critical_illness_cover: Option<Value>,
}

impl From<CalculateArgs> for CalculatePayload {
    fn from(args: CalculateArgs) -> Self {
        Self {
            age: Some(Value::from(args.age)),
            gender: Some(Value::from(Gender::from(args.gender).as_str())),
            has_plan: Some(Value::from(args.has_plan)),
            current_monthly_premium: args.monthly_premium.map(Value::from),
            has_deductible: Some(Value::from(args.has_deductible)),
            deductible_amount: args.deductible.map(Value::from),
            co_insurance_percentage: args.co_insurance.map(Value::from),
            critical_illness_cover: args.critical_illness_cover.map(Value::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldIssue>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Clone, Default)]
pub struct AppState {
    store: Option<Arc<dyn CalculationStore>>,
}

impl AppState {
    pub fn new(store: Option<Arc<dyn CalculationStore>>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Some(Arc::new(InMemoryStore::new())))
    }
}

fn optional_number(
    issues: &mut Vec<FieldIssue>,
    field: &'static str,
    value: Option<&Value>,
) -> Option<f64> {
    let value = value?;
    if value.as_f64().is_none() {
        issues.push(FieldIssue::new(field, "must be a number"));
    }
    value.as_f64()
}

fn optional_bool(
    issues: &mut Vec<FieldIssue>,
    field: &'static str,
    value: Option<&Value>,
) -> Option<bool> {
    let value = value?;
    if value.as_bool().is_none() {
        issues.push(FieldIssue::new(field, "must be a boolean"));
    }
    value.as_bool()
}

pub fn build_input(payload: CalculatePayload) -> Result<CalculatorInput, ValidationError> {
    let mut issues = Vec::new();

    let age = match payload.age.as_ref().map(Value::as_f64) {
        None => {
            issues.push(FieldIssue::new("age", "is required"));
            None
        }
        Some(None) => {
            issues.push(FieldIssue::new("age", "must be a number"));
            None
        }
        Some(Some(v)) if !v.is_finite() || v.fract() != 0.0 => {
            issues.push(FieldIssue::new("age", "must be a whole number"));
            None
        }
        Some(Some(v)) if !(MIN_AGE..=MAX_AGE).contains(&v) => {
            issues.push(FieldIssue::new("age", "must be between 18 and 100"));
            None
        }
        Some(Some(v)) => Some(v as u32),
    };

    let gender = match payload.gender.as_ref().map(Value::as_str) {
        None => {
            issues.push(FieldIssue::new("gender", "is required"));
            None
        }
        Some(None) => {
            issues.push(FieldIssue::new("gender", "must be a string"));
            None
        }
        Some(Some("male")) => Some(Gender::Male),
        Some(Some("female")) => Some(Gender::Female),
        Some(Some(_)) => {
            issues.push(FieldIssue::new("gender", "must be one of male, female"));
            None
        }
    };

    let has_plan = if payload.has_plan.is_none() {
        issues.push(FieldIssue::new("hasHSITPlan", "is required"));
        None
    } else {
        optional_bool(&mut issues, "hasHSITPlan", payload.has_plan.as_ref())
    };

    let current_monthly_premium = optional_number(
        &mut issues,
        "currentMonthlyPremium",
        payload.current_monthly_premium.as_ref(),
    );
    let has_deductible = optional_bool(&mut issues, "hasDeductible", payload.has_deductible.as_ref());
    let deductible_amount = optional_number(
        &mut issues,
        "deductibleAmount",
        payload.deductible_amount.as_ref(),
    );
    let co_insurance_percentage = optional_number(
        &mut issues,
        "coInsurancePercentage",
        payload.co_insurance_percentage.as_ref(),
    );
    let critical_illness_cover = optional_number(
        &mut issues,
        "criticalIllnessCover",
        payload.critical_illness_cover.as_ref(),
    );

    for (field, value) in [
        ("currentMonthlyPremium", current_monthly_premium),
        ("deductibleAmount", deductible_amount),
        ("criticalIllnessCover", critical_illness_cover),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                issues.push(FieldIssue::new(field, "must be >= 0"));
            }
        }
    }

    if let Some(v) = co_insurance_percentage {
        if !(0.0..=100.0).contains(&v) {
            issues.push(FieldIssue::new(
                "coInsurancePercentage",
                "must be between 0 and 100",
            ));
        }
    }

    match (age, gender, has_plan) {
        (Some(age), Some(gender), Some(has_plan)) if issues.is_empty() => Ok(CalculatorInput {
            age,
            gender,
            has_plan,
            current_monthly_premium,
            has_deductible,
            deductible_amount,
            co_insurance_percentage,
            critical_illness_cover,
        }),
        _ => Err(ValidationError { issues }),
    }
}

/// Validate CLI arguments and run the engine once, without persistence.
pub fn calculate_from_args(args: CalculateArgs) -> Result<CalculatorResult, ValidationError> {
    let input = build_input(args.into())?;
    Ok(run_calculation(&input))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/admin/stats", get(stats_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(args: ServeArgs) -> std::io::Result<()> {
    let addr = SocketAddr::new(args.host, args.port);
    let state = if args.no_persist {
        AppState::new(None)
    } else {
        AppState::in_memory()
    };

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, persist = !args.no_persist, "HSIT calculator API listening");

    axum::serve(listener, router(state)).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_handler(
    State(state): State<AppState>,
    payload: Result<Json<CalculatePayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "rejected malformed calculation request");
            return validation_response(vec![FieldIssue::new("body", rejection.body_text())]);
        }
    };

    let input = match build_input(payload) {
        Ok(input) => input,
        Err(err) => {
            warn!(%err, "rejected calculation request");
            return validation_response(err.issues);
        }
    };

    let result = run_calculation(&input);

    if let Some(store) = &state.store {
        match store.record(&input, &result) {
            Ok(id) => info!(record_id = id.0, age = input.age, "stored calculation"),
            Err(err) => {
                error!(%err, "failed to store calculation");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        }
    }

    json_response(StatusCode::OK, result)
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    let stats = match &state.store {
        None => Ok(CalculationStats::empty()),
        Some(store) => store.stats(),
    };
    match stats {
        Ok(stats) => json_response(StatusCode::OK, stats),
        Err(err) => {
            error!(%err, "failed to read calculation statistics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch statistics")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            details: Vec::new(),
        },
    )
}

fn validation_response(details: Vec<FieldIssue>) -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        ErrorResponse {
            error: "Invalid input data".to_string(),
            details,
        },
    )
}

#[cfg(test)]
fn payload_from_json(json: &str) -> CalculatePayload {
    serde_json::from_str::<CalculatePayload>(json).expect("payload json should parse")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MIN_MONTHLY_SAVINGS, SAVINGS_BALANCE_MESSAGE};
    use crate::store::{RecordId, StoreError};

    struct FailingStore;

    impl CalculationStore for FailingStore {
        fn record(
            &self,
            _input: &CalculatorInput,
            _result: &CalculatorResult,
        ) -> Result<RecordId, StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }

        fn stats(&self) -> Result<CalculationStats, StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }
    }

    fn sample_payload() -> CalculatePayload {
        payload_from_json(
            r#"{
              "age": 30,
              "gender": "male",
              "hasHSITPlan": true,
              "currentMonthlyPremium": 200,
              "hasDeductible": false
            }"#,
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    #[test]
    fn build_input_parses_web_keys() {
        let payload = payload_from_json(
            r#"{
              "age": 45,
              "gender": "female",
              "hasHSITPlan": true,
              "currentMonthlyPremium": 180.5,
              "hasDeductible": true,
              "deductibleAmount": 1000,
              "coInsurancePercentage": 20,
              "criticalIllnessCover": 250000
            }"#,
        );
        let input = build_input(payload).expect("valid payload");

        assert_eq!(input.age, 45);
        assert_eq!(input.gender, Gender::Female);
        assert!(input.has_plan);
        assert_eq!(input.current_monthly_premium, Some(180.5));
        assert_eq!(input.has_deductible, Some(true));
        assert_eq!(input.deductible_amount, Some(1_000.0));
        assert_eq!(input.co_insurance_percentage, Some(20.0));
        assert_eq!(input.critical_illness_cover, Some(250_000.0));
    }

    #[test]
    fn build_input_accepts_nulls_for_optional_fields() {
        let payload = payload_from_json(
            r#"{"age": 18, "gender": "male", "hasHSITPlan": false, "deductibleAmount": null}"#,
        );
        let input = build_input(payload).expect("valid payload");
        assert_eq!(input.age, 18);
        assert_eq!(input.deductible_amount, None);
        assert_eq!(input.has_deductible, None);
    }

    #[test]
    fn build_input_rejects_out_of_range_age() {
        for age in [17.0, 101.0, -3.0] {
            let mut payload = sample_payload();
            payload.age = Some(Value::from(age));
            let err = build_input(payload).expect_err("must reject age");
            assert!(err.mentions("age"), "age {age} should be rejected");
        }
    }

    #[test]
    fn build_input_rejects_fractional_age() {
        let mut payload = sample_payload();
        payload.age = Some(Value::from(30.5));
        let err = build_input(payload).expect_err("must reject fractional age");
        assert_eq!(err.issues[0].message, "must be a whole number");
    }

    #[test]
    fn build_input_bounds_are_inclusive() {
        for age in [18.0, 100.0] {
            let mut payload = sample_payload();
            payload.age = Some(Value::from(age));
            assert!(build_input(payload).is_ok());
        }
    }

    #[test]
    fn build_input_reports_every_invalid_field() {
        let payload = payload_from_json(
            r#"{
              "gender": "other",
              "currentMonthlyPremium": -1,
              "deductibleAmount": -50,
              "coInsurancePercentage": 120,
              "criticalIllnessCover": -10
            }"#,
        );
        let err = build_input(payload).expect_err("must reject");
        let fields: Vec<&str> = err.issues.iter().map(|issue| issue.field).collect();
        assert_eq!(
            fields,
            vec![
                "age",
                "gender",
                "hasHSITPlan",
                "currentMonthlyPremium",
                "deductibleAmount",
                "criticalIllnessCover",
                "coInsurancePercentage",
            ]
        );
    }

    #[test]
    fn build_input_reports_each_mistyped_field() {
        let payload = payload_from_json(
            r#"{
              "age": "thirty",
              "gender": 5,
              "hasHSITPlan": "yes",
              "currentMonthlyPremium": "200",
              "hasDeductible": 1,
              "coInsurancePercentage": [20]
            }"#,
        );
        let err = build_input(payload).expect_err("must reject");
        let issues: Vec<(&str, &str)> = err
            .issues
            .iter()
            .map(|issue| (issue.field, issue.message.as_str()))
            .collect();
        assert_eq!(
            issues,
            vec![
                ("age", "must be a number"),
                ("gender", "must be a string"),
                ("hasHSITPlan", "must be a boolean"),
                ("currentMonthlyPremium", "must be a number"),
                ("hasDeductible", "must be a boolean"),
                ("coInsurancePercentage", "must be a number"),
            ]
        );
    }

    #[test]
    fn build_input_ignores_unknown_plan_key_spellings() {
        let payload = payload_from_json(r#"{"age": 30, "gender": "male", "hasPlan": true}"#);
        let err = build_input(payload).expect_err("hasHSITPlan is required");
        assert!(err.mentions("hasHSITPlan"));
    }

    #[test]
    fn calculate_from_args_matches_api_path() {
        let args = CalculateArgs {
            age: 30,
            gender: CliGender::Male,
            has_plan: true,
            monthly_premium: Some(200.0),
            has_deductible: false,
            deductible: None,
            co_insurance: None,
            critical_illness_cover: None,
        };
        let from_cli = calculate_from_args(args).expect("valid args");
        let from_api = run_calculation(&build_input(sample_payload()).expect("valid payload"));
        assert_eq!(from_cli, from_api);
    }

    #[test]
    fn calculate_from_args_rejects_high_co_insurance() {
        let args = CalculateArgs {
            age: 40,
            gender: CliGender::Female,
            has_plan: false,
            monthly_premium: None,
            has_deductible: true,
            deductible: Some(500.0),
            co_insurance: Some(150.0),
            critical_illness_cover: None,
        };
        let err = calculate_from_args(args).expect_err("must reject");
        assert!(err.mentions("coInsurancePercentage"));
    }

    #[test]
    fn result_serialization_contains_expected_fields() {
        let result = run_calculation(&build_input(sample_payload()).expect("valid payload"));
        let json = serde_json::to_string(&result).expect("result should serialize");
        assert!(json.contains("\"monthlySavingsNeeded\""));
        assert!(json.contains("\"yearlySavingsNeeded\""));
        assert!(json.contains("\"lowInflationPremium\""));
        assert!(json.contains("\"highInflationPremium\""));
        assert!(json.contains("\"expectedOOP\""));
        assert!(json.contains("\"projectedSavings\""));
        assert!(json.contains("\"guidanceMessages\""));
    }

    #[tokio::test]
    async fn calculate_handler_returns_and_stores_result() {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(Some(store.clone()));

        let response = calculate_handler(State(state), Ok(Json(sample_payload()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );

        let body = body_json(response).await;
        let expected = run_calculation(&build_input(sample_payload()).expect("valid payload"));
        assert_eq!(body["expectedOOP"].as_f64(), Some(0.0));
        let monthly = body["monthlySavingsNeeded"].as_f64().expect("number");
        assert!((monthly - expected.monthly_savings_needed).abs() <= 1e-9 * monthly);
        let messages = body["guidanceMessages"].as_array().expect("array");
        assert_eq!(
            messages.last().and_then(|m| m.as_str()),
            Some(SAVINGS_BALANCE_MESSAGE)
        );

        let (_, stored) = store.get(RecordId(1)).expect("get").expect("stored");
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn calculate_handler_without_store_still_computes() {
        let mut payload = sample_payload();
        payload.has_plan = Some(Value::from(false));
        let response = calculate_handler(State(AppState::new(None)), Ok(Json(payload))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["monthlySavingsNeeded"].as_f64(), Some(MIN_MONTHLY_SAVINGS));
    }

    #[tokio::test]
    async fn calculate_handler_rejects_invalid_input_with_details() {
        let store = Arc::new(InMemoryStore::new());
        let mut payload = sample_payload();
        payload.age = Some(Value::from(12.0));
        payload.co_insurance_percentage = Some(Value::from(101.0));

        let response =
            calculate_handler(State(AppState::new(Some(store.clone()))), Ok(Json(payload))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input data");
        let details = body["details"].as_array().expect("details");
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["field"], "age");
        assert_eq!(details[1]["field"], "coInsurancePercentage");
        assert!(store.is_empty().expect("len"));
    }

    #[tokio::test]
    async fn calculate_handler_hides_store_failure_details() {
        let state = AppState::new(Some(Arc::new(FailingStore)));
        let response = calculate_handler(State(state), Ok(Json(sample_payload()))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn stats_handler_reports_stored_calculations() {
        let state = AppState::in_memory();
        for age in [30.0, 50.0] {
            let mut payload = sample_payload();
            payload.age = Some(Value::from(age));
            let response = calculate_handler(State(state.clone()), Ok(Json(payload))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let body = body_json(stats_handler(State(state)).await).await;
        assert_eq!(body["totalCalculations"], 2);
        assert_eq!(body["averageAge"].as_f64(), Some(40.0));
        assert_eq!(body["genderDistribution"][0]["name"], "male");
        assert_eq!(body["genderDistribution"][0]["value"], 2);
        assert_eq!(body["planCoverage"][0]["name"], "Has Plan");
    }

    #[tokio::test]
    async fn stats_handler_without_store_is_empty() {
        let body = body_json(stats_handler(State(AppState::new(None))).await).await;
        assert_eq!(body["totalCalculations"], 0);
        assert_eq!(body["averageAge"].as_f64(), Some(0.0));
    }

    #[tokio::test]
    async fn stats_handler_surfaces_store_failure() {
        let response = stats_handler(State(AppState::new(Some(Arc::new(FailingStore))))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to fetch statistics");
    }
}
