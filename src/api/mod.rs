use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    DerivedField, InputError, InvestmentInputs, Jurisdiction, LandTaxBracket, MAX_LOAN_TERM_YEARS,
    OverrideSet, PROJECTION_YEARS, Projection, ProjectionRow, PropertySummary, PropertyType,
    Session, YearKpis, brackets, compute_land_tax, whole_units, year_kpis,
};

pub const DEFAULT_PORT: u16 = 8080;

/// Caller vocabulary used when naming a rejected field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InputSource {
    Cli,
    Api,
}

impl InputSource {
    const fn name(self, flag: &'static str, key: &'static str) -> &'static str {
        match self {
            Self::Cli => flag,
            Self::Api => key,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPropertyType {
    House,
    Townhouse,
    Apartment,
    HomeAndLand,
    OldHome,
}

impl From<CliPropertyType> for PropertyType {
    fn from(value: CliPropertyType) -> Self {
        match value {
            CliPropertyType::House => PropertyType::House,
            CliPropertyType::Townhouse => PropertyType::Townhouse,
            CliPropertyType::Apartment => PropertyType::Apartment,
            CliPropertyType::HomeAndLand => PropertyType::HomeAndLand,
            CliPropertyType::OldHome => PropertyType::OldHome,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliJurisdiction {
    Nsw,
    Vic,
    Qld,
    Wa,
    Sa,
    Tas,
    Act,
    Nt,
}

impl From<CliJurisdiction> for Jurisdiction {
    fn from(value: CliJurisdiction) -> Self {
        match value {
            CliJurisdiction::Nsw => Jurisdiction::Nsw,
            CliJurisdiction::Vic => Jurisdiction::Vic,
            CliJurisdiction::Qld => Jurisdiction::Qld,
            CliJurisdiction::Wa => Jurisdiction::Wa,
            CliJurisdiction::Sa => Jurisdiction::Sa,
            CliJurisdiction::Tas => Jurisdiction::Tas,
            CliJurisdiction::Act => Jurisdiction::Act,
            CliJurisdiction::Nt => Jurisdiction::Nt,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPropertyType {
    #[serde(alias = "House")]
    House,
    #[serde(alias = "Townhouse")]
    Townhouse,
    #[serde(alias = "Apartment", alias = "unit")]
    Apartment,
    #[serde(alias = "Home & Land", alias = "homeAndLand", alias = "home_and_land")]
    HomeAndLand,
    #[serde(alias = "Old Home", alias = "oldHome", alias = "old_home")]
    OldHome,
}

impl From<ApiPropertyType> for CliPropertyType {
    fn from(value: ApiPropertyType) -> Self {
        match value {
            ApiPropertyType::House => CliPropertyType::House,
            ApiPropertyType::Townhouse => CliPropertyType::Townhouse,
            ApiPropertyType::Apartment => CliPropertyType::Apartment,
            ApiPropertyType::HomeAndLand => CliPropertyType::HomeAndLand,
            ApiPropertyType::OldHome => CliPropertyType::OldHome,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum ApiJurisdiction {
    #[serde(alias = "nsw")]
    Nsw,
    #[serde(alias = "vic")]
    Vic,
    #[serde(alias = "qld")]
    Qld,
    #[serde(alias = "wa")]
    Wa,
    #[serde(alias = "sa")]
    Sa,
    #[serde(alias = "tas")]
    Tas,
    #[serde(alias = "act")]
    Act,
    #[serde(alias = "nt")]
    Nt,
}

impl From<ApiJurisdiction> for CliJurisdiction {
    fn from(value: ApiJurisdiction) -> Self {
        match value {
            ApiJurisdiction::Nsw => CliJurisdiction::Nsw,
            ApiJurisdiction::Vic => CliJurisdiction::Vic,
            ApiJurisdiction::Qld => CliJurisdiction::Qld,
            ApiJurisdiction::Wa => CliJurisdiction::Wa,
            ApiJurisdiction::Sa => CliJurisdiction::Sa,
            ApiJurisdiction::Tas => CliJurisdiction::Tas,
            ApiJurisdiction::Act => CliJurisdiction::Act,
            ApiJurisdiction::Nt => CliJurisdiction::Nt,
        }
    }
}

/// `overrides` arrives as a JSON array or, in query strings, comma-separated.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OverrideList {
    Many(Vec<String>),
    Joined(String),
}

impl OverrideList {
    fn names(&self) -> Vec<&str> {
        match self {
            Self::Many(names) => names.iter().map(String::as_str).collect(),
            Self::Joined(joined) => joined.split(',').collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    property_type: Option<ApiPropertyType>,
    #[serde(alias = "state")]
    jurisdiction: Option<ApiJurisdiction>,
    suburb: Option<String>,
    postcode: Option<String>,

    price: Option<f64>,
    interest_rate: Option<f64>,
    #[serde(alias = "loanTerm")]
    loan_term_years: Option<u32>,
    lvr: Option<f64>,
    weekly_rent: Option<f64>,

    #[serde(alias = "capitalGrowthRate")]
    capital_growth: Option<f64>,
    inflation_rate: Option<f64>,
    rental_growth_rate: Option<f64>,

    land_value: Option<f64>,
    council_rates: Option<f64>,
    insurance: Option<f64>,
    body_corp: Option<f64>,
    land_tax: Option<f64>,
    water_rates: Option<f64>,
    maintenance: Option<f64>,
    property_manager_rate: Option<f64>,

    overrides: Option<OverrideList>,
    view_year: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "propvest",
    about = "30-year property investment projection (loan, land tax, rent and running costs)",
    allow_negative_numbers = true
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliPropertyType::House)]
    property_type: CliPropertyType,
    #[arg(long, value_enum, default_value_t = CliJurisdiction::Vic)]
    jurisdiction: CliJurisdiction,
    #[arg(long, default_value = "Richmond")]
    suburb: String,
    #[arg(long, default_value = "3121")]
    postcode: String,
    #[arg(long, default_value_t = 850_000.0, help = "Purchase price")]
    price: f64,
    #[arg(
        long,
        default_value_t = 6.10,
        help = "Annual interest rate in percent, e.g. 6.1"
    )]
    interest_rate: f64,
    #[arg(long, default_value_t = 30)]
    loan_term_years: u32,
    #[arg(long, default_value_t = 80.0, help = "Loan-to-value ratio in percent")]
    lvr: f64,
    #[arg(long, default_value_t = 650.0)]
    weekly_rent: f64,
    #[arg(
        long,
        help = "Capital growth in percent p.a.; defaults to the property-type estimate"
    )]
    capital_growth: Option<f64>,
    #[arg(
        long,
        default_value_t = 2.8,
        help = "Expense inflation in percent p.a."
    )]
    inflation_rate: f64,
    #[arg(long, default_value_t = 5.5, help = "Rent growth in percent p.a.")]
    rental_growth_rate: f64,
    #[arg(long, help = "Land value; defaults to a share of the price by property type")]
    land_value: Option<f64>,
    #[arg(long, help = "Annual council rates; defaults to 0.42% of price")]
    council_rates: Option<f64>,
    #[arg(long, help = "Annual insurance; defaults to 0.3% of price")]
    insurance: Option<f64>,
    #[arg(
        long,
        help = "Annual body corporate fee; defaults to 1% of price for strata"
    )]
    body_corp: Option<f64>,
    #[arg(long, help = "Annual land tax; defaults to the jurisdiction's scale")]
    land_tax: Option<f64>,
    #[arg(long, default_value_t = 840.0)]
    water_rates: f64,
    #[arg(long, default_value_t = 1_000.0)]
    maintenance: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Property manager fee in percent of rent"
    )]
    property_manager_rate: f64,
    #[arg(long, default_value_t = 0, help = "Year to report KPIs for (0-30)")]
    view_year: u32,
}

#[derive(Debug)]
struct ApiRequest {
    session: Session,
    view_year: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse<'a> {
    inputs: &'a InvestmentInputs,
    overrides: OverrideSet,
    view_year: u32,
    loan_amount: f64,
    monthly_repayment: f64,
    annual_repayment: f64,
    kpis: YearKpis,
    summary: PropertySummary,
    rows: &'a [ProjectionRow],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LandTaxQuery {
    land_value: Option<f64>,
    #[serde(alias = "state")]
    jurisdiction: Option<ApiJurisdiction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LandTaxResponse {
    jurisdiction: Jurisdiction,
    land_value: f64,
    land_tax: f64,
    brackets: &'static [LandTaxBracket],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultsResponse {
    inputs: InvestmentInputs,
    overridable_fields: Vec<&'static str>,
    property_types: Vec<PropertyType>,
    jurisdictions: Vec<Jurisdiction>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Parse(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to encode projection: {0}")]
    Encode(#[from] serde_json::Error),
}

fn require_finite(field: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NotFinite { field })
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), InputError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(InputError::out_of_range(field, "must be >= 0"));
    }
    Ok(())
}

fn require_percent(field: &'static str, value: f64) -> Result<(), InputError> {
    require_finite(field, value)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(InputError::out_of_range(field, "must be between 0 and 100"));
    }
    Ok(())
}

fn require_growth(field: &'static str, value: f64) -> Result<(), InputError> {
    require_finite(field, value)?;
    if value <= -100.0 {
        return Err(InputError::out_of_range(field, "must be > -100"));
    }
    Ok(())
}

fn build_inputs(cli: Cli, source: InputSource) -> Result<ApiRequest, InputError> {
    let name = |flag, key| source.name(flag, key);

    let price = name("--price", "price");
    require_finite(price, cli.price)?;
    if cli.price <= 0.0 {
        return Err(InputError::out_of_range(price, "must be > 0"));
    }
    require_non_negative(name("--interest-rate", "interestRate"), cli.interest_rate)?;
    if cli.loan_term_years == 0 || cli.loan_term_years > MAX_LOAN_TERM_YEARS {
        return Err(InputError::out_of_range(
            name("--loan-term-years", "loanTermYears"),
            "must be between 1 and 50",
        ));
    }
    require_percent(name("--lvr", "lvr"), cli.lvr)?;
    require_non_negative(name("--weekly-rent", "weeklyRent"), cli.weekly_rent)?;
    require_growth(name("--inflation-rate", "inflationRate"), cli.inflation_rate)?;
    require_growth(
        name("--rental-growth-rate", "rentalGrowthRate"),
        cli.rental_growth_rate,
    )?;
    require_non_negative(name("--water-rates", "waterRates"), cli.water_rates)?;
    require_non_negative(name("--maintenance", "maintenance"), cli.maintenance)?;
    require_percent(
        name("--property-manager-rate", "propertyManagerRate"),
        cli.property_manager_rate,
    )?;
    if cli.view_year > PROJECTION_YEARS {
        return Err(InputError::out_of_range(
            name("--view-year", "viewYear"),
            "must be between 0 and 30",
        ));
    }

    let mut overrides = OverrideSet::new();
    let mut pinned = |field: DerivedField,
                      flag: &'static str,
                      value: Option<f64>|
     -> Result<f64, InputError> {
        let Some(value) = value else {
            return Ok(0.0);
        };
        let label = source.name(flag, field.key());
        if field == DerivedField::CapitalGrowth {
            require_growth(label, value)?;
        } else {
            require_non_negative(label, value)?;
        }
        overrides.insert(field);
        Ok(value)
    };

    let capital_growth_rate =
        pinned(DerivedField::CapitalGrowth, "--capital-growth", cli.capital_growth)?;
    let land_value = pinned(DerivedField::LandValue, "--land-value", cli.land_value)?;
    let council_rates = pinned(DerivedField::CouncilRates, "--council-rates", cli.council_rates)?;
    let insurance = pinned(DerivedField::Insurance, "--insurance", cli.insurance)?;
    let body_corp = pinned(DerivedField::BodyCorp, "--body-corp", cli.body_corp)?;
    let land_tax = pinned(DerivedField::LandTax, "--land-tax", cli.land_tax)?;

    let inputs = InvestmentInputs {
        property_type: cli.property_type.into(),
        jurisdiction: cli.jurisdiction.into(),
        suburb: cli.suburb,
        postcode: cli.postcode,
        price: cli.price,
        interest_rate: cli.interest_rate,
        loan_term_years: cli.loan_term_years,
        lvr: cli.lvr,
        weekly_rent: cli.weekly_rent,
        capital_growth_rate,
        inflation_rate: cli.inflation_rate,
        rental_growth_rate: cli.rental_growth_rate,
        land_value,
        council_rates,
        insurance,
        body_corp,
        land_tax,
        water_rates: cli.water_rates,
        maintenance: cli.maintenance,
        property_manager_rate: cli.property_manager_rate,
    };

    Ok(ApiRequest {
        session: Session::from_parts(inputs, overrides),
        view_year: cli.view_year,
    })
}

/// Port for `serve`: the command-line argument, then `PROPVEST_PORT`, then 8080.
pub fn resolve_port(arg: Option<&str>, env_value: Option<&str>) -> u16 {
    let parse = |raw: &str| raw.trim().parse::<u16>().ok();
    arg.and_then(parse)
        .or_else(|| env_value.and_then(parse))
        .unwrap_or(DEFAULT_PORT)
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/land-tax", get(land_tax_handler))
        .route("/api/defaults", get(defaults_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "property projection API listening");
    info!("local access: http://127.0.0.1:{port}/api/defaults");
    axum::serve(listener, router()).await
}

/// Parses command-line arguments and renders the projection as JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let request = build_inputs(cli, InputSource::Cli)?;
    let inputs = request.session.inputs();
    let projection = request.session.projection();
    let response = build_project_response(&request, inputs, &projection)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "rejected projection payload");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let inputs = request.session.inputs();
    let projection = request.session.projection();
    debug!(
        view_year = request.view_year,
        overrides = request.session.overrides().len(),
        price = inputs.price,
        "projection computed"
    );

    match build_project_response(&request, inputs, &projection) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn land_tax_handler(Query(query): Query<LandTaxQuery>) -> Response {
    let (Some(land_value), Some(jurisdiction)) = (query.land_value, query.jurisdiction) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "landValue and jurisdiction are required",
        );
    };
    if let Err(err) = require_finite("landValue", land_value) {
        return error_response(StatusCode::BAD_REQUEST, &err.to_string());
    }

    let jurisdiction: Jurisdiction = CliJurisdiction::from(jurisdiction).into();
    json_response(
        StatusCode::OK,
        LandTaxResponse {
            jurisdiction,
            land_value,
            land_tax: whole_units(compute_land_tax(land_value, jurisdiction)),
            brackets: brackets(jurisdiction),
        },
    )
}

async fn defaults_handler() -> Response {
    json_response(
        StatusCode::OK,
        DefaultsResponse {
            inputs: InvestmentInputs::default(),
            overridable_fields: DerivedField::ALL.into_iter().map(DerivedField::key).collect(),
            property_types: PropertyType::ALL.to_vec(),
            jurisdictions: Jurisdiction::ALL.to_vec(),
        },
    )
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
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ApiRequest, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.property_type {
        cli.property_type = v.into();
    }
    if let Some(v) = payload.jurisdiction {
        cli.jurisdiction = v.into();
    }
    if let Some(v) = payload.suburb {
        cli.suburb = v;
    }
    if let Some(v) = payload.postcode {
        cli.postcode = v;
    }
    if let Some(v) = payload.price {
        cli.price = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.loan_term_years {
        cli.loan_term_years = v;
    }
    if let Some(v) = payload.lvr {
        cli.lvr = v;
    }
    if let Some(v) = payload.weekly_rent {
        cli.weekly_rent = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.rental_growth_rate {
        cli.rental_growth_rate = v;
    }
    if let Some(v) = payload.water_rates {
        cli.water_rates = v;
    }
    if let Some(v) = payload.maintenance {
        cli.maintenance = v;
    }
    if let Some(v) = payload.property_manager_rate {
        cli.property_manager_rate = v;
    }
    if let Some(v) = payload.view_year {
        cli.view_year = v;
    }

    cli.capital_growth = payload.capital_growth;
    cli.land_value = payload.land_value;
    cli.council_rates = payload.council_rates;
    cli.insurance = payload.insurance;
    cli.body_corp = payload.body_corp;
    cli.land_tax = payload.land_tax;

    // A listed override must carry its pinned value.
    if let Some(list) = &payload.overrides {
        let listed = OverrideSet::parse_list(list.names())?;
        for field in listed.iter() {
            let supplied = match field {
                DerivedField::LandValue => cli.land_value,
                DerivedField::CouncilRates => cli.council_rates,
                DerivedField::Insurance => cli.insurance,
                DerivedField::BodyCorp => cli.body_corp,
                DerivedField::LandTax => cli.land_tax,
                DerivedField::CapitalGrowth => cli.capital_growth,
            };
            if supplied.is_none() {
                return Err(InputError::MissingOverrideValue(field.key()));
            }
        }
    }

    build_inputs(cli, InputSource::Api)
}

fn default_cli_for_api() -> Cli {
    Cli {
        property_type: CliPropertyType::House,
        jurisdiction: CliJurisdiction::Vic,
        suburb: "Richmond".to_string(),
        postcode: "3121".to_string(),
        price: 850_000.0,
        interest_rate: 6.10,
        loan_term_years: 30,
        lvr: 80.0,
        weekly_rent: 650.0,
        capital_growth: None,
        inflation_rate: 2.8,
        rental_growth_rate: 5.5,
        land_value: None,
        council_rates: None,
        insurance: None,
        body_corp: None,
        land_tax: None,
        water_rates: 840.0,
        maintenance: 1_000.0,
        property_manager_rate: 10.0,
        view_year: 0,
    }
}

fn build_project_response<'a>(
    request: &ApiRequest,
    inputs: &'a InvestmentInputs,
    projection: &'a Projection,
) -> Result<ProjectResponse<'a>, InputError> {
    let kpis = year_kpis(projection, request.view_year)
        .ok_or(InputError::MissingYear(request.view_year))?;
    let summary =
        PropertySummary::from_year_zero(inputs, projection).ok_or(InputError::MissingYear(0))?;

    Ok(ProjectResponse {
        inputs,
        overrides: request.session.overrides(),
        view_year: request.view_year,
        loan_amount: projection.loan_amount,
        monthly_repayment: projection.monthly_repayment,
        annual_repayment: projection.annual_repayment,
        kpis,
        summary,
        rows: projection.rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    async fn send(request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = router()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).expect("json body");
        (status, cache_control, body)
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let (status, _, body) = send(request).await;
        (status, body)
    }

    async fn post_json(uri: &str, json: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request");
        let (status, _, body) = send(request).await;
        (status, body)
    }

    #[test]
    fn build_inputs_defaults_match_default_session() {
        let request = build_inputs(sample_cli(), InputSource::Cli).expect("valid inputs");
        assert_eq!(request.session, Session::new());
        assert_eq!(request.view_year, 0);
    }

    #[test]
    fn build_inputs_marks_supplied_derived_fields_as_overrides() {
        let mut cli = sample_cli();
        cli.land_value = Some(600_000.0);
        cli.capital_growth = Some(-1.0);

        let request = build_inputs(cli, InputSource::Cli).expect("valid inputs");
        let overrides = request.session.overrides();
        assert!(overrides.contains(DerivedField::LandValue));
        assert!(overrides.contains(DerivedField::CapitalGrowth));
        assert_eq!(overrides.len(), 2);

        let inputs = request.session.inputs();
        assert_approx(inputs.land_value, 600_000.0);
        assert_approx(inputs.capital_growth_rate, -1.0);
        assert_approx(inputs.land_tax, 2_150.0);
    }

    #[test]
    fn build_inputs_rejects_zero_loan_term() {
        let mut cli = sample_cli();
        cli.loan_term_years = 0;
        let err = build_inputs(cli, InputSource::Cli).expect_err("must reject zero term");
        assert!(err.to_string().contains("--loan-term-years"));
    }

    #[test]
    fn build_inputs_rejects_lvr_above_100() {
        let mut cli = sample_cli();
        cli.lvr = 105.0;
        let err = build_inputs(cli, InputSource::Cli).expect_err("must reject lvr");
        assert_eq!(err.to_string(), "--lvr must be between 0 and 100");
    }

    #[test]
    fn build_inputs_rejects_view_year_beyond_horizon() {
        let mut cli = sample_cli();
        cli.view_year = 31;
        let err = build_inputs(cli, InputSource::Cli).expect_err("must reject view year");
        assert!(err.to_string().contains("--view-year"));
    }

    #[test]
    fn build_inputs_rejects_negative_override_and_nan_price() {
        let mut cli = sample_cli();
        cli.insurance = Some(-1.0);
        assert!(build_inputs(cli, InputSource::Cli).is_err());

        let mut cli = sample_cli();
        cli.price = f64::NAN;
        let err = build_inputs(cli, InputSource::Cli).expect_err("must reject NaN");
        assert_eq!(err, InputError::NotFinite { field: "--price" });
    }

    #[test]
    fn cli_parses_flags_and_negative_rates() {
        let cli = Cli::try_parse_from([
            "propvest",
            "--property-type",
            "apartment",
            "--jurisdiction",
            "nsw",
            "--price",
            "500000",
            "--inflation-rate",
            "-1",
            "--view-year",
            "5",
        ])
        .expect("cli should parse");
        let request = build_inputs(cli, InputSource::Cli).expect("valid inputs");
        let inputs = request.session.inputs();

        assert_eq!(inputs.property_type, PropertyType::Apartment);
        assert_eq!(inputs.jurisdiction, Jurisdiction::Nsw);
        assert_approx(inputs.body_corp, 5_000.0);
        assert_approx(inputs.land_value, 150_000.0);
        assert_approx(inputs.inflation_rate, -1.0);
        assert_approx(inputs.land_tax, 0.0);
        assert_eq!(request.view_year, 5);
    }

    #[test]
    fn run_cli_renders_projection_json() {
        let json = run_cli(["propvest", "--view-year", "3", "--price", "600000"])
            .expect("cli run succeeds");
        let body: Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(body["viewYear"], Value::from(3));
        assert_eq!(body["kpis"]["year"], Value::from(3));
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(31));
        assert_eq!(body["inputs"]["landValue"], Value::from(270_000.0));
        assert_eq!(body["loanAmount"], Value::from(480_000.0));
    }

    #[test]
    fn run_cli_returns_parse_errors_instead_of_exiting() {
        let err = run_cli(["propvest", "--bogus"]).expect_err("unknown flag");
        assert!(matches!(err, CliError::Parse(_)), "got {err:?}");

        let err = run_cli(["propvest", "--help"]).expect_err("help is a parse outcome");
        let CliError::Parse(parse) = err else {
            panic!("expected a clap error");
        };
        assert_eq!(parse.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn run_cli_reports_invalid_values_with_flag_names() {
        let err = run_cli(["propvest", "--lvr", "120"]).expect_err("lvr out of range");
        assert!(matches!(err, CliError::Input(_)), "got {err:?}");
        assert_eq!(err.to_string(), "--lvr must be between 0 and 100");
    }

    #[test]
    fn api_errors_name_payload_keys() {
        let err = api_request_from_json(r#"{"lvr": 120}"#).expect_err("lvr out of range");
        assert_eq!(err, "lvr must be between 0 and 100");

        let err = api_request_from_json(r#"{"insurance": -5}"#).expect_err("negative override");
        assert_eq!(err, "insurance must be >= 0");

        let err = api_request_from_json(r#"{"viewYear": 31}"#).expect_err("view year");
        assert_eq!(err, "viewYear must be between 0 and 30");
    }

    #[test]
    fn resolve_port_prefers_argument_then_env() {
        assert_eq!(resolve_port(Some("9000"), Some("9100")), 9000);
        assert_eq!(resolve_port(None, Some("9100")), 9100);
        assert_eq!(resolve_port(Some("not-a-port"), Some(" 9100 ")), 9100);
        assert_eq!(resolve_port(None, Some("70000")), DEFAULT_PORT);
        assert_eq!(resolve_port(None, None), 8080);
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "propertyType": "Home & Land",
          "state": "qld",
          "suburb": "Paddington",
          "postcode": "4064",
          "price": 1200000,
          "interestRate": 5.9,
          "loanTerm": 25,
          "lvr": 70,
          "weeklyRent": 900,
          "rentalGrowthRate": 3,
          "landTax": 3000,
          "overrides": ["landTax"],
          "viewYear": 10
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let inputs = request.session.inputs();

        assert_eq!(inputs.property_type, PropertyType::HomeAndLand);
        assert_eq!(inputs.jurisdiction, Jurisdiction::Qld);
        assert_eq!(inputs.suburb, "Paddington");
        assert_eq!(inputs.loan_term_years, 25);
        assert_approx(inputs.interest_rate, 5.9);
        assert_approx(inputs.land_value, 780_000.0);
        assert_approx(inputs.land_tax, 3_000.0);
        assert_approx(inputs.capital_growth_rate, 3.5);
        assert_eq!(request.view_year, 10);
        assert_eq!(
            request.session.overrides().iter().collect::<Vec<_>>(),
            vec![DerivedField::LandTax]
        );
    }

    #[test]
    fn api_request_rejects_unknown_override_names() {
        let err = api_request_from_json(r#"{"overrides": ["price"]}"#)
            .expect_err("must reject non-derivable field");
        assert_eq!(err, "unknown override field: price");
    }

    #[test]
    fn api_request_rejects_override_without_value() {
        let err = api_request_from_json(r#"{"overrides": "landValue,insurance", "insurance": 10}"#)
            .expect_err("must reject missing value");
        assert_eq!(err, "override landValue requires a value");
    }

    #[test]
    fn api_request_rejects_unknown_property_type() {
        let err = api_request_from_json(r#"{"propertyType": "castle"}"#)
            .expect_err("must reject property type");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn project_response_carries_view_year_kpis() {
        let request = api_request_from_json(r#"{"viewYear": 1}"#).expect("valid");
        let inputs = request.session.inputs();
        let projection = request.session.projection();
        let response = build_project_response(&request, inputs, &projection).expect("response");

        assert_eq!(response.kpis.year, 1);
        assert_eq!(response.rows.len(), 31);
        assert_approx(response.rows[1].rental_income, 35_659.0);
        assert_approx(response.summary.net_cash_flow, -28_052.0);
    }

    #[test]
    fn project_response_reports_missing_rows_by_year() {
        let request = ApiRequest {
            session: Session::new(),
            view_year: 31,
        };
        let projection = request.session.projection();
        let err = build_project_response(&request, request.session.inputs(), &projection)
            .expect_err("no row 31");
        assert_eq!(err, InputError::MissingYear(31));
        assert_eq!(err.to_string(), "projection has no row for year 31");
    }

    #[tokio::test]
    async fn land_tax_endpoint_previews_scale() {
        let (status, body) = get_json("/api/land-tax?landValue=300000&jurisdiction=VIC").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["landTax"], Value::from(650.0));
        assert_eq!(body["jurisdiction"], Value::from("VIC"));
        assert_eq!(body["brackets"].as_array().map(Vec::len), Some(7));
    }

    #[tokio::test]
    async fn land_tax_endpoint_matches_engine_for_non_positive_values() {
        let (status, body) = get_json("/api/land-tax?landValue=-5000&jurisdiction=NSW").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["landTax"], Value::from(0.0));
        assert_eq!(body["landValue"], Value::from(-5_000.0));
    }

    #[tokio::test]
    async fn defaults_endpoint_lists_snapshot_and_choices() {
        let request = Request::builder()
            .uri("/api/defaults")
            .body(Body::empty())
            .expect("request");
        let (status, cache_control, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache_control.as_deref(), Some("no-store"));
        assert_eq!(body["inputs"]["landValue"], Value::from(382_500.0));
        assert_eq!(body["inputs"]["landTax"], Value::from(1_063.0));
        assert_eq!(body["inputs"]["jurisdiction"], Value::from("VIC"));
        assert_eq!(body["overridableFields"][0], Value::from("landValue"));
        assert_eq!(body["overridableFields"].as_array().map(Vec::len), Some(6));
        assert_eq!(body["propertyTypes"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["jurisdictions"].as_array().map(Vec::len), Some(8));
    }

    #[tokio::test]
    async fn project_endpoint_accepts_posted_json() {
        let (status, body) = post_json(
            "/api/project",
            r#"{"propertyType": "apartment", "price": 500000, "viewYear": 1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["viewYear"], Value::from(1));
        assert_eq!(body["inputs"]["bodyCorp"], Value::from(5_000.0));
        assert_eq!(body["inputs"]["capitalGrowthRate"], Value::from(1.0));
        assert_eq!(body["rows"][1]["propertyValue"], Value::from(505_000.0));
        assert_eq!(body["overrides"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn project_endpoint_rejects_posted_garbage() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/project")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"price": "#))
            .expect("request");
        let response = router().oneshot(request).await.expect("router is infallible");
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn land_tax_endpoint_requires_both_params() {
        let (status, body) = get_json("/api/land-tax?landValue=300000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn project_endpoint_accepts_query_overrides() {
        let (status, body) =
            get_json("/api/project?viewYear=2&overrides=landValue&landValue=500000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["viewYear"], Value::from(2));
        assert_eq!(body["inputs"]["landValue"], Value::from(500_000.0));
        assert_eq!(body["inputs"]["landTax"], Value::from(1_650.0));
        assert_eq!(body["overrides"], serde_json::json!(["landValue"]));
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(31));
    }

    #[tokio::test]
    async fn project_endpoint_rejects_bad_payload() {
        let (status, body) = get_json("/api/project?loanTerm=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            Value::from("loanTermYears must be between 1 and 50")
        );
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = get_json("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], Value::from("Not found"));
    }
}
