use chrono::{Local, NaiveDate};
use clap::Args;
use liman::config::AppConfig;
use liman::deadline::Deadline;
use liman::error::AppError;
use liman::fx::{Currency, FxRateProvider};
use liman::memory::{MemoryCatalog, MemoryFxStore, MemoryPersonnel};
use liman::pricing::{InputMap, PricingOptions, Service, TariffEntry};
use liman::repository::RepositoryError;
use liman::sgk::{parse_document, Employee, EmployeeId, PeriodCode, SgkIngestError, TcKimlik, TenantId};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::infra::{parse_date, parse_input, parse_period, Platform};

pub(crate) const DEMO_TENANT: &str = "liman-demo";

#[derive(Args, Debug)]
pub(crate) struct FxRatesArgs {
    /// Date to look up (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct PriceArgs {
    /// Service code from the demo catalog
    #[arg(long)]
    pub(crate) service: String,
    /// Pricing date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Formula input as name=value; repeat for several inputs
    #[arg(long = "input", value_parser = parse_input)]
    pub(crate) inputs: Vec<(String, Value)>,
    /// Currency of the result (TRY, USD, EUR, GBP)
    #[arg(long, default_value = "TRY")]
    pub(crate) currency: Currency,
    /// Apply the cabotage discount
    #[arg(long)]
    pub(crate) cabotage: bool,
    /// Cabotage discount percentage; the configured default applies when omitted
    #[arg(long)]
    pub(crate) cabotage_rate: Option<Decimal>,
}

#[derive(Args, Debug)]
pub(crate) struct SgkParseArgs {
    /// Service-list PDF exported from the SGK portal
    pub(crate) path: PathBuf,
    /// Declaration period (YYYYMM)
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: PeriodCode,
}

fn service(
    code: &str,
    name: &str,
    base_price: Decimal,
    currency: Currency,
    calculation_type: &str,
    formula_params: Value,
) -> Service {
    Service {
        service_code: code.to_string(),
        name: name.to_string(),
        base_price,
        currency,
        vat_rate: Decimal::from(20),
        calculation_type: calculation_type.to_string(),
        formula_params,
        active: true,
    }
}

/// Services a small container terminal bills for, with one dated price revision.
pub(crate) fn catalog() -> Result<MemoryCatalog, RepositoryError> {
    let catalog = MemoryCatalog::default();
    let services = [
        service("BERTH", "Rıhtım işgaliye", Decimal::from(1000), Currency::Try, "FIXED", Value::Null),
        service("MOORING", "Palamar hizmeti", Decimal::from(1200), Currency::Try, "FIXED", Value::Null),
        service(
            "CRANE_MOVE",
            "Vinç hareketi",
            Decimal::new(2550, 2),
            Currency::Usd,
            "PER_UNIT",
            Value::Null,
        ),
        service(
            "FORKLIFT",
            "Forklift hizmeti",
            Decimal::from(80),
            Currency::Usd,
            "PER_BLOCK",
            json!({ "base_weight_ton": 3, "base_time_min": 30 }),
        ),
        service(
            "VEHICLE_PARKING",
            "Araç park",
            Decimal::from(15),
            Currency::Usd,
            "VEHICLE_4H_RULE",
            json!({ "base_minutes": 240 }),
        ),
        service(
            "PILOTAGE",
            "Kılavuzluk",
            Decimal::from(150),
            Currency::Eur,
            "BASE_PLUS_INCREMENT",
            json!({ "increment_rate": "0.05" }),
        ),
        service(
            "CONTAINER_STORAGE",
            "Konteyner ardiye",
            Decimal::from(2),
            Currency::Usd,
            "X_SECONDARY",
            json!({ "primary_input": "teu", "secondary_input": "days" }),
        ),
    ];
    for service in services {
        catalog.insert_service(service)?;
    }

    catalog.insert_tariff_entry(TariffEntry {
        id: 1,
        service_code: "BERTH".to_string(),
        valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
        valid_to: None,
        override_price: Some(Decimal::from(1150)),
        override_currency: None,
        active: true,
        version_note: Some("2026 tarifesi".to_string()),
    })?;
    Ok(catalog)
}

/// A handful of employees for the demo tenant.
pub(crate) fn personnel() -> Result<MemoryPersonnel, RepositoryError> {
    let personnel = MemoryPersonnel::default();
    let roster = [
        ("demo-001", "Ahmet Kara", Some("10000000146")),
        ("demo-002", "Ayşe Demir", Some("10000008065")),
        ("demo-003", "Mehmet Şahin", Some("10000015984")),
        ("demo-004", "Olena Kovalenko", None),
    ];
    for (id, name, tc) in roster {
        personnel.insert_employee(Employee {
            id: EmployeeId(id.to_string()),
            tenant_id: TenantId(DEMO_TENANT.to_string()),
            full_name: name.to_string(),
            nationality: Some(if tc.is_some() { "TR" } else { "UA" }.to_string()),
            tc_kimlik: tc.and_then(|raw| TcKimlik::parse(raw).ok()),
            passport_no: tc.is_none().then(|| "FA123456".to_string()),
            active: true,
            sgk_last_check_period: None,
            sgk_is_active_last_period: None,
        })?;
    }
    Ok(personnel)
}

fn print_json(value: &impl Serialize) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) async fn run_fx_rates(args: FxRatesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let provider = FxRateProvider::from_config(&config.fx, Arc::new(MemoryFxStore::default()))?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    let snapshot = provider
        .get_rates(date, Deadline::after(config.server.request_deadline))
        .await?;
    print_json(&snapshot)
}

pub(crate) async fn run_price(args: PriceArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let platform = Platform::from_config(&config)?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let inputs: InputMap = args.inputs.into_iter().collect();
    let options = PricingOptions {
        target_currency: args.currency,
        apply_cabotage_discount: args.cabotage,
        cabotage_rate: args.cabotage_rate,
    };

    let priced = platform
        .pricing
        .price(
            &args.service,
            date,
            &inputs,
            &options,
            Deadline::after(config.server.request_deadline),
        )
        .await?;
    print_json(&priced)
}

pub(crate) async fn run_sgk_parse(args: SgkParseArgs) -> Result<(), AppError> {
    let bytes = tokio::fs::read(&args.path).await?;
    let never = AtomicBool::new(false);
    let outcome = parse_document(&bytes, args.period, &never).map_err(SgkIngestError::from)?;
    if outcome.pdf_unreadable {
        eprintln!("{} is not a readable PDF", args.path.display());
    }
    print_json(&outcome)
}
