use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::discovery::QualificationThresholds;
use crate::workflows::pipeline::{AutoAdvance, PipelineConfig, RetryPolicy};
use crate::workflows::pricing::{
    CatalogError, MilestoneTiers, Money, RecommenderConfig, StaticCatalog,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
    pub catalog: CatalogSources,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline: load_pipeline()?,
            catalog: CatalogSources {
                service_catalog_csv: env::var("SALES_SERVICE_CATALOG_CSV").ok().map(PathBuf::from),
                pricing_rules_json: env::var("SALES_PRICING_RULES_JSON").ok().map(PathBuf::from),
            },
        })
    }
}

fn load_pipeline() -> Result<PipelineConfig, ConfigError> {
    let defaults = PipelineConfig::default();

    let thresholds = QualificationThresholds {
        qualified_threshold: number(
            "SALES_QUALIFIED_THRESHOLD",
            defaults.thresholds.qualified_threshold,
        )?,
        disqualified_floor: number(
            "SALES_DISQUALIFIED_FLOOR",
            defaults.thresholds.disqualified_floor,
        )?,
        budget_authority_floor: number(
            "SALES_BUDGET_AUTHORITY_FLOOR",
            defaults.thresholds.budget_authority_floor,
        )?,
    };
    if thresholds.qualified_threshold > 100
        || thresholds.disqualified_floor > thresholds.qualified_threshold
        || thresholds.budget_authority_floor > 10
    {
        return Err(ConfigError::InvalidThresholds);
    }

    let tiers = MilestoneTiers {
        small_project_max: dollars("SALES_MILESTONE_SMALL_MAX", defaults.tiers.small_project_max)?,
        large_project_min: dollars("SALES_MILESTONE_LARGE_MIN", defaults.tiers.large_project_min)?,
    };
    if tiers.small_project_max >= tiers.large_project_min {
        return Err(ConfigError::InvalidTiers);
    }

    let retry = RetryPolicy {
        max_retries: number("SALES_RETRY_MAX", defaults.retry.max_retries)?,
        initial_backoff: millis("SALES_RETRY_BACKOFF_MS", defaults.retry.initial_backoff)?,
        max_backoff: millis("SALES_RETRY_MAX_BACKOFF_MS", defaults.retry.max_backoff)?,
        call_timeout: millis("SALES_COLLABORATOR_TIMEOUT_MS", defaults.retry.call_timeout)?,
    };

    let auto_advance = AutoAdvance {
        sow_generation: flag("SALES_AUTO_SOW", defaults.auto_advance.sow_generation)?,
        contract_generation: flag(
            "SALES_AUTO_CONTRACT",
            defaults.auto_advance.contract_generation,
        )?,
        payment_setup: flag("SALES_AUTO_PAYMENT", defaults.auto_advance.payment_setup)?,
        project_kickoff: flag("SALES_AUTO_KICKOFF", defaults.auto_advance.project_kickoff)?,
    };

    let recommender = RecommenderConfig {
        integration_min_systems: number(
            "SALES_INTEGRATION_MIN_SYSTEMS",
            defaults.recommender.integration_min_systems,
        )?,
        ..defaults.recommender
    };

    Ok(PipelineConfig {
        thresholds,
        tiers,
        retry,
        auto_advance,
        recommender,
    })
}

fn number<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { variable, value }),
        Err(_) => Ok(default),
    }
}

/// Whole, non-negative dollar amounts up to `u32::MAX`.
fn dollars(variable: &'static str, default: Money) -> Result<Money, ConfigError> {
    let default_dollars = u32::try_from(default.cents() / 100).unwrap_or(u32::MAX);
    number::<u32>(variable, default_dollars).map(|value| Money::from_dollars(i64::from(value)))
}

fn millis(variable: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    number(variable, default_ms).map(Duration::from_millis)
}

fn flag(variable: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(variable) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { variable, value }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Optional overrides for the built-in service catalog and pricing rules.
#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    pub service_catalog_csv: Option<PathBuf>,
    pub pricing_rules_json: Option<PathBuf>,
}

impl CatalogSources {
    pub fn build(&self) -> Result<StaticCatalog, CatalogError> {
        let mut catalog = StaticCatalog::standard();
        if let Some(path) = &self.service_catalog_csv {
            catalog = catalog.with_services(StaticCatalog::services_from_csv_path(path)?);
        }
        if let Some(path) = &self.pricing_rules_json {
            catalog = catalog.with_rules(StaticCatalog::rules_from_json_path(path)?)?;
        }
        Ok(catalog)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidFlag { variable: &'static str, value: String },
    InvalidThresholds,
    InvalidTiers,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a non-negative number, got '{value}'")
            }
            ConfigError::InvalidFlag { variable, value } => {
                write!(f, "{variable} must be true or false, got '{value}'")
            }
            ConfigError::InvalidThresholds => write!(
                f,
                "qualification thresholds must satisfy SALES_DISQUALIFIED_FLOOR <= \
                 SALES_QUALIFIED_THRESHOLD <= 100 and SALES_BUDGET_AUTHORITY_FLOOR <= 10"
            ),
            ConfigError::InvalidTiers => write!(
                f,
                "SALES_MILESTONE_SMALL_MAX must be below SALES_MILESTONE_LARGE_MIN"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const SALES_VARIABLES: [&str; 16] = [
        "SALES_QUALIFIED_THRESHOLD",
        "SALES_DISQUALIFIED_FLOOR",
        "SALES_BUDGET_AUTHORITY_FLOOR",
        "SALES_MILESTONE_SMALL_MAX",
        "SALES_MILESTONE_LARGE_MIN",
        "SALES_RETRY_MAX",
        "SALES_RETRY_BACKOFF_MS",
        "SALES_RETRY_MAX_BACKOFF_MS",
        "SALES_COLLABORATOR_TIMEOUT_MS",
        "SALES_AUTO_SOW",
        "SALES_AUTO_CONTRACT",
        "SALES_AUTO_PAYMENT",
        "SALES_AUTO_KICKOFF",
        "SALES_INTEGRATION_MIN_SYSTEMS",
        "SALES_SERVICE_CATALOG_CSV",
        "SALES_PRICING_RULES_JSON",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        for variable in SALES_VARIABLES {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline.thresholds, QualificationThresholds::default());
        assert_eq!(config.pipeline.tiers, MilestoneTiers::default());
        assert_eq!(config.pipeline.retry, RetryPolicy::default());
        assert_eq!(config.pipeline.auto_advance, AutoAdvance::default());
        assert!(config.catalog.service_catalog_csv.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_pipeline_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SALES_QUALIFIED_THRESHOLD", "70");
        env::set_var("SALES_RETRY_MAX", "5");
        env::set_var("SALES_COLLABORATOR_TIMEOUT_MS", "2500");
        env::set_var("SALES_AUTO_CONTRACT", "false");
        env::set_var("SALES_MILESTONE_SMALL_MAX", "40000");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.pipeline.thresholds.qualified_threshold, 70);
        assert_eq!(config.pipeline.retry.max_retries, 5);
        assert_eq!(config.pipeline.retry.call_timeout, Duration::from_millis(2500));
        assert!(!config.pipeline.auto_advance.contract_generation);
        assert!(config.pipeline.auto_advance.payment_setup);
        assert_eq!(
            config.pipeline.tiers.small_project_max,
            Money::from_dollars(40_000)
        );
        reset_env();
    }

    #[test]
    fn rejects_malformed_values_by_name() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SALES_RETRY_MAX", "three");
        let error = AppConfig::load().expect_err("non-numeric retry count");
        assert!(error.to_string().contains("SALES_RETRY_MAX"));

        reset_env();
        env::set_var("SALES_AUTO_SOW", "sometimes");
        let error = AppConfig::load().expect_err("unknown flag value");
        assert!(error.to_string().contains("SALES_AUTO_SOW"));
        reset_env();
    }

    #[test]
    fn rejects_inconsistent_thresholds_and_tiers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SALES_DISQUALIFIED_FLOOR", "80");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidThresholds)
        ));

        reset_env();
        env::set_var("SALES_MILESTONE_SMALL_MAX", "200000");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidTiers)));
        reset_env();
    }

    #[test]
    fn rejects_negative_and_oversized_tier_bounds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        for value in ["-5", "99999999999999999999"] {
            reset_env();
            env::set_var("SALES_MILESTONE_SMALL_MAX", value);
            assert!(matches!(
                AppConfig::load(),
                Err(ConfigError::InvalidNumber {
                    variable: "SALES_MILESTONE_SMALL_MAX",
                    ..
                })
            ));
        }
        reset_env();
    }

    #[test]
    fn standard_catalog_without_overrides() {
        let catalog = CatalogSources::default().build().expect("catalog builds");
        let services = crate::workflows::pricing::ServiceCatalog::services(&catalog)
            .expect("services listed");
        assert_eq!(services.len(), 5);
    }
}
