use serde::Deserialize;
use std::env;
use drayage_rates::{RateSchedule, SchedulingRules};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub rates: RateSchedule,
    #[serde(default)]
    pub scheduling: SchedulingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "drayage.events".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("Invalid business rules: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `DRAYAGE__SERVER__PORT=8081`
            .add_source(config::Environment::with_prefix("DRAYAGE").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rate tables and scheduling constants must be sane before anything is served
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.business_rules
            .rates
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.business_rules
            .scheduling
            .validate()
            .map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drayage_shared::ContainerSize;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [server]
        port = 8080

        [business_rules.rates.per_diem]
        free_days = 4

        [[business_rules.rates.per_diem.tiers.40]]
        from_day = 1
        to_day = 5
        rate_per_day = "85.00"

        [[business_rules.rates.per_diem.tiers.40]]
        from_day = 6
        rate_per_day = "125.00"

        [business_rules.rates.demurrage.tiers]

        [business_rules.scheduling]
        min_lead_time_hours = 3
    "#;

    #[test]
    fn test_loads_rates_and_scheduling() {
        let config = Config::from_toml(SAMPLE).expect("config should load");
        assert_eq!(config.server.port, 8080);
        assert!(config.kafka.is_none());

        let rates = &config.business_rules.rates;
        assert_eq!(rates.currency, "USD");
        assert_eq!(rates.per_diem.free_days, 4);
        let tiers = &rates.per_diem.tiers[&ContainerSize::Ft40];
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[1].rate_per_day, dec!(125.00));

        let scheduling = &config.business_rules.scheduling;
        assert_eq!(scheduling.min_lead_time_hours, 3);
        assert_eq!(scheduling.window_minutes, 120);
    }

    #[test]
    fn test_rejects_gapped_tiers() {
        let raw = SAMPLE.replace("from_day = 6", "from_day = 8");
        assert!(matches!(Config::from_toml(&raw), Err(ConfigError::Invalid(_))));
    }
}
