//! # Fiscal Configuration
//!
//! Configuration for the signing core's orchestration layer.
//!
//! ## Configuration File Format
//! ```toml
//! # fiscal.toml
//! [register]
//! cash_register_id = "AT-REG-001"
//! certificate_serial = "CERT-77"
//! tax_number = "912345678"
//!
//! [authority]
//! base_url = "https://finanzonline.bmf.gv.at/fon"
//! submit_timeout_secs = 10
//!
//! [network]
//! probe_addr = "1.1.1.1:443"
//! probe_timeout_secs = 3
//! probe_interval_secs = 30
//!
//! [queue]
//! cycle_interval_secs = 5
//! retention_days = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use kassa_core::validation::{validate_register_id, validate_tax_number};

use crate::error::{FiscalError, FiscalResult};

// =============================================================================
// Register Configuration
// =============================================================================

/// Identity of the cash register this core signs for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Cash register id, embedded in every canonical receipt string.
    pub cash_register_id: String,

    /// Certificate serial of the signing device's certificate.
    pub certificate_serial: String,

    /// Austrian tax number (Steuernummer) used in authority submissions.
    pub tax_number: String,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            cash_register_id: "AT-REG-001".to_string(),
            certificate_serial: "CERT-DEMO-1".to_string(),
            tax_number: "912345678".to_string(),
        }
    }
}

// =============================================================================
// Authority Configuration
// =============================================================================

/// Tax portal endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Base URL of the FinanzOnline submission endpoint.
    pub base_url: String,

    /// Timeout for one submission request (seconds).
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
}

fn default_submit_timeout() -> u64 {
    10
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            base_url: "https://finanzonline.bmf.gv.at/fon".to_string(),
            submit_timeout_secs: default_submit_timeout(),
        }
    }
}

// =============================================================================
// Network Configuration
// =============================================================================

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP address probed for raw internet reachability.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Probe timeout (seconds). Short: probes must never hold anything up.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Interval between status recomputations (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_probe_addr() -> String {
    "1.1.1.1:443".to_string()
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_probe_interval() -> u64 {
    30
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            probe_addr: default_probe_addr(),
            probe_timeout_secs: default_probe_timeout(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

// =============================================================================
// Queue Configuration
// =============================================================================

/// Submission queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Fixed interval between queue cycles (seconds). Not a backoff: the
    /// cadence stays constant whether cycles succeed or fail.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Days after which an unsubmitted record is archived instead of
    /// retried.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_cycle_interval() -> u64 {
    5
}

fn default_retention_days() -> i64 {
    kassa_core::SUBMISSION_RETENTION_DAYS
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            cycle_interval_secs: default_cycle_interval(),
            retention_days: default_retention_days(),
        }
    }
}

// =============================================================================
// Fiscal Configuration
// =============================================================================

/// Complete configuration of the fiscal orchestration layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiscalConfig {
    #[serde(default)]
    pub register: RegisterConfig,

    #[serde(default)]
    pub authority: AuthorityConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

impl FiscalConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> FiscalResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading fiscal configuration");

        let raw = std::fs::read_to_string(path)?;
        let config: FiscalConfig = toml::from_str(&raw)?;
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration, falling back to defaults when the file does not
    /// exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Falling back to default fiscal configuration"
                );
                FiscalConfig::default()
            }
        }
    }

    /// Saves configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> FiscalResult<()> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    /// Validates identifiers and endpoint settings.
    pub fn validate(&self) -> FiscalResult<()> {
        validate_register_id(&self.register.cash_register_id)
            .map_err(|e| FiscalError::InvalidConfig(e.to_string()))?;
        validate_tax_number(&self.register.tax_number)
            .map_err(|e| FiscalError::InvalidConfig(e.to_string()))?;

        url::Url::parse(&self.authority.base_url)
            .map_err(|e| FiscalError::InvalidConfig(format!("authority.base_url: {e}")))?;

        if self.queue.retention_days <= 0 {
            return Err(FiscalError::InvalidConfig(
                "queue.retention_days must be positive".to_string(),
            ));
        }
        if self.network.probe_timeout_secs == 0 || self.queue.cycle_interval_secs == 0 {
            return Err(FiscalError::InvalidConfig(
                "probe timeout and cycle interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        FiscalConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [register]
            cash_register_id = "AT-REG-042"
            certificate_serial = "CERT-42"
            tax_number = "987654321"
        "#;

        let config: FiscalConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.register.cash_register_id, "AT-REG-042");
        assert_eq!(config.queue.cycle_interval_secs, 5);
        assert_eq!(config.queue.retention_days, 30);
        assert_eq!(config.network.probe_timeout_secs, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = FiscalConfig::default();
        config.register.tax_number = "nope".to_string();
        assert!(matches!(
            config.validate(),
            Err(FiscalError::InvalidConfig(_))
        ));

        let mut config = FiscalConfig::default();
        config.authority.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = FiscalConfig::default();
        config.queue.retention_days = 0;
        assert!(config.validate().is_err());
    }
}
