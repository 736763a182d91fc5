//! Quote CLI configuration

use std::path::PathBuf;

use clap::{Args, Parser};

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Atlas & Arrow quote configuration
#[derive(Debug, Parser)]
#[command(name = "atlas-quote", about = "Price an Atlas & Arrow cart", long_about = None)]
pub struct QuoteConfig {
    /// Cart fixture (YAML) to price
    #[arg(env = "ATLAS_CART")]
    pub cart: PathBuf,

    /// Coupon code to apply
    #[arg(short, long, env = "ATLAS_COUPON")]
    pub coupon: Option<String>,

    /// Price as the customer's first order
    #[arg(long, env = "ATLAS_FIRST_ORDER", default_value_t = false)]
    pub first_order: bool,

    /// Coupon table (YAML), instead of the built-in storefront table
    #[arg(long, env = "ATLAS_COUPONS")]
    pub coupons: Option<PathBuf>,

    /// Profile store (JSON) holding redeemed coupons; kept in memory when omitted
    #[arg(long, env = "ATLAS_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Record the applied coupon as redeemed in the profile store
    #[arg(long, default_value_t = false)]
    pub redeem: bool,

    /// Currency an empty cart is priced in
    #[arg(long, env = "ATLAS_CURRENCY", default_value = "INR")]
    pub currency: String,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl QuoteConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_quote_arguments() -> TestResult {
        let config = QuoteConfig::try_parse_from([
            "atlas-quote",
            "fixtures/carts/workspace.yml",
            "--coupon",
            "save500",
            "--first-order",
            "--log-format",
            "json",
        ])?;

        assert_eq!(config.cart, PathBuf::from("fixtures/carts/workspace.yml"));
        assert_eq!(config.coupon.as_deref(), Some("save500"));
        assert!(config.first_order);
        assert!(!config.redeem);
        assert!(matches!(config.logging.log_format, LogFormat::Json));

        Ok(())
    }
}
