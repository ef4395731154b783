//! Configuration for the watcher.

use std::time::Duration;

use slotwatch_booking::ProbeTarget;

use crate::error::ConfigError;

/// Availability endpoint used when `SLOTWATCH_ENDPOINT` is unset.
pub const DEFAULT_ENDPOINT: &str = "https://outlook.office365.com/BookingsService/api/V1/bookingBusinessesc2/monetrapirkanmaarekrytointipalvelut@monetra.fi/GetStaffAvailability?app=BookingsC1";

/// Public booking page used when `SLOTWATCH_BOOKING_URL` is unset.
pub const DEFAULT_BOOKING_URL: &str = "https://outlook.office365.com/owa/calendar/monetrapirkanmaarekrytointipalvelut@monetra.fi/bookings/";

/// Probe targets used when `SLOTWATCH_PROBES` is unset.
pub const DEFAULT_PROBES: &str = "1df7f565-8337-412b-91ec-b8ffd49fe6f2:4f3b2516-99cd-4295-9328-afefb3b403e3;51b3c1e4-2dc8-46ab-88e3-604cb4164c4c:84d3f0dd-33f9-4d2d-a741-98b86e790315";

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token. Only required in bot mode.
    pub telegram_token: Option<String>,

    /// Telegram Bot API base URL.
    pub telegram_api_url: String,

    /// Availability endpoint of the scheduling source.
    pub endpoint: String,

    /// Booking page linked from availability messages.
    pub booking_url: String,

    /// Service/staff pairs probed each cycle.
    pub targets: Vec<ProbeTarget>,

    /// Time-zone label sent with the probe window.
    pub time_zone: String,

    /// Probe window length in months.
    pub window_months: u32,

    /// Interval between reconciliation checks, in seconds.
    pub check_interval_secs: u64,

    /// Interval between digest deliveries, in seconds.
    pub digest_interval_secs: u64,

    /// Timeout for each probe request, in seconds.
    pub http_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.trim().is_empty());

        let telegram_api_url = lookup("SLOTWATCH_TELEGRAM_API")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string());

        let endpoint = lookup("SLOTWATCH_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let booking_url =
            lookup("SLOTWATCH_BOOKING_URL").unwrap_or_else(|| DEFAULT_BOOKING_URL.to_string());

        let targets = parse_targets(
            "SLOTWATCH_PROBES",
            &lookup("SLOTWATCH_PROBES").unwrap_or_else(|| DEFAULT_PROBES.to_string()),
        )?;

        let time_zone =
            lookup("SLOTWATCH_TIME_ZONE").unwrap_or_else(|| "FLE Standard Time".to_string());

        let window_months = parse_positive("SLOTWATCH_WINDOW_MONTHS", lookup("SLOTWATCH_WINDOW_MONTHS"), 2)?;
        let check_interval_secs =
            parse_positive("SLOTWATCH_CHECK_INTERVAL_SECS", lookup("SLOTWATCH_CHECK_INTERVAL_SECS"), 60)?;
        let digest_interval_secs = parse_positive(
            "SLOTWATCH_DIGEST_INTERVAL_SECS",
            lookup("SLOTWATCH_DIGEST_INTERVAL_SECS"),
            30 * 60,
        )?;
        let http_timeout_secs =
            parse_positive("SLOTWATCH_HTTP_TIMEOUT_SECS", lookup("SLOTWATCH_HTTP_TIMEOUT_SECS"), 30)?;

        let log_level = lookup("SLOTWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("SLOTWATCH_LOG_FORMAT").as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidChoice {
                    var: "SLOTWATCH_LOG_FORMAT",
                    expected: "pretty, json",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            telegram_token,
            telegram_api_url,
            endpoint,
            booking_url,
            targets,
            time_zone,
            window_months,
            check_interval_secs,
            digest_interval_secs,
            http_timeout_secs,
            log_level,
            log_format,
        })
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn digest_interval(&self) -> Duration {
        Duration::from_secs(self.digest_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_positive<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = value else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}

fn parse_targets(var: &'static str, raw: &str) -> Result<Vec<ProbeTarget>, ConfigError> {
    let targets = raw
        .split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            entry.parse::<ProbeTarget>().map_err(|e| ConfigError::InvalidTarget {
                var,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if targets.is_empty() {
        return Err(ConfigError::NoTargets { var });
    }
    Ok(targets)
}
