use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

use dunning_core::config::Config;

use crate::domain::calendar::RunWindow;
use crate::domain::reminder::ReminderChannel;
use crate::infra::calendar::HolidayCalendar;

/// Retry service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port for the HTTP server. Env var: `RETRY_PORT`.
    #[serde(default = "default_port")]
    pub retry_port: u16,
    pub payment_gateway_url: String,
    #[serde(default = "default_payment_timeout")]
    pub payment_timeout_secs: u64,

    pub email_notifier_url: Option<String>,
    pub sms_notifier_url: Option<String>,
    pub phone_call_notifier_url: Option<String>,
    pub push_notifier_url: Option<String>,
    pub postal_mail_notifier_url: Option<String>,
    #[serde(default = "default_notifier_timeout")]
    pub notifier_timeout_secs: u64,

    /// Wall-clock time of the daily run, also the due cutoff.
    #[serde(default = "default_run_time")]
    pub daily_run_time: NaiveTime,
    #[serde(default = "default_run_timezone")]
    pub daily_run_timezone: Tz,

    #[serde(default = "default_sweep_interval")]
    pub reminder_sweep_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub reminder_batch_size: u64,

    #[serde(default = "default_true")]
    pub calendar_skip_weekends: bool,
    /// Comma-separated `YYYY-MM-DD` closed dates in the run zone.
    #[serde(default)]
    pub calendar_holidays: String,

    #[serde(default = "default_true")]
    pub workers_enabled: bool,
}

impl Config for RetryConfig {}

fn default_port() -> u16 {
    3120
}

fn default_payment_timeout() -> u64 {
    30
}

fn default_notifier_timeout() -> u64 {
    15
}

fn default_run_time() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_run_timezone() -> Tz {
    Tz::Europe__Paris
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_batch_size() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl RetryConfig {
    pub fn run_window(&self) -> RunWindow {
        RunWindow {
            zone: self.daily_run_timezone,
            cutoff: self.daily_run_time,
        }
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn notifier_timeout(&self) -> Duration {
        Duration::from_secs(self.notifier_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_sweep_interval_secs.max(1))
    }

    /// Holidays apply to the run zone.
    pub fn calendar(&self) -> Result<HolidayCalendar, chrono::ParseError> {
        let holidays = HolidayCalendar::parse_dates(&self.calendar_holidays)?;
        Ok(HolidayCalendar::new(self.calendar_skip_weekends)
            .with_holidays(self.daily_run_timezone, holidays))
    }

    /// Configured notifier endpoints; channels without a URL are left out.
    pub fn notifier_urls(&self) -> Vec<(ReminderChannel, &str)> {
        [
            (ReminderChannel::Email, &self.email_notifier_url),
            (ReminderChannel::Sms, &self.sms_notifier_url),
            (ReminderChannel::PhoneCall, &self.phone_call_notifier_url),
            (ReminderChannel::PushNotification, &self.push_notifier_url),
            (ReminderChannel::PostalMail, &self.postal_mail_notifier_url),
        ]
        .into_iter()
        .filter_map(|(channel, url)| {
            url.as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| (channel, u))
        })
        .collect()
    }
}
