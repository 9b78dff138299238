use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Expiry assumed when the endpoint does not report one.
pub const DEFAULT_EXPIRE_SECS: i64 = 30 * SECONDS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub subscription_url: Option<String>,
    pub official_website: Option<String>,
    /// Epoch seconds.
    pub expire_time: i64,
    /// Epoch seconds.
    pub last_update_time: i64,
}

impl Subscription {
    /// Fraction of the quota consumed, clamped to `0.0..=1.0`.
    pub fn usage_ratio(&self) -> f64 {
        let total = self.total_traffic.max(1) as f64;
        (self.used_traffic.max(0) as f64 / total).clamp(0.0, 1.0)
    }

    /// Whole days until expiry; negative once expired.
    pub fn days_until_expiry(&self, now: i64) -> i64 {
        (self.expire_time - now).div_euclid(SECONDS_PER_DAY)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_time <= now
    }

    /// URL to fetch, if one is set and not blank.
    pub fn refresh_url(&self) -> Option<&str> {
        self.subscription_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub identifier: String,
    pub name: String,
    pub subscription_url: String,
    pub official_website: Option<String>,
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub expire_time: i64,
    pub last_update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct SubscriptionConfig {
    pub id: i64,
    pub identifier: String,
    pub config_content: String,
}

/// Usage metadata extracted from a subscription response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub expire_time: i64,
    /// `None` means the response carried no website; the stored one is kept.
    pub official_website: Option<String>,
}

/// Partial update applied by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsUpdate {
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub expire_time: i64,
    pub official_website: Option<String>,
}

impl From<SubscriptionInfo> for MetricsUpdate {
    fn from(info: SubscriptionInfo) -> Self {
        Self {
            used_traffic: info.used_traffic,
            total_traffic: info.total_traffic.max(1),
            expire_time: info.expire_time,
            official_website: info.official_website,
        }
    }
}
