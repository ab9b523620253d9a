use serde::{Deserialize, Serialize};
use std::fmt;

// ===== CONNECTIVITY TYPES =====

/// Network reachability as reported by a connectivity source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Available,
    Unavailable,
    Losing,
    Lost,
}

impl ConnectivityStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectivityStatus::Available | ConnectivityStatus::Losing)
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectivityStatus::Available => "Available",
            ConnectivityStatus::Unavailable => "Unavailable",
            ConnectivityStatus::Losing => "Losing",
            ConnectivityStatus::Lost => "Lost",
        };
        f.write_str(label)
    }
}

// ===== DISPATCH TYPES =====

/// How a consumer that is slower than its producer sees the values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Every value, in order; the producer waits for the consumer.
    Sequential,
    /// Every value, in order; the producer may run ahead by `capacity` values.
    Buffered { capacity: usize },
    /// Only the newest pending value is kept while the consumer is busy.
    Conflated,
    /// A new value cancels the consumer's in-flight work.
    LatestOnly,
}

impl DispatchPolicy {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

    pub fn buffered() -> Self {
        DispatchPolicy::Buffered {
            capacity: Self::DEFAULT_BUFFER_CAPACITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DispatchPolicy::Sequential => "sequential",
            DispatchPolicy::Buffered { .. } => "buffered",
            DispatchPolicy::Conflated => "conflated",
            DispatchPolicy::LatestOnly => "latest_only",
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::buffered()
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPolicy::Buffered { capacity } => write!(f, "buffered({capacity})"),
            other => f.write_str(other.name()),
        }
    }
}

// ===== CONFIG TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub dispatch: DispatchSection,
    pub shared_flow: SharedFlowSection,
    pub countdown: CountdownSection,
    pub dinner: DinnerSection,
    pub connectivity: ConnectivitySection,
}

impl AppConfig {
    pub const MAX_REPLAY: usize = 1024;

    /// Clamp out-of-range values back into something runnable.
    ///
    /// Returns one human readable warning per fixed field; an empty vector
    /// means the config was already valid.
    pub fn validate_and_fix(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.app.get_migration_strategy() {
            MigrationStrategy::None => {}
            MigrationStrategy::Upgrade(path) => {
                warnings.push(format!("config migrated ({path})"));
                self.app.version = AppSection::CURRENT_VERSION.to_string();
            }
            MigrationStrategy::Recreate => {
                warnings.push(format!(
                    "unsupported config version '{}', using defaults",
                    self.app.version
                ));
                *self = AppConfig::default();
                return warnings;
            }
        }

        if let DispatchPolicy::Buffered { capacity } = &mut self.dispatch.policy {
            if *capacity == 0 {
                warnings.push("dispatch.policy.capacity must be at least 1, using 1".to_string());
                *capacity = 1;
            }
        }

        if self.shared_flow.replay > Self::MAX_REPLAY {
            warnings.push(format!(
                "shared_flow.replay {} exceeds {}, clamped",
                self.shared_flow.replay,
                Self::MAX_REPLAY
            ));
            self.shared_flow.replay = Self::MAX_REPLAY;
        }

        if self.countdown.interval_ms == 0 {
            warnings.push("countdown.interval_ms must be positive, using 1000".to_string());
            self.countdown.interval_ms = CountdownSection::default().interval_ms;
        }
        if self.countdown.start < 0 {
            warnings.push(format!(
                "countdown.start {} is negative, using 0",
                self.countdown.start
            ));
            self.countdown.start = 0;
        }

        if self.connectivity.interval_ms == 0 {
            warnings.push("connectivity.interval_ms must be positive, using 2000".to_string());
            self.connectivity.interval_ms = ConnectivitySection::default().interval_ms;
        }
        if self.connectivity.lost_after_failures == 0 {
            warnings.push("connectivity.lost_after_failures must be at least 1, using 1".to_string());
            self.connectivity.lost_after_failures = 1;
        }

        warnings
    }
}

// AppSection carries the config format version so older files can be migrated
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSection {
    pub version: String,
}

impl AppSection {
    /// Current configuration format version
    pub const CURRENT_VERSION: &'static str = "1.0.0";

    pub fn is_supported_version(&self) -> bool {
        matches!(self.version.as_str(), "0.9.0" | "1.0.0")
    }

    pub fn needs_migration(&self) -> bool {
        self.version != Self::CURRENT_VERSION
    }

    pub fn get_migration_strategy(&self) -> MigrationStrategy {
        match self.version.as_str() {
            "1.0.0" => MigrationStrategy::None,
            "0.9.0" => MigrationStrategy::Upgrade("0.9.0 -> 1.0.0".to_string()),
            _ => MigrationStrategy::Recreate,
        }
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStrategy {
    None,
    Upgrade(String),
    Recreate,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DispatchSection {
    pub policy: DispatchPolicy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SharedFlowSection {
    pub replay: usize,
    pub first_collector_delay_ms: u64,
    pub second_collector_delay_ms: u64,
}

impl Default for SharedFlowSection {
    fn default() -> Self {
        Self {
            replay: 5,
            first_collector_delay_ms: 2_000,
            second_collector_delay_ms: 4_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CountdownSection {
    pub start: i64,
    pub interval_ms: u64,
}

impl Default for CountdownSection {
    fn default() -> Self {
        Self {
            start: 10,
            interval_ms: 1_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DinnerSection {
    pub eating_ms: u64,
}

impl Default for DinnerSection {
    fn default() -> Self {
        Self { eating_ms: 1_500 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConnectivitySection {
    /// `host:port` to probe; `None` uses the scripted source.
    pub probe_addr: Option<String>,
    pub interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub lost_after_failures: u32,
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        Self {
            probe_addr: None,
            interval_ms: 2_000,
            connect_timeout_ms: 1_000,
            lost_after_failures: 3,
        }
    }
}
