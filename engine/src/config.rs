use serde::Deserialize;
use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

use mistake_providers::HttpSettings;

use crate::session::{FeedbackText, SessionSettings};
use crate::sync::clamp_period;

pub const DEFAULT_TRACKING_URL: &str = "http://localhost:8787/api/track";
pub const DEFAULT_RANKING_URL: &str = "http://localhost:8787/api/photo-order";
pub const DEFAULT_MANIFEST: &str = "public/image-manifest.json";
pub const DEFAULT_ASSETS_URL: &str = "http://localhost:3000/images/";

pub const DEFAULT_P_CORRECT: f64 = 0.7;
pub const DEFAULT_REWARD_POINTS: u32 = 20;
/// How long feedback stays on screen before the next item.
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_REORDER_PERIOD_HOURS: f64 = 24.0;
pub const DEFAULT_SUCCESS_FEEDBACK: &str = "Awesome! You earned {points} points!";
pub const DEFAULT_FAILURE_FEEDBACK: &str = "Oops! No points this time!";

const CONFIG_PATH_ENV: &str = "MISTAKE_CONFIG";
const MAX_TRANSITION_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Deserialize)]
pub struct MistakeConfig {
    pub endpoints: Option<EndpointsConfig>,
    pub game: Option<GameConfig>,
    pub feedback: Option<FeedbackConfig>,
    pub http: Option<HttpConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Remote collaborators. Values support `${VAR}` expansion.
///
/// ```toml
/// [endpoints]
/// tracking = "https://worker.example.dev/api/track"
/// ranking = "https://worker.example.dev/api/photo-order"
/// manifest = "public/image-manifest.json"
/// assets = "http://localhost:3000/images/"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsConfig {
    pub tracking: Option<String>,
    pub ranking: Option<String>,
    /// URL or local path of the JSON manifest.
    pub manifest: Option<String>,
    /// Base URL that item names are appended to.
    pub assets: Option<String>,
}

/// Reward model and pacing.
///
/// ```toml
/// [game]
/// p_correct = 0.7
/// reward_points = 20
/// transition_delay_ms = 2000
/// reorder_period_hours = 24
/// prefetch = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct GameConfig {
    /// Probability that a judgment is rewarded. Clamped to [0, 1].
    pub p_correct: Option<f64>,
    pub reward_points: Option<u32>,
    pub transition_delay_ms: Option<u64>,
    /// How often the ranking is re-fetched. Minimum 1 second.
    pub reorder_period_hours: Option<f64>,
    pub prefetch: Option<bool>,
}

/// Feedback strings. `{points}` is replaced with the reward.
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackConfig {
    pub success: Option<String>,
    pub failure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

/// Endpoint strings after defaults and env expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub tracking: String,
    pub ranking: String,
    pub manifest: String,
    pub assets: String,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve(value: Option<&String>, default: &str) -> String {
    match value.map(|v| expand_env_vars(v)) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

impl MistakeConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        let section = self.endpoints.as_ref();
        Endpoints {
            tracking: resolve(
                section.and_then(|e| e.tracking.as_ref()),
                DEFAULT_TRACKING_URL,
            ),
            ranking: resolve(section.and_then(|e| e.ranking.as_ref()), DEFAULT_RANKING_URL),
            manifest: resolve(section.and_then(|e| e.manifest.as_ref()), DEFAULT_MANIFEST),
            assets: resolve(section.and_then(|e| e.assets.as_ref()), DEFAULT_ASSETS_URL),
        }
    }

    /// Validated session parameters. Out-of-range values are clamped, never rejected.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let game = self.game.as_ref();
        let feedback = self.feedback.as_ref();

        let p_correct = match game.and_then(|g| g.p_correct) {
            Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
            Some(p) => {
                tracing::warn!(p_correct = p, "Ignoring non-finite p_correct");
                DEFAULT_P_CORRECT
            }
            None => DEFAULT_P_CORRECT,
        };

        let transition_delay = game
            .and_then(|g| g.transition_delay_ms)
            .map_or(DEFAULT_TRANSITION_DELAY, Duration::from_millis)
            .min(MAX_TRANSITION_DELAY);

        SessionSettings {
            p_correct,
            reward_points: game
                .and_then(|g| g.reward_points)
                .unwrap_or(DEFAULT_REWARD_POINTS),
            transition_delay,
            prefetch: game.and_then(|g| g.prefetch).unwrap_or(true),
            feedback: FeedbackText {
                success: feedback
                    .and_then(|f| f.success.clone())
                    .unwrap_or_else(|| DEFAULT_SUCCESS_FEEDBACK.to_string()),
                failure: feedback
                    .and_then(|f| f.failure.clone())
                    .unwrap_or_else(|| DEFAULT_FAILURE_FEEDBACK.to_string()),
            },
        }
    }

    /// Ranking refresh period, clamped to the syncer's bounds.
    #[must_use]
    pub fn reorder_period(&self) -> Duration {
        let hours = self
            .game
            .as_ref()
            .and_then(|g| g.reorder_period_hours)
            .unwrap_or(DEFAULT_REORDER_PERIOD_HOURS);
        period_from_hours(hours)
    }

    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        let mut settings = HttpSettings::default();
        if let Some(http) = &self.http {
            if let Some(secs) = http.timeout_secs {
                settings.timeout = Duration::from_secs(secs.max(1));
            }
            if let Some(agent) = http.user_agent.as_ref().filter(|a| !a.trim().is_empty()) {
                settings.user_agent.clone_from(agent);
            }
        }
        settings
    }
}

/// Convert a user-facing hour count to a sync period.
///
/// Zero, negative and NaN inputs clamp to the minimum period.
#[must_use]
pub fn period_from_hours(hours: f64) -> Duration {
    let secs = hours * 3600.0;
    let period = if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else if secs.is_infinite() && secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    };
    clamp_period(period)
}

/// `$MISTAKE_CONFIG`, else `~/.mistake/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".mistake").join("config.toml"))
}
