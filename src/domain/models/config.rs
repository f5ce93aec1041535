use serde::{Deserialize, Serialize};

/// Main configuration structure for Cartographer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tick batching and soft-lock configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Generation routine endpoints and timeouts
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Reschedule delays after transient errors
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Step numbering retry policy
    #[serde(default)]
    pub sequencing: SequencingConfig,

    /// Convergence detection thresholds
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Winner selection weights and floors
    #[serde(default)]
    pub selection: SelectionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".cartographer/cartographer.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Scheduler tick configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Maximum due runs processed per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between runs within one tick
    #[serde(default = "default_inter_run_pause_ms")]
    pub inter_run_pause_ms: u64,

    /// Upper bound on one unit of work; the soft lock expires after this
    #[serde(default = "default_lock_ceiling_secs")]
    pub lock_ceiling_secs: u64,

    /// Interval between ticks in daemon mode
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

const fn default_batch_size() -> u32 {
    5
}

const fn default_inter_run_pause_ms() -> u64 {
    250
}

const fn default_lock_ceiling_secs() -> u64 {
    720
}

const fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_run_pause_ms: default_inter_run_pause_ms(),
            lock_ceiling_secs: default_lock_ceiling_secs(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

/// Generation routine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Generator backend: http or mock
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL routines are served under
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer key sent with every routine call
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for single-step generation
    #[serde(default = "default_single_step_timeout_secs")]
    pub single_step_timeout_secs: u64,

    /// Timeout for panel, grounding and adversarial routines
    #[serde(default = "default_multi_agent_timeout_secs")]
    pub multi_agent_timeout_secs: u64,

    /// Provider fallback order passed to routines
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,
}

fn default_backend() -> String {
    "http".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787/generate".to_string()
}

const fn default_single_step_timeout_secs() -> u64 {
    90
}

const fn default_multi_agent_timeout_secs() -> u64 {
    600
}

fn default_provider_order() -> Vec<String> {
    vec!["anthropic".to_string(), "openai".to_string(), "gemini".to_string()]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            api_key: None,
            single_step_timeout_secs: default_single_step_timeout_secs(),
            multi_agent_timeout_secs: default_multi_agent_timeout_secs(),
            provider_order: default_provider_order(),
        }
    }
}

/// Reschedule delays after a transient error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackoffConfig {
    #[serde(default = "default_phase1_error_secs")]
    pub phase1_error_secs: u64,

    #[serde(default = "default_phase2_error_secs")]
    pub phase2_error_secs: u64,
}

const fn default_phase1_error_secs() -> u64 {
    120
}

const fn default_phase2_error_secs() -> u64 {
    600
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            phase1_error_secs: default_phase1_error_secs(),
            phase2_error_secs: default_phase2_error_secs(),
        }
    }
}

/// Step numbering retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SequencingConfig {
    /// Read-propose-persist attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_max_attempts() -> u32 {
    5
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts() }
    }
}

/// Convergence detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,

    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: f64,

    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f64,

    /// Number of trailing similarities in the stability window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Artifacts required before convergence can be declared
    #[serde(default = "default_min_iterations")]
    pub min_iterations: usize,

    /// Average pairwise similarity of the last three artifacts that ends phase 1
    #[serde(default = "default_early_stop_threshold")]
    pub early_stop_threshold: f64,
}

const fn default_jaccard_threshold() -> f64 {
    0.85
}

const fn default_stability_threshold() -> f64 {
    0.9
}

const fn default_novelty_threshold() -> f64 {
    0.1
}

const fn default_window_size() -> usize {
    5
}

const fn default_min_iterations() -> usize {
    3
}

const fn default_early_stop_threshold() -> f64 {
    0.8
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            jaccard_threshold: default_jaccard_threshold(),
            stability_threshold: default_stability_threshold(),
            novelty_threshold: default_novelty_threshold(),
            window_size: default_window_size(),
            min_iterations: default_min_iterations(),
            early_stop_threshold: default_early_stop_threshold(),
        }
    }
}

/// Winner selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectionConfig {
    #[serde(default = "default_novelty_weight")]
    pub novelty_weight: f64,

    #[serde(default = "default_support_weight")]
    pub support_weight: f64,

    #[serde(default = "default_novelty_floor")]
    pub novelty_floor: f64,

    #[serde(default = "default_support_floor")]
    pub support_floor: f64,

    /// Number of recent artifacts considered
    #[serde(default = "default_selection_window")]
    pub window: u32,
}

const fn default_novelty_weight() -> f64 {
    0.7
}

const fn default_support_weight() -> f64 {
    0.3
}

const fn default_novelty_floor() -> f64 {
    6.0
}

const fn default_support_floor() -> f64 {
    5.0
}

const fn default_selection_window() -> u32 {
    20
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            novelty_weight: default_novelty_weight(),
            support_weight: default_support_weight(),
            novelty_floor: default_novelty_floor(),
            support_floor: default_support_floor(),
            window: default_selection_window(),
        }
    }
}
