use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coordination::CoordinationStrategy;

/// Top-level configuration for a docket run
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Round driver limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Rounds after which the run finalizes regardless of convergence
    pub max_rounds: u64,
    /// Hard cap on rounds, independent of the controller
    pub safety_round_cap: u64,
    /// Optional per-task deadline, checked when outcomes merge and at the barrier
    pub task_deadline_secs: Option<u64>,
    /// Timeout applied to each natural-language classification call
    pub collaborator_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            safety_round_cap: 10,
            task_deadline_secs: None,
            collaborator_timeout_ms: 5_000,
        }
    }
}

/// MetaController thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub decision_history_cap: usize,
    /// Pending backlog above which a bottleneck is flagged
    pub backlog_threshold: usize,
    /// Failure ratio above which a bottleneck is flagged
    pub failure_ratio_threshold: f64,
    /// Accuracy below which an agent's priority is raised
    pub accuracy_target: f64,
    /// Records required before an evaluation task is issued
    pub min_records_for_evaluation: usize,
    /// Research priority stays raised while fewer records than this exist
    pub research_case_floor: usize,
    /// Messages per round that correspond to a system load of 1.0
    pub load_message_capacity: f64,
    /// Upper bound on the observed/base duration ratio
    pub duration_ratio_cap: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            decision_history_cap: 50,
            backlog_threshold: 20,
            failure_ratio_threshold: 0.2,
            accuracy_target: 0.8,
            min_records_for_evaluation: 5,
            research_case_floor: 5,
            load_message_capacity: 20.0,
            duration_ratio_cap: 2.0,
        }
    }
}

/// Strategy selection and adaptive-mode settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Strategy active before the first decision
    pub initial: CoordinationStrategy,
    /// Rolling success rate that promotes Adaptive into parallel mode
    pub adaptive_promote_threshold: f64,
    /// Consecutive observations required before Adaptive switches mode
    pub adaptive_confirm_rounds: u32,
    /// Number of task outcomes kept in each agent's rolling window
    pub success_window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial: CoordinationStrategy::Adaptive,
            adaptive_promote_threshold: 0.8,
            adaptive_confirm_rounds: 2,
            success_window: 10,
        }
    }
}

/// Convergence criteria thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub min_cases: usize,
    pub min_rounds: u64,
    pub max_failure_ratio: f64,
    /// Score at which the run finalizes immediately
    pub finalize_score: f64,
    /// Score at which the run finalizes on its second-to-last round
    pub late_finalize_score: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            min_cases: 5,
            min_rounds: 2,
            max_failure_ratio: 0.3,
            finalize_score: 0.8,
            late_finalize_score: 0.6,
        }
    }
}

/// Caps for the shared memory store
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub communication_log_cap: usize,
    pub global_insight_cap: usize,
    pub pattern_cap: usize,
    pub interaction_cap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            communication_log_cap: 1_000,
            global_insight_cap: 500,
            pattern_cap: 100,
            interaction_cap: 200,
        }
    }
}

/// Settings for the in-process simulated collaborators
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Probability that an extractor call returns nothing
    pub failure_rate: f64,
    /// Probability that the language service returns malformed output
    pub malformed_rate: f64,
    pub latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            failure_rate: 0.0,
            malformed_rate: 0.0,
            latency_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default `config` directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overlay (e.g. config/ci.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("DOCKET_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // DOCKET__ORCHESTRATOR__MAX_ROUNDS=5, etc. The prefix takes the
            // same `__` separator, so DOCKET_ENV and DOCKET_LOG_DIR are not keys.
            .add_source(
                Environment::with_prefix("DOCKET")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration, returning every violation found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.orchestrator.max_rounds == 0 {
            errors.push("orchestrator.max_rounds must be at least 1".to_string());
        }
        if self.orchestrator.safety_round_cap == 0 {
            errors.push("orchestrator.safety_round_cap must be at least 1".to_string());
        }
        if self.orchestrator.collaborator_timeout_ms == 0 {
            errors.push("orchestrator.collaborator_timeout_ms must be positive".to_string());
        }

        for (name, value) in [
            ("controller.failure_ratio_threshold", self.controller.failure_ratio_threshold),
            ("controller.accuracy_target", self.controller.accuracy_target),
            ("strategy.adaptive_promote_threshold", self.strategy.adaptive_promote_threshold),
            ("convergence.max_failure_ratio", self.convergence.max_failure_ratio),
            ("convergence.finalize_score", self.convergence.finalize_score),
            ("convergence.late_finalize_score", self.convergence.late_finalize_score),
            ("simulation.failure_rate", self.simulation.failure_rate),
            ("simulation.malformed_rate", self.simulation.malformed_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} must be between 0 and 1"));
            }
        }

        if self.convergence.late_finalize_score > self.convergence.finalize_score {
            errors.push(
                "convergence.late_finalize_score should not exceed finalize_score".to_string(),
            );
        }
        if self.controller.load_message_capacity <= 0.0 {
            errors.push("controller.load_message_capacity must be positive".to_string());
        }
        if self.controller.duration_ratio_cap <= 0.0 {
            errors.push("controller.duration_ratio_cap must be positive".to_string());
        }
        if self.strategy.adaptive_confirm_rounds == 0 {
            errors.push("strategy.adaptive_confirm_rounds must be at least 1".to_string());
        }
        if self.strategy.success_window == 0 {
            errors.push("strategy.success_window must be at least 1".to_string());
        }
        if self.memory.communication_log_cap == 0 || self.memory.global_insight_cap == 0 {
            errors.push("memory caps must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
