//! Coordination strategies, fitness scoring and adaptive-mode hysteresis

pub mod adaptive;
pub mod scoring;
pub mod strategy;

pub use adaptive::AdaptiveTracker;
pub use scoring::{fitness, select_strategy, FitnessInputs, StrategySelection};
pub use strategy::{CoordinationStrategy, ExecutionPlan, StrategyInput};
