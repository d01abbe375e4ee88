//! Coordination strategies
//!
//! Each strategy is a pure mapping from the current agent load to an
//! execution plan: an ordered list of stages, where the agents inside one
//! stage run concurrently and stages run one after another.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{AgentKind, AgentTask, TaskPriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoordinationStrategy {
    /// Fixed order; each agent sees its predecessor's output
    Sequential,
    /// All agents at once against the same snapshot
    Parallel,
    /// Sequential until agents prove reliable, then parallel
    Adaptive,
    /// Least-loaded agent first
    LoadBalanced,
    /// Raised-priority agents first; the planning fallback
    Hierarchical,
}

impl CoordinationStrategy {
    pub const ALL: [CoordinationStrategy; 5] = [
        CoordinationStrategy::Sequential,
        CoordinationStrategy::Parallel,
        CoordinationStrategy::Adaptive,
        CoordinationStrategy::LoadBalanced,
        CoordinationStrategy::Hierarchical,
    ];

    /// Work items allocated per round
    pub fn batch_size(&self) -> usize {
        match self {
            CoordinationStrategy::Sequential => 3,
            CoordinationStrategy::Parallel => 8,
            CoordinationStrategy::Adaptive => 5,
            CoordinationStrategy::LoadBalanced => 6,
            CoordinationStrategy::Hierarchical => 4,
        }
    }

    /// Fitness before load adjustments
    pub fn base_score(&self) -> f64 {
        match self {
            CoordinationStrategy::Sequential => 0.70,
            CoordinationStrategy::Parallel => 0.80,
            CoordinationStrategy::Adaptive => 0.85,
            CoordinationStrategy::LoadBalanced => 0.75,
            CoordinationStrategy::Hierarchical => 0.72,
        }
    }

    pub fn plan(&self, input: &StrategyInput) -> ExecutionPlan {
        let mut agents = input.agents.clone();
        agents.sort_by_key(|a| a.tier());
        agents.dedup();

        let stages = match self {
            CoordinationStrategy::Sequential => one_per_stage(agents),
            CoordinationStrategy::Parallel => single_stage(agents),
            CoordinationStrategy::Adaptive if input.adaptive_parallel => single_stage(agents),
            CoordinationStrategy::Adaptive => one_per_stage(agents),
            CoordinationStrategy::LoadBalanced => {
                agents.sort_by_key(|a| (input.in_flight.get(a).copied().unwrap_or(0), a.tier()));
                one_per_stage(agents)
            }
            CoordinationStrategy::Hierarchical => {
                agents.sort_by_key(|a| {
                    let priority = input.priorities.get(a).copied().unwrap_or_default();
                    (Reverse(priority), a.tier())
                });
                one_per_stage(agents)
            }
        };

        ExecutionPlan {
            strategy: *self,
            batch_size: self.batch_size(),
            stages,
        }
    }
}

fn one_per_stage(agents: Vec<AgentKind>) -> Vec<Vec<AgentKind>> {
    agents.into_iter().map(|a| vec![a]).collect()
}

fn single_stage(agents: Vec<AgentKind>) -> Vec<Vec<AgentKind>> {
    if agents.is_empty() {
        Vec::new()
    } else {
        vec![agents]
    }
}

impl Default for CoordinationStrategy {
    fn default() -> Self {
        CoordinationStrategy::Adaptive
    }
}

impl std::fmt::Display for CoordinationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinationStrategy::Sequential => write!(f, "sequential"),
            CoordinationStrategy::Parallel => write!(f, "parallel"),
            CoordinationStrategy::Adaptive => write!(f, "adaptive"),
            CoordinationStrategy::LoadBalanced => write!(f, "load_balanced"),
            CoordinationStrategy::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Load information a strategy needs to order agents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyInput {
    pub agents: Vec<AgentKind>,
    /// Tasks assigned and not yet resolved, per agent
    pub in_flight: BTreeMap<AgentKind, usize>,
    /// Raised priorities from the controller
    pub priorities: BTreeMap<AgentKind, TaskPriority>,
    /// Whether Adaptive has been promoted to parallel mode
    pub adaptive_parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: CoordinationStrategy,
    pub batch_size: usize,
    /// Stages run in order; agents within a stage run concurrently
    pub stages: Vec<Vec<AgentKind>>,
}

impl ExecutionPlan {
    pub fn is_concurrent(&self) -> bool {
        self.stages.iter().any(|stage| stage.len() > 1)
    }

    pub fn order(&self) -> Vec<AgentKind> {
        self.stages.iter().flatten().copied().collect()
    }

    fn stage_of(&self, agent: AgentKind) -> Option<usize> {
        self.stages.iter().position(|stage| stage.contains(&agent))
    }

    /// Move agents behind the agents whose tasks theirs depend on.
    ///
    /// A dependent sharing a stage with its prerequisite, or staged before
    /// it, is pulled out into its own stage right after the prerequisite.
    /// Mutual dependencies are left alone.
    pub fn honour_dependencies(&mut self, tasks: &[AgentTask]) {
        let owners: BTreeMap<&str, AgentKind> = tasks
            .iter()
            .map(|t| (t.id.as_str(), t.target_agent))
            .collect();
        let mut edges = BTreeSet::new();
        for task in tasks {
            for dep in &task.dependencies {
                match owners.get(dep.as_str()) {
                    Some(owner) if *owner != task.target_agent => {
                        edges.insert((task.target_agent, *owner));
                    }
                    _ => {}
                }
            }
        }
        let edges: Vec<(AgentKind, AgentKind)> = edges
            .iter()
            .filter(|(dependent, prerequisite)| !edges.contains(&(*prerequisite, *dependent)))
            .copied()
            .collect();

        let agents = self.order().len();
        for _ in 0..=agents * agents {
            let violation = edges.iter().find_map(|(dependent, prerequisite)| {
                let d = self.stage_of(*dependent)?;
                let p = self.stage_of(*prerequisite)?;
                (d <= p).then_some((*dependent, d))
            });
            let Some((dependent, from)) = violation else {
                return;
            };
            self.stages[from].retain(|a| *a != dependent);
            if self.stages[from].is_empty() {
                self.stages.remove(from);
            }
            let after = edges
                .iter()
                .filter(|(d, _)| *d == dependent)
                .filter_map(|(_, p)| self.stage_of(*p))
                .max()
                .unwrap_or(0);
            self.stages.insert(after + 1, vec![dependent]);
        }
    }
}
