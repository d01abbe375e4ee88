//! Output formatting for `docket` commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::controller::CoordinationDecision;
use crate::domain::CaseRecord;
use crate::error::ErrorRecord;
use crate::orchestrator::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

pub fn print_table<T: Tabled>(title: &str, rows: &[T]) {
    println!("\n{title}");
    if rows.is_empty() {
        println!("(none)");
    } else {
        println!("{}", Table::new(rows));
    }
}

pub fn print_json<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct RecordRow {
    pub item: String,
    pub title: String,
    pub case_type: String,
    pub fraud: bool,
    pub laundering: bool,
    pub charges: String,
    pub classified: bool,
}

impl From<&CaseRecord> for RecordRow {
    fn from(r: &CaseRecord) -> Self {
        Self {
            item: r.item.to_string(),
            title: truncate(&r.title, 60),
            case_type: r.case_type.to_string(),
            fraud: r.is_fraud(),
            laundering: r.is_money_laundering(),
            charges: r.charges.join(", "),
            classified: r.classification.is_some(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DecisionRow {
    pub round: u64,
    pub strategy: String,
    pub batch: usize,
    pub health: String,
    pub effectiveness: String,
    pub maturity: String,
    pub alerts: usize,
    pub fallback: bool,
}

impl From<&CoordinationDecision> for DecisionRow {
    fn from(d: &CoordinationDecision) -> Self {
        Self {
            round: d.round,
            strategy: d.strategy.to_string(),
            batch: d.batch_size,
            health: d.health.to_string(),
            effectiveness: format!("{:.2}", d.effectiveness),
            maturity: d.analysis.insights.maturity.to_string(),
            alerts: d.analysis.monitoring.alerts.len(),
            fallback: d.fallback,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct ErrorRow {
    pub round: u64,
    pub kind: String,
    pub source: String,
    pub message: String,
}

impl From<&ErrorRecord> for ErrorRow {
    fn from(e: &ErrorRecord) -> Self {
        Self {
            round: e.round,
            kind: e.kind.to_string(),
            source: e.source.clone(),
            message: truncate(&e.message, 80),
        }
    }
}

pub fn print_report(report: &RunReport, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return print_json(report);
    }

    let records: Vec<RecordRow> = report.records.iter().map(RecordRow::from).collect();
    let decisions: Vec<DecisionRow> = report
        .decision_history
        .iter()
        .map(DecisionRow::from)
        .collect();
    let errors: Vec<ErrorRow> = report.error_log.iter().map(ErrorRow::from).collect();

    print_table("Records", &records);
    print_table("Coordination decisions", &decisions);
    print_table("Errors", &errors);

    let m = &report.coordination_metrics;
    println!("\nRun {}", report.run_id);
    println!("  success:        {}", report.success);
    println!("  rounds:         {}", report.rounds);
    println!(
        "  items:          {} total, {} completed, {} failed, {} pending",
        m.items_total, m.items_completed, m.items_failed, m.items_pending
    );
    println!("  fraud cases:    {}", report.fraud_cases());
    println!("  messages:       {}", m.messages_total);
    if let Some(a) = &report.final_assessment {
        println!("  convergence:    {:.2} ({})", a.score, a.recommendation);
    }
    if let Some(last) = report.decision_history.last() {
        let opt = &last.analysis.optimization;
        println!("  performance:    {:.2}", opt.current_performance);
        if let Some(r) = &opt.rebalance {
            println!("  rebalance:      {:?} -> {:?}", r.overloaded, r.underloaded);
        }
    }
    for insight in report.insights.iter().rev().take(5) {
        println!("  insight:        {}", insight.text);
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
