//! Legal intelligence agent
//!
//! Matches recent records against a precedent database, groups cases by
//! jurisdiction, and cross-checks language verdicts against keyword flags.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde_json::json;
use tracing::debug;

use super::context::RoundContext;
use super::traits::{Agent, AgentDescriptor, AgentOutput, AgentUpdate};
use crate::domain::keywords::contains_phrase;
use crate::domain::{AgentKind, CaseRecord, LegalFindings, Precedent, PrecedentMatch, TaskType};
use crate::error::Result;
use crate::memory::{LearnedPattern, MemoryDelta, SharedMemoryStore};
use crate::state::{StateDelta, TaskOutcome};

/// Records examined per pass
const RECENT_WINDOW: usize = 10;
const RELEVANCE_THRESHOLD: f64 = 0.3;
const MATCHES_PER_RECORD: usize = 3;
const MIN_JURISDICTION_CASES: usize = 2;
const FRAUD_TERMS: [&str; 5] = ["fraud", "scheme", "conspiracy", "money laundering", "embezzlement"];

const DISTRICT_KEYWORDS: [&str; 6] = [
    "Eastern District",
    "Western District",
    "Northern District",
    "Southern District",
    "Middle District",
    "District of",
];

pub struct LegalIntelligenceAgent {
    precedents: Vec<Precedent>,
}

impl LegalIntelligenceAgent {
    pub fn new(precedents: Vec<Precedent>) -> Self {
        Self { precedents }
    }

    pub fn with_default_precedents() -> Self {
        Self::new(default_precedents())
    }

    /// Weighted relevance in [0, 1]: charge overlap 40%, fraud terms 30%,
    /// recency 20% over a ten-year decay, appellate court 10%
    pub fn relevance(record: &CaseRecord, precedent: &Precedent, reference_year: i32) -> f64 {
        let mut score = 0.0;

        let case_charges: Vec<String> = record.charges.iter().map(|c| c.to_lowercase()).collect();
        let precedent_charges: Vec<String> =
            precedent.charges.iter().map(|c| c.to_lowercase()).collect();
        let overlap = case_charges
            .iter()
            .filter(|c| precedent_charges.contains(c))
            .count();
        let denom = case_charges.len().max(precedent_charges.len()).max(1);
        score += overlap as f64 / denom as f64 * 0.4;

        if record.is_fraud() {
            let precedent_text = precedent.charges.join(" ");
            let case_terms: Vec<&str> = FRAUD_TERMS
                .iter()
                .copied()
                .filter(|t| contains_phrase(&record.title, t))
                .collect();
            let precedent_terms: Vec<&str> = FRAUD_TERMS
                .iter()
                .copied()
                .filter(|t| contains_phrase(&precedent_text, t))
                .collect();
            if !case_terms.is_empty() && !precedent_terms.is_empty() {
                let shared = case_terms
                    .iter()
                    .filter(|t| precedent_terms.contains(t))
                    .count();
                let denom = case_terms.len().max(precedent_terms.len());
                score += shared as f64 / denom as f64 * 0.3;
            }
        }

        let years_old = (reference_year - precedent.year).max(0) as f64;
        score += (1.0 - years_old / 10.0).max(0.0) * 0.2;

        if precedent.court.contains("Circuit") || precedent.court.contains("Supreme") {
            score += 0.1;
        }

        score.min(1.0)
    }

    fn matches_for(&self, record: &CaseRecord) -> Vec<PrecedentMatch> {
        let reference_year = record
            .date
            .map(|d| d.year())
            .unwrap_or_else(|| record.extracted_at.year());
        let mut matches: Vec<PrecedentMatch> = self
            .precedents
            .iter()
            .map(|p| (p, Self::relevance(record, p, reference_year)))
            .filter(|(_, score)| *score > RELEVANCE_THRESHOLD)
            .map(|(p, score)| PrecedentMatch {
                item: record.item.clone(),
                case_name: p.case_name.clone(),
                citation: p.citation.clone(),
                relevance: score,
            })
            .collect();
        matches.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        matches.truncate(MATCHES_PER_RECORD);
        matches
    }

    fn analyze(&self, records: &[CaseRecord]) -> LegalFindings {
        let precedent_matches = records.iter().flat_map(|r| self.matches_for(r)).collect();

        let mut by_jurisdiction: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            if let Some(j) = jurisdiction_of(record) {
                *by_jurisdiction.entry(j).or_insert(0) += 1;
            }
        }
        by_jurisdiction.retain(|_, count| *count >= MIN_JURISDICTION_CASES);

        let classified: Vec<&CaseRecord> = records
            .iter()
            .filter(|r| r.classification.is_some())
            .collect();
        let validation_rate = if classified.is_empty() {
            None
        } else {
            let agreeing = classified
                .iter()
                .filter(|r| r.is_fraud() == r.keyword_fraud_flag)
                .count();
            Some(agreeing as f64 / classified.len() as f64)
        };

        LegalFindings {
            analyzed_records: records.len(),
            precedent_matches,
            jurisdiction_patterns: by_jurisdiction,
            validation_rate,
        }
    }
}

/// Jurisdiction from the URL, falling back to a district phrase in the title
fn jurisdiction_of(record: &CaseRecord) -> Option<String> {
    if let Some(code) = record.item.jurisdiction() {
        return Some(code);
    }
    DISTRICT_KEYWORDS.iter().find_map(|keyword| {
        let (_, rest) = record.title.split_once(keyword)?;
        let place: Vec<&str> = rest.split_whitespace().take(2).collect();
        if place.is_empty() {
            None
        } else {
            Some(format!("{keyword} {}", place.join(" ")))
        }
    })
}

fn default_precedents() -> Vec<Precedent> {
    vec![
        Precedent {
            case_name: "United States v. Smith".into(),
            citation: "F.3d (2023)".into(),
            year: 2023,
            court: "2nd Circuit".into(),
            charges: vec!["wire fraud".into(), "money laundering".into()],
            outcome: "conviction".into(),
        },
        Precedent {
            case_name: "United States v. Johnson".into(),
            citation: "F.3d (2022)".into(),
            year: 2022,
            court: "9th Circuit".into(),
            charges: vec!["health care fraud".into(), "kickback".into()],
            outcome: "plea agreement".into(),
        },
        Precedent {
            case_name: "United States v. Alvarez".into(),
            citation: "F. Supp. 3d (2021)".into(),
            year: 2021,
            court: "S.D.N.Y.".into(),
            charges: vec!["securities fraud".into(), "investment fraud".into()],
            outcome: "conviction".into(),
        },
        Precedent {
            case_name: "United States v. Reyes".into(),
            citation: "F.4th (2024)".into(),
            year: 2024,
            court: "5th Circuit".into(),
            charges: vec!["ppp loan fraud".into(), "bank fraud".into()],
            outcome: "conviction".into(),
        },
    ]
}

#[async_trait]
impl Agent for LegalIntelligenceAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::LegalIntelligence
    }

    fn initialize_memory(&self, store: &mut SharedMemoryStore) {
        let memory = store.get_or_create_agent_memory(self.id());
        memory.remember(
            "precedent_database",
            serde_json::to_value(&self.precedents).unwrap_or_default(),
            self.id(),
        );
        memory.remember("capabilities", json!(["legal_intelligence"]), self.id());
    }

    async fn process(&self, ctx: &RoundContext) -> Result<AgentUpdate> {
        let tasks: Vec<_> = ctx.tasks_of(TaskType::LegalIntelligence).collect();
        if tasks.is_empty() {
            return Ok(AgentUpdate::idle(self.kind()));
        }
        let started = Instant::now();

        let records = &ctx.snapshot.records;
        let recent = &records[records.len().saturating_sub(RECENT_WINDOW)..];
        let findings = self.analyze(recent);
        debug!(
            analyzed = findings.analyzed_records,
            matches = findings.precedent_matches.len(),
            jurisdictions = findings.jurisdiction_patterns.len(),
            "legal analysis complete"
        );

        let summary = json!({
            "analyzed_records": findings.analyzed_records,
            "precedent_matches": findings.precedent_matches.len(),
            "jurisdiction_patterns": findings.jurisdiction_patterns,
            "validation_rate": findings.validation_rate,
        });

        let mut state = StateDelta::default();
        for t in &tasks {
            state.task_outcomes.push(TaskOutcome::succeeded(
                &t.id,
                self.kind(),
                None,
                started.elapsed().as_secs_f64(),
                Some(summary.clone()),
            ));
        }
        if let Some(rate) = findings.validation_rate {
            state.accuracy.insert(self.kind(), rate);
        }

        let mut memory = MemoryDelta::default();
        memory.learn(LearnedPattern::new("jurisdictions", json!(findings.jurisdiction_patterns)));
        memory.share_with(AgentKind::Research.id(), "legal_insights", summary.clone());
        memory.share_with(AgentKind::Evaluation.id(), "legal_insights", summary);
        for (jurisdiction, count) in &findings.jurisdiction_patterns {
            memory.insight(format!("{count} cases concentrated in {jurisdiction}"));
        }
        if let Some(patterns) = ctx
            .memory
            .shared_from(AgentKind::Research.id(), "pattern_insights")
        {
            memory.remember("research_patterns", patterns.clone());
        }
        memory.remember("last_analysis_at", json!(Utc::now()));

        Ok(AgentUpdate {
            agent: self.kind(),
            state,
            memory,
            output: AgentOutput::Legal(findings),
        })
    }

    fn describe(&self) -> AgentDescriptor {
        AgentDescriptor::new(self.kind(), vec![TaskType::LegalIntelligence])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkItem;
    use chrono::NaiveDate;

    fn record(url: &str, title: &str, charges: &[&str], fraud: bool) -> CaseRecord {
        let mut r = CaseRecord::new(WorkItem::new(url), title);
        r.charges = charges.iter().map(|c| c.to_string()).collect();
        r.keyword_fraud_flag = fraud;
        r.date = NaiveDate::from_ymd_opt(2024, 6, 1);
        r
    }

    #[test]
    fn test_relevance_weights() {
        let precedent = &default_precedents()[0];
        let r = record(
            "https://www.justice.gov/usao-sdny/pr/a",
            "Trader pleads guilty to wire fraud and money laundering",
            &["wire fraud", "money laundering"],
            true,
        );
        // full charge overlap, full term overlap, one year old, circuit court
        let score = LegalIntelligenceAgent::relevance(&r, precedent, 2024);
        assert!((score - 0.98).abs() < 1e-9, "score = {score}");

        let unrelated = record(
            "https://www.justice.gov/usao-sdny/pr/b",
            "Man sentenced for drug trafficking",
            &[],
            false,
        );
        let score = LegalIntelligenceAgent::relevance(&unrelated, precedent, 2024);
        assert!((score - (0.9 * 0.2 + 0.1)).abs() < 1e-9, "score = {score}");
        assert!(score < RELEVANCE_THRESHOLD);
    }

    #[test]
    fn test_matches_are_thresholded_and_capped() {
        let agent = LegalIntelligenceAgent::with_default_precedents();
        let r = record(
            "https://www.justice.gov/usao-sdny/pr/a",
            "Bank fraud scheme",
            &["bank fraud", "wire fraud"],
            true,
        );
        let matches = agent.matches_for(&r);
        assert!(!matches.is_empty());
        assert!(matches.len() <= MATCHES_PER_RECORD);
        assert!(matches.windows(2).all(|w| w[0].relevance >= w[1].relevance));
        assert!(matches.iter().all(|m| m.relevance > RELEVANCE_THRESHOLD));
    }

    #[test]
    fn test_jurisdiction_patterns_need_two_cases() {
        let agent = LegalIntelligenceAgent::with_default_precedents();
        let records = vec![
            record("https://www.justice.gov/usao-sdny/pr/a", "a", &[], false),
            record("https://www.justice.gov/usao-sdny/pr/b", "b", &[], false),
            record("https://www.justice.gov/usao-ndca/pr/c", "c", &[], false),
            record(
                "internal://release/1",
                "Southern District of Texas announces charges",
                &[],
                false,
            ),
        ];
        let findings = agent.analyze(&records);
        assert_eq!(findings.analyzed_records, 4);
        assert_eq!(findings.jurisdiction_patterns.len(), 1);
        assert_eq!(findings.jurisdiction_patterns["SDNY"], 2);
        assert_eq!(findings.validation_rate, None);
    }

    #[test]
    fn test_title_jurisdiction_fallback() {
        let r = record(
            "internal://release/1",
            "Southern District of Texas announces charges",
            &[],
            false,
        );
        assert_eq!(
            jurisdiction_of(&r).as_deref(),
            Some("Southern District of Texas")
        );
    }

    #[test]
    fn test_validation_rate() {
        use crate::domain::Classification;
        let agent = LegalIntelligenceAgent::with_default_precedents();
        let agree = record("https://www.justice.gov/usao-sdny/pr/a", "a", &[], true)
            .with_classification(Classification {
                fraud_flag: true,
                ..Default::default()
            });
        let disagree = record("https://www.justice.gov/usao-sdny/pr/b", "b", &[], true)
            .with_classification(Classification::default());
        let findings = agent.analyze(&[agree, disagree]);
        assert_eq!(findings.validation_rate, Some(0.5));
    }
}
