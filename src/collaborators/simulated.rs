//! In-process collaborators for exercising the engine end to end
//!
//! Randomness comes from a seeded `StdRng`, so a given seed and config
//! reproduce the same run.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::traits::{
    Extractor, FeedbackEvent, FeedbackSink, NaturalLanguageService, WorkSource,
};
use crate::config::SimulationConfig;
use crate::domain::keywords;
use crate::domain::{CaseRecord, CaseType, Classification, RawContent, WorkItem};
use crate::error::Result;

const DISTRICTS: [&str; 8] = [
    "sdny", "edny", "ndca", "cdca", "sdfl", "ndil", "edva", "sdtx",
];

/// Headline and body templates; `{name}` is filled per item
const RELEASES: [(&str, &str); 6] = [
    (
        "{name} Sentenced for Wire Fraud Scheme Targeting Investors",
        "{name} pleaded guilty to wire fraud and securities fraud after diverting investor funds.",
    ),
    (
        "{name} Charged with Money Laundering and Bank Fraud",
        "The indictment alleges {name} moved proceeds through a shell company to conceal bank fraud.",
    ),
    (
        "{name} Convicted in Medicare Fraud Kickback Conspiracy",
        "A jury found {name} guilty of healthcare fraud and paying kickback payments for referrals.",
    ),
    (
        "{name} Pleads Guilty to PPP Loan Fraud",
        "{name} admitted to pandemic fraud by submitting false payroll records to obtain loans.",
    ),
    (
        "{name} Sentenced for Drug Trafficking Offenses",
        "{name} was sentenced after possession with intent to distribute controlled substances.",
    ),
    (
        "{name} Indicted for Tax Evasion and Identity Theft",
        "Prosecutors allege {name} used stolen identities to file returns and engaged in tax evasion.",
    ),
];

const NAMES: [&str; 6] = [
    "Former Bank Officer",
    "Clinic Owner",
    "Investment Adviser",
    "Business Owner",
    "Local Resident",
    "Tax Preparer",
];

/// Produces justice.gov press-release URLs spread across districts
#[derive(Debug, Clone)]
pub struct SimulatedWorkSource {
    count: usize,
}

impl SimulatedWorkSource {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn item(index: usize) -> WorkItem {
        let district = DISTRICTS[index % DISTRICTS.len()];
        WorkItem::new(format!(
            "https://www.justice.gov/usao-{district}/pr/release-{index:04}"
        ))
    }
}

#[async_trait]
impl WorkSource for SimulatedWorkSource {
    async fn list_work_items(&self) -> Result<Vec<WorkItem>> {
        Ok((0..self.count).map(Self::item).collect())
    }
}

/// Serves templated press releases, dropping a seeded share of fetches
pub struct SimulatedExtractor {
    rng: Mutex<StdRng>,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedExtractor {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            failure_rate: config.failure_rate,
            latency: Duration::from_millis(config.latency_ms),
        }
    }
}

#[async_trait]
impl Extractor for SimulatedExtractor {
    async fn fetch(&self, item: &WorkItem) -> Result<Option<RawContent>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (dropped, template, name, age_days) = {
            let mut rng = self.rng.lock().await;
            (
                rng.gen_bool(self.failure_rate.clamp(0.0, 1.0)),
                rng.gen_range(0..RELEASES.len()),
                rng.gen_range(0..NAMES.len()),
                rng.gen_range(0..3650_i64),
            )
        };
        if dropped {
            debug!(item = %item, "simulated fetch returned nothing");
            return Ok(None);
        }

        let (title, body) = RELEASES[template];
        let name = NAMES[name];
        let published = NaiveDate::from_ymd_opt(2024, 6, 30)
            .and_then(|d| d.checked_sub_signed(ChronoDuration::days(age_days)));
        Ok(Some(RawContent {
            item: item.clone(),
            title: title.replace("{name}", name),
            body: body.replace("{name}", name),
            published,
        }))
    }

    async fn classify(&self, content: &RawContent) -> Result<Option<CaseRecord>> {
        if content.title.trim().is_empty() {
            return Ok(None);
        }
        let text = format!("{} {}", content.title, content.body);
        let mut record = CaseRecord::new(content.item.clone(), content.title.clone());
        record.date = content.published;
        record.charges = keywords::matched_charges(&text);
        record.case_type = CaseType::from_text(&text);
        record.charge_categories = keywords::fraud_categories(&text)
            .into_iter()
            .map(str::to_string)
            .collect();
        record.keyword_fraud_flag = !record.charge_categories.is_empty();
        record.keyword_money_laundering_flag = keywords::mentions_money_laundering(&text);
        Ok(Some(record))
    }
}

/// Language service answering with model-style JSON, occasionally garbled
pub struct SimulatedLanguageService {
    rng: Mutex<StdRng>,
    malformed_rate: f64,
    latency: Duration,
}

impl SimulatedLanguageService {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            // Offset so the service does not replay the extractor's stream
            rng: Mutex::new(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
            malformed_rate: config.malformed_rate,
            latency: Duration::from_millis(config.latency_ms),
        }
    }

    fn answer(record: &CaseRecord) -> String {
        let fraud = record.keyword_fraud_flag;
        let points: Vec<String> = record
            .charges
            .iter()
            .map(|c| format!("- charged with {c}"))
            .collect();
        let body = json!({
            "fraud_flag": fraud,
            "fraud_type": record.charge_categories.first(),
            "fraud_evidence": if fraud { Some(record.title.clone()) } else { None },
            "money_laundering_flag": record.keyword_money_laundering_flag,
            "fraud_rationale": if fraud { Some(points.join("\n")) } else { None },
        });
        format!("```json\n{body}\n```")
    }
}

#[async_trait]
impl NaturalLanguageService for SimulatedLanguageService {
    async fn classify(&self, record: &CaseRecord) -> Result<Classification> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let garbled = self
            .rng
            .lock()
            .await
            .gen_bool(self.malformed_rate.clamp(0.0, 1.0));
        let raw = if garbled {
            "I was unable to determine whether this release describes fraud.".to_string()
        } else {
            Self::answer(record)
        };
        Classification::from_model_output(&raw)
    }
}

/// Feedback sink that writes events to the tracing pipeline
#[derive(Debug, Clone, Default)]
pub struct TracingFeedbackSink;

#[async_trait]
impl FeedbackSink for TracingFeedbackSink {
    async fn append(&self, event: FeedbackEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        info!(target: "docket::feedback", event = %payload, "feedback event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(failure_rate: f64, malformed_rate: f64) -> SimulationConfig {
        SimulationConfig {
            seed: 7,
            failure_rate,
            malformed_rate,
            latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_work_source_items_carry_jurisdiction() {
        let items = SimulatedWorkSource::new(3).list_work_items().await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].jurisdiction().as_deref(), Some("SDNY"));
        assert_eq!(items[1].jurisdiction().as_deref(), Some("EDNY"));
    }

    #[tokio::test]
    async fn test_extractor_without_failures_always_yields_records() {
        let extractor = SimulatedExtractor::new(&quiet(0.0, 0.0));
        for i in 0..20 {
            let item = SimulatedWorkSource::item(i);
            let content = extractor.fetch(&item).await.unwrap().unwrap();
            let record = extractor.classify(&content).await.unwrap().unwrap();
            assert_eq!(record.item, item);
        }
    }

    #[tokio::test]
    async fn test_extractor_drops_everything_at_full_failure_rate() {
        let extractor = SimulatedExtractor::new(&quiet(1.0, 0.0));
        let item = SimulatedWorkSource::item(0);
        assert!(extractor.fetch(&item).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_seed_same_content() {
        let a = SimulatedExtractor::new(&quiet(0.3, 0.0));
        let b = SimulatedExtractor::new(&quiet(0.3, 0.0));
        for i in 0..10 {
            let item = SimulatedWorkSource::item(i);
            assert_eq!(a.fetch(&item).await.unwrap(), b.fetch(&item).await.unwrap());
        }
    }

    #[test]
    fn test_keyword_classification() {
        let content = RawContent {
            item: SimulatedWorkSource::item(1),
            title: "Owner Charged with Money Laundering and Bank Fraud".into(),
            body: "Proceeds moved through a shell company.".into(),
            published: None,
        };
        let record = tokio_test::block_on(
            SimulatedExtractor::new(&quiet(0.0, 0.0)).classify(&content),
        )
        .unwrap()
        .unwrap();
        assert!(record.keyword_fraud_flag);
        assert!(record.keyword_money_laundering_flag);
        assert!(record.charges.contains(&"bank fraud".to_string()));
    }

    #[tokio::test]
    async fn test_language_service_agrees_with_keywords() {
        let service = SimulatedLanguageService::new(&quiet(0.0, 0.0));
        let mut record = CaseRecord::new(SimulatedWorkSource::item(0), "Wire Fraud Scheme");
        record.keyword_fraud_flag = true;
        record.charges = vec!["wire fraud".into()];
        record.charge_categories = vec!["financial_fraud".into()];

        let classification = service.classify(&record).await.unwrap();
        assert!(classification.fraud_flag);
        assert_eq!(classification.fraud_type.as_deref(), Some("financial_fraud"));
        assert_eq!(
            service.parse_insights(classification.rationale.as_deref().unwrap()).points,
            vec!["charged with wire fraud".to_string()]
        );
    }

    #[tokio::test]
    async fn test_language_service_malformed_answer() {
        let service = SimulatedLanguageService::new(&quiet(0.0, 1.0));
        let record = CaseRecord::new(SimulatedWorkSource::item(0), "Anything");
        let err = service.classify(&record).await.unwrap_err();
        assert!(matches!(err, crate::error::DocketError::MalformedResponse(_)));
    }
}
