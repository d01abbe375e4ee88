//! Work items and the case records produced from them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocketError, Result};

/// Opaque identifier for one unit of input (a press-release URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Jurisdiction code carried by the URL, e.g. `SDNY` for `/usao-sdny/`
    /// or `NY` for `justice.gov/ny/`
    pub fn jurisdiction(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.0).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.collect();

        if let Some(code) = segments
            .iter()
            .find_map(|segment| segment.strip_prefix("usao-"))
            .filter(|code| is_district_code(code))
        {
            return Some(code.to_uppercase());
        }

        let host = parsed.host_str()?;
        if host.ends_with(".gov") {
            // `.gov/xx/` only counts when another segment follows
            if segments.len() > 1 && is_district_code(segments[0]) {
                return Some(segments[0].to_uppercase());
            }
        }

        None
    }
}

fn is_district_code(code: &str) -> bool {
    (2..=4).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase())
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkItem {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkItem {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Content fetched for a work item before classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContent {
    pub item: WorkItem,
    pub title: String,
    pub body: String,
    pub published: Option<NaiveDate>,
}

/// Natural-language classification of a case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub fraud_flag: bool,
    #[serde(default)]
    pub fraud_type: Option<String>,
    #[serde(default, alias = "fraud_evidence")]
    pub evidence: Option<String>,
    #[serde(default)]
    pub money_laundering_flag: bool,
    #[serde(default, alias = "fraud_rationale")]
    pub rationale: Option<String>,
}

impl Classification {
    /// Parse raw model output (optionally wrapped in a markdown code fence)
    /// and normalize it for logical consistency.
    pub fn from_model_output(raw: &str) -> Result<Self> {
        let body = strip_code_fence(raw.trim());
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| DocketError::MalformedResponse(format!("invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(DocketError::MalformedResponse(
                "expected a JSON object".to_string(),
            ));
        }
        let parsed: Classification = serde_json::from_value(value)
            .map_err(|e| DocketError::MalformedResponse(format!("unexpected shape: {e}")))?;
        Ok(parsed.normalized())
    }

    /// A fraud type or evidence implies the fraud flag; a cleared flag clears
    /// every fraud field.
    pub fn normalized(mut self) -> Self {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.fraud_type) {
            self.fraud_type = None;
        }
        if blank(&self.evidence) {
            self.evidence = None;
        }
        if self.fraud_type.is_some() || self.evidence.is_some() {
            self.fraud_flag = true;
        }
        if !self.fraud_flag {
            self.fraud_type = None;
            self.evidence = None;
            self.rationale = None;
        }
        self
    }
}

fn strip_code_fence(content: &str) -> &str {
    if let Some(rest) = content.strip_prefix("```") {
        if let Some(end) = rest.rfind("```") {
            let inner = rest[..end].trim();
            return inner.strip_prefix("json").map(str::trim).unwrap_or(inner);
        }
    }
    content
}

/// Kind of proceeding a release describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Criminal,
    Civil,
    Plea,
    #[default]
    Unknown,
}

impl CaseType {
    /// First matching vocabulary wins: criminal, then civil, then plea
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if any(&["indictment", "indicted", "criminal", "convicted"]) {
            CaseType::Criminal
        } else if any(&["civil", "lawsuit", "settlement"]) {
            CaseType::Civil
        } else if any(&["guilty", "plea", "pleaded", "pled"]) {
            CaseType::Plea
        } else {
            CaseType::Unknown
        }
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseType::Criminal => write!(f, "criminal"),
            CaseType::Civil => write!(f, "civil"),
            CaseType::Plea => write!(f, "plea"),
            CaseType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of successfully processing a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: Uuid,
    pub item: WorkItem,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub charges: Vec<String>,
    #[serde(default)]
    pub case_type: CaseType,
    /// Fraud categories matched by keyword
    pub charge_categories: Vec<String>,
    pub keyword_fraud_flag: bool,
    pub keyword_money_laundering_flag: bool,
    pub classification: Option<Classification>,
    pub extracted_at: DateTime<Utc>,
}

impl CaseRecord {
    pub fn new(item: WorkItem, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item,
            title: title.into(),
            date: None,
            charges: Vec::new(),
            case_type: CaseType::Unknown,
            charge_categories: Vec::new(),
            keyword_fraud_flag: false,
            keyword_money_laundering_flag: false,
            classification: None,
            extracted_at: Utc::now(),
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Fraud verdict, preferring the language classification over keywords
    pub fn is_fraud(&self) -> bool {
        self.classification
            .as_ref()
            .map(|c| c.fraud_flag)
            .unwrap_or(self.keyword_fraud_flag)
    }

    pub fn is_money_laundering(&self) -> bool {
        self.classification
            .as_ref()
            .map(|c| c.money_laundering_flag)
            .unwrap_or(self.keyword_money_laundering_flag)
    }
}

/// Structured form of free-text model insights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredInsight {
    pub summary: Option<String>,
    pub points: Vec<String>,
}

impl StructuredInsight {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.points.is_empty()
    }

    /// Default extraction: bulleted or numbered lines become points, the first
    /// other non-empty line becomes the summary.
    pub fn from_text(text: &str) -> Self {
        let mut insight = StructuredInsight::default();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match strip_list_marker(line) {
                Some(point) if !point.is_empty() => insight.points.push(point.to_string()),
                Some(_) => {}
                None if insight.summary.is_none() => insight.summary = Some(line.to_string()),
                None => {}
            }
        }
        insight
    }
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}
