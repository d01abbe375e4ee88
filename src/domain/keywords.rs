//! Keyword vocabularies for fraud and money-laundering detection
//!
//! Matching is whole-word and case-insensitive: "fraud" matches
//! "wire fraud scheme" but not "defrauded".

/// Fraud categories with their trigger phrases
pub const FRAUD_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "general_fraud",
        &[
            "fraud", "fraudulent", "defraud", "scheme", "scam", "deceive", "deception",
            "counterfeit", "forgery", "phony", "bogus", "sham",
        ],
    ),
    (
        "financial_fraud",
        &[
            "embezzlement", "money laundering", "ponzi scheme", "investment fraud",
            "securities fraud", "wire fraud", "mail fraud", "bank fraud", "credit card fraud",
            "identity theft", "mortgage fraud", "loan fraud", "insurance fraud", "tax evasion",
            "shell company", "money mule",
        ],
    ),
    (
        "healthcare_fraud",
        &[
            "medicare fraud", "medicaid fraud", "healthcare fraud", "health care fraud",
            "billing fraud", "upcoding", "kickback", "false billing", "phantom billing",
            "prescription fraud",
        ],
    ),
    (
        "disaster_fraud",
        &[
            "disaster fraud", "fema fraud", "covid fraud", "pandemic fraud", "ppp fraud",
            "ppp loan fraud", "sba fraud", "stimulus fraud",
        ],
    ),
    (
        "consumer_fraud",
        &[
            "telemarketing fraud", "phone scam", "online fraud", "internet fraud", "phishing",
            "false advertising", "pyramid scheme",
        ],
    ),
    (
        "government_fraud",
        &[
            "public corruption", "bribery", "official misconduct", "false claims",
            "election fraud", "voter fraud",
        ],
    ),
    (
        "business_fraud",
        &[
            "insider trading", "market manipulation", "price fixing", "bid rigging",
            "accounting fraud", "corporate fraud",
        ],
    ),
    (
        "immigration_fraud",
        &[
            "visa fraud", "immigration fraud", "document fraud", "marriage fraud",
            "false statements",
        ],
    ),
    (
        "intellectual_property_fraud",
        &[
            "counterfeiting", "piracy", "trademark infringement", "copyright infringement",
            "counterfeit products",
        ],
    ),
];

pub const MONEY_LAUNDERING_KEYWORDS: &[&str] = &[
    "money laundering", "laundering", "laundered", "launder", "proceeds of crime",
    "illicit funds", "smurfing", "structuring", "shell company", "front company",
    "offshore account", "hawala", "bulk cash", "concealment of proceeds", "illegal proceeds",
    "dirty money",
];

/// Whole-word, case-insensitive phrase search
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let haystack = text.to_lowercase();
    let needle = phrase.to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + needle.len();
    }
    false
}

/// Fraud categories whose phrases appear in `text`, in vocabulary order
pub fn fraud_categories(text: &str) -> Vec<&'static str> {
    FRAUD_KEYWORDS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|p| contains_phrase(text, p)))
        .map(|(category, _)| *category)
        .collect()
}

/// Specific (non-general) fraud phrases found in `text`, used as charges
pub fn matched_charges(text: &str) -> Vec<String> {
    let mut charges: Vec<String> = FRAUD_KEYWORDS
        .iter()
        .filter(|(category, _)| *category != "general_fraud")
        .flat_map(|(_, phrases)| phrases.iter())
        .filter(|p| contains_phrase(text, p))
        .map(|p| p.to_string())
        .collect();
    charges.sort();
    charges.dedup();
    charges
}

pub fn mentions_money_laundering(text: &str) -> bool {
    MONEY_LAUNDERING_KEYWORDS
        .iter()
        .any(|p| contains_phrase(text, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_matching() {
        assert!(contains_phrase("Charged with Wire Fraud.", "wire fraud"));
        assert!(!contains_phrase("he was defrauded", "fraud"));
        assert!(contains_phrase("fraud", "fraud"));
        assert!(!contains_phrase("anything", ""));
    }

    #[test]
    fn test_fraud_categories() {
        let text = "Doctor convicted of health care fraud and kickback scheme";
        let categories = fraud_categories(text);
        assert_eq!(categories, vec!["general_fraud", "healthcare_fraud"]);
        assert!(fraud_categories("Man sentenced for drug trafficking").is_empty());
    }

    #[test]
    fn test_matched_charges_are_sorted_and_unique() {
        let charges = matched_charges("wire fraud, bank fraud and more wire fraud");
        assert_eq!(charges, vec!["bank fraud", "wire fraud"]);
    }

    #[test]
    fn test_money_laundering_detection() {
        assert!(mentions_money_laundering("conspiracy to commit money laundering"));
        assert!(!mentions_money_laundering("tax evasion"));
    }
}
