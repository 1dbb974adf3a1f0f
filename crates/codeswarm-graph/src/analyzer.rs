//! Complexity analysis: keyword extraction and the weighted factor score.

use crate::types::Complexity;
use serde::{Deserialize, Serialize};

/// Boolean and categorical complexity factors extracted from a project
/// description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityFactors {
    /// Canonical names of recognized technologies.
    pub technologies: Vec<String>,
    /// Recognized product features.
    pub features: Vec<String>,
    /// Recognized third-party integrations.
    pub integrations: Vec<String>,
    pub has_auth: bool,
    pub has_database: bool,
    pub has_realtime: bool,
    pub has_payments: bool,
    pub has_ml: bool,
    pub has_blockchain: bool,
    pub requires_scaling: bool,
    pub requires_security: bool,
}

/// Canonical technology names with their accepted aliases.
const TECHNOLOGIES: &[(&str, &[&str])] = &[
    ("react", &["react", "reactjs", "react.js"]),
    ("vue", &["vue", "vuejs", "vue.js"]),
    ("angular", &["angular"]),
    ("svelte", &["svelte"]),
    ("nodejs", &["node", "nodejs", "node.js"]),
    ("express", &["express"]),
    ("django", &["django"]),
    ("rails", &["rails", "ruby on rails"]),
    ("postgresql", &["postgresql", "postgres"]),
    ("mysql", &["mysql"]),
    ("mongodb", &["mongodb", "mongo"]),
    ("redis", &["redis"]),
    ("graphql", &["graphql"]),
    ("docker", &["docker"]),
    ("kubernetes", &["kubernetes", "k8s"]),
    ("rust", &["rust"]),
    ("python", &["python"]),
    ("typescript", &["typescript"]),
];

const FEATURES: &[&str] = &[
    "dashboard",
    "chat",
    "search",
    "notifications",
    "analytics",
    "upload",
    "profile",
    "feed",
    "comments",
    "reporting",
    "export",
    "calendar",
];

const INTEGRATIONS: &[&str] = &[
    "stripe",
    "paypal",
    "twilio",
    "sendgrid",
    "slack",
    "salesforce",
    "shopify",
    "s3",
    "firebase",
    "openai",
];

const AUTH_KEYWORDS: &[&str] = &[
    "auth",
    "authentication",
    "login",
    "signin",
    "sign-in",
    "signup",
    "oauth",
    "jwt",
    "user accounts",
];

const DATABASE_KEYWORDS: &[&str] = &["database", "sql", "persistence", "data store"];

const REALTIME_KEYWORDS: &[&str] = &[
    "realtime",
    "real-time",
    "websocket",
    "websockets",
    "live updates",
    "live collaboration",
];

const PAYMENT_KEYWORDS: &[&str] = &[
    "payment",
    "payments",
    "billing",
    "checkout",
    "subscription",
    "subscriptions",
];

const ML_KEYWORDS: &[&str] = &[
    "machine learning",
    "ml model",
    "recommendation engine",
    "neural network",
    "llm",
    "ai model",
];

const BLOCKCHAIN_KEYWORDS: &[&str] = &[
    "blockchain",
    "web3",
    "smart contract",
    "smart contracts",
    "nft",
    "crypto wallet",
];

const SCALING_KEYWORDS: &[&str] = &[
    "scale",
    "scaling",
    "scalable",
    "high traffic",
    "load balancing",
    "millions of users",
];

const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "secure",
    "encryption",
    "compliance",
    "gdpr",
    "hipaa",
    "audit trail",
];

/// True if `keyword` appears in `text` on a word boundary.
fn matches_keyword(text: &str, keyword: &str) -> bool {
    // Keywords are fixed strings from the tables above, so the pattern is
    // always valid; fall back to substring match if escaping ever fails.
    let pattern = format!(r"(^|[^a-z0-9]){}($|[^a-z0-9])", regex::escape(keyword));
    match regex::Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => text.contains(keyword),
    }
}

fn any_keyword(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| matches_keyword(text, kw))
}

/// Extract complexity factors from a free-text project description.
///
/// Pure function of the input text; unrecognized descriptions yield empty
/// factors (the template generator then produces a minimal task set).
pub fn extract_factors(description: &str) -> ComplexityFactors {
    let text = description.to_lowercase();

    let technologies: Vec<String> = TECHNOLOGIES
        .iter()
        .filter(|(_, aliases)| any_keyword(&text, aliases))
        .map(|(canonical, _)| (*canonical).to_string())
        .collect();

    let features: Vec<String> = FEATURES
        .iter()
        .filter(|kw| matches_keyword(&text, kw))
        .map(|kw| (*kw).to_string())
        .collect();

    let integrations: Vec<String> = INTEGRATIONS
        .iter()
        .filter(|kw| matches_keyword(&text, kw))
        .map(|kw| (*kw).to_string())
        .collect();

    let db_tech = ["postgresql", "mysql", "mongodb", "redis"]
        .iter()
        .any(|t| technologies.iter().any(|have| have == t));

    let has_payments =
        any_keyword(&text, PAYMENT_KEYWORDS) || integrations.iter().any(|i| i == "stripe" || i == "paypal");

    ComplexityFactors {
        has_auth: any_keyword(&text, AUTH_KEYWORDS),
        has_database: db_tech || any_keyword(&text, DATABASE_KEYWORDS),
        has_realtime: any_keyword(&text, REALTIME_KEYWORDS),
        has_payments,
        has_ml: any_keyword(&text, ML_KEYWORDS),
        has_blockchain: any_keyword(&text, BLOCKCHAIN_KEYWORDS),
        requires_scaling: any_keyword(&text, SCALING_KEYWORDS),
        requires_security: any_keyword(&text, SECURITY_KEYWORDS),
        technologies,
        features,
        integrations,
    }
}

/// Weighted complexity score. Monotonic: adding any factor never lowers it.
pub fn complexity_score(factors: &ComplexityFactors) -> f32 {
    let mut score = 2.0 * factors.technologies.len() as f32
        + 1.5 * factors.features.len() as f32
        + 3.0 * factors.integrations.len() as f32;

    if factors.has_auth {
        score += 3.0;
    }
    if factors.has_database {
        score += 2.0;
    }
    if factors.has_realtime {
        score += 4.0;
    }
    if factors.has_payments {
        score += 5.0;
    }
    if factors.has_ml {
        score += 8.0;
    }
    if factors.has_blockchain {
        score += 7.0;
    }
    if factors.requires_scaling {
        score += 5.0;
    }
    if factors.requires_security {
        score += 4.0;
    }

    score
}

/// Map a score to a complexity tier.
pub fn complexity_level(score: f32) -> Complexity {
    if score < 10.0 {
        Complexity::Simple
    } else if score < 25.0 {
        Complexity::Moderate
    } else if score < 50.0 {
        Complexity::Complex
    } else {
        Complexity::Enterprise
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_react_postgres_auth() {
        let factors = extract_factors(
            "Build a React dashboard with user authentication and a Postgres database",
        );
        assert!(factors.has_auth);
        assert!(factors.has_database);
        assert!(factors.technologies.contains(&"react".to_string()));
        assert!(factors.technologies.contains(&"postgresql".to_string()));
        assert!(factors.features.contains(&"dashboard".to_string()));
        assert!(!factors.has_blockchain);
    }

    #[test]
    fn test_extract_empty_description() {
        let factors = extract_factors("a thing");
        assert!(factors.technologies.is_empty());
        assert!(factors.features.is_empty());
        assert!(!factors.has_auth);
        assert_eq!(complexity_score(&factors), 0.0);
    }

    #[test]
    fn test_word_boundary_matching() {
        // "goal" must not match the "go" technology if it were listed; check
        // that "scale" does not fire from "scaled-down" prefix misuse.
        assert!(matches_keyword("we must scale fast", "scale"));
        assert!(!matches_keyword("rescale the image", "scale"));
        assert!(matches_keyword("uses postgres.", "postgres"));
    }

    #[test]
    fn test_score_monotonic_in_factors() {
        let base = extract_factors("a simple site");
        let with_chain = extract_factors("a simple site on the blockchain");
        assert!(complexity_score(&with_chain) >= complexity_score(&base));

        let with_more = extract_factors("a simple site on the blockchain with payments");
        assert!(complexity_score(&with_more) >= complexity_score(&with_chain));
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(complexity_level(0.0), Complexity::Simple);
        assert_eq!(complexity_level(9.9), Complexity::Simple);
        assert_eq!(complexity_level(10.0), Complexity::Moderate);
        assert_eq!(complexity_level(24.9), Complexity::Moderate);
        assert_eq!(complexity_level(25.0), Complexity::Complex);
        assert_eq!(complexity_level(49.9), Complexity::Complex);
        assert_eq!(complexity_level(50.0), Complexity::Enterprise);
    }

    #[test]
    fn test_payment_integration_implies_payments() {
        let factors = extract_factors("an online store with stripe");
        assert!(factors.has_payments);
        assert!(factors.integrations.contains(&"stripe".to_string()));
    }
}
