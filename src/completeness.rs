/// Completeness scoring for lead records
///
/// The score is a sum of fixed field weights (totalling 100). A field contributes
/// only while it is present and non-empty, so adding a field can never lower the
/// score. The enrichment waterfall relies on that to stop early.
use crate::models::Lead;
use regex::Regex;
use std::sync::OnceLock;

/// Field weights; the email weight applies only to a syntactically valid address.
pub const FIELD_WEIGHTS: &[(&str, u8)] = &[
    ("email", 15),
    ("email_verified", 10),
    ("company_domain", 10),
    ("company_name", 10),
    ("phone", 10),
    ("first_name", 5),
    ("last_name", 5),
    ("title", 5),
    ("seniority", 5),
    ("linkedin_url", 5),
    ("industry", 5),
    ("employee_count", 5),
    ("annual_revenue", 5),
    ("location", 5),
];

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        // RFC 5322 simplified: local@domain.tld
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and a dotted domain)
/// - Fake/placeholder patterns (repeated digits like 999999, 111111)
/// - Minimum length requirements
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    if let Some(pattern) = fake_patterns.iter().find(|p| email.contains(*p)) {
        tracing::debug!("Email rejected (fake pattern '{}'): {}", pattern, email);
        return false;
    }

    email_regex().is_match(email)
}

/// Scores a lead from 0 to 100 by which weighted fields it carries.
pub fn completeness_score(lead: &Lead) -> u8 {
    let total: u32 = FIELD_WEIGHTS
        .iter()
        .filter(|(field, _)| match *field {
            "email" => lead.get_str("email").map(is_valid_email).unwrap_or(false),
            other => lead.has(other),
        })
        .map(|(_, weight)| *weight as u32)
        .sum();

    total.min(100) as u8
}
