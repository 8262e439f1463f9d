use crate::model::{AuditResult, AuditSignals, Business, ProspectQuality};

/// CMS names considered dated enough to warrant a rebuild.
pub const OUTDATED_CMS: [&str; 7] = [
    "joomla",
    "drupal",
    "blogger",
    "weebly",
    "wix-old",
    "flash",
    "silverlight",
];

pub const MODERN_COPYRIGHT_YEAR: i32 = 2020;
pub const SLOW_LOAD_MS: u32 = 3000;
pub const HIGH_PROSPECT_SCORE: u8 = 70;
pub const MEDIUM_PROSPECT_SCORE: u8 = 40;

/// Scores a site 0-100; higher means a weaker web presence and a better prospect.
///
/// The copyright, CMS and load-time clauses only apply when there is a site to
/// inspect, so a business without a website scores exactly 60.
pub fn calculate_score(signals: &AuditSignals) -> (u8, Vec<String>) {
    let mut score: u32 = 0;
    let mut issues = Vec::new();

    if !signals.has_website {
        score += 20;
        issues.push("No website found".to_string());
    }

    if !signals.has_ssl {
        score += 20;
        issues.push("No SSL/HTTPS".to_string());
    }

    if !signals.is_mobile_friendly {
        score += 20;
        issues.push("Not mobile-friendly".to_string());
    }

    if signals.has_website {
        match signals.copyright_year {
            Some(year) if year >= MODERN_COPYRIGHT_YEAR => {}
            Some(year) => {
                score += 15;
                issues.push(format!("Outdated copyright year ({})", year));
            }
            None => {
                score += 15;
                issues.push("Outdated copyright year (none)".to_string());
            }
        }

        if let Some(cms) = signals.cms_detected.as_deref() {
            let lower = cms.to_lowercase();
            if OUTDATED_CMS.iter().any(|old| lower.contains(old)) {
                score += 15;
                issues.push(format!("Outdated CMS detected: {}", cms));
            }
        }

        if let Some(load_ms) = signals.load_time_ms.filter(|ms| *ms > SLOW_LOAD_MS) {
            score += 10;
            issues.push(format!("Slow load time ({}ms)", load_ms));
        }
    }

    (score.min(100) as u8, issues)
}

/// Buckets a business for outreach. A site that was never audited gets no bucket.
pub fn prospect_quality(business: &Business, audit: Option<&AuditResult>) -> Option<ProspectQuality> {
    if !business.has_website() {
        return Some(ProspectQuality::NoWebsite);
    }
    let score = audit?.score;
    Some(if score >= HIGH_PROSPECT_SCORE {
        ProspectQuality::High
    } else if score >= MEDIUM_PROSPECT_SCORE {
        ProspectQuality::Medium
    } else {
        ProspectQuality::Low
    })
}
