// Auditor module: website signals, scoring and the audit runner.

pub mod scoring;
pub mod signals;
pub mod website;

pub use website::WebsiteAuditor;
