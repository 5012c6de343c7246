//! Static testimonial catalog. Built once, never mutated.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use proofpulse_core::{Testimonial, TestimonialAuthor};
use serde::{Deserialize, Serialize};

/// Query for [`query`]. `None` fields don't filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestimonialQuery {
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

static CATALOG: OnceLock<Vec<Testimonial>> = OnceLock::new();

pub fn catalog() -> &'static [Testimonial] {
    CATALOG.get_or_init(build)
}

/// Filter by `featured`, then cap at `limit`. Catalog order is preserved.
pub fn query(q: &TestimonialQuery) -> Vec<Testimonial> {
    catalog()
        .iter()
        .filter(|t| q.featured.is_none_or(|f| t.featured == f))
        .take(q.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn metrics(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    name: &str,
    role: &str,
    company: &str,
    content: &str,
    rating: u8,
    date: NaiveDate,
    featured: bool,
    metrics: Option<BTreeMap<String, String>>,
    tags: &[&str],
) -> Testimonial {
    Testimonial {
        id: id.to_string(),
        author: TestimonialAuthor {
            name: name.to_string(),
            role: role.to_string(),
            company: company.to_string(),
            avatar: None,
            verified: true,
        },
        content: content.to_string(),
        rating,
        date,
        featured,
        metrics,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn build() -> Vec<Testimonial> {
    vec![
        entry(
            "t-001",
            "Maya Chen",
            "Head of Operations",
            "Northwind Logistics",
            "We replaced four scheduling tools and a spreadsheet with two workflows. The team got Fridays back.",
            5,
            date(2025, 3, 14),
            true,
            metrics(&[("time_saved", "12h/week"), ("tools_replaced", "4")]),
            &["operations", "automation"],
        ),
        entry(
            "t-002",
            "Daniel Okafor",
            "Founder",
            "Brightlane Studio",
            "Onboarding clients used to take a day. Now it is a form and a coffee.",
            5,
            date(2025, 5, 2),
            true,
            metrics(&[("onboarding_time", "-85%")]),
            &["agency", "onboarding"],
        ),
        entry(
            "t-003",
            "Elena Petrova",
            "Finance Lead",
            "Kestrel Capital",
            "Invoice follow-ups run themselves. Late payments dropped within the first month.",
            4,
            date(2025, 6, 21),
            false,
            metrics(&[("late_payments", "-40%")]),
            &["finance"],
        ),
        entry(
            "t-004",
            "Hiro Tanaka",
            "Engineering Manager",
            "Pixelforge",
            "The on-call triage workflow routes alerts better than our old runbook ever did.",
            5,
            date(2025, 8, 9),
            true,
            None,
            &["engineering", "support"],
        ),
        entry(
            "t-005",
            "Sofia Alvarez",
            "Marketing Director",
            "Solstice Retail",
            "Campaign reports land in Slack every Monday without anyone touching them.",
            4,
            date(2025, 9, 30),
            false,
            metrics(&[("reports_automated", "26")]),
            &["marketing", "reporting"],
        ),
        entry(
            "t-006",
            "Kwame Mensah",
            "CTO",
            "Harbor Health",
            "Setup was quick and the audit trail made compliance review painless.",
            5,
            date(2025, 11, 12),
            false,
            None,
            &["healthcare", "compliance"],
        ),
    ]
}
