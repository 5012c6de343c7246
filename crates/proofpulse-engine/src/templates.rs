//! Type-keyed text templates and the synthetic identity pools.

use std::collections::HashMap;

use proofpulse_core::{ProofDraft, ProofType, UserInfo};
use rand::Rng;
use rand::seq::SliceRandom;

pub const NAMES: &[&str] = &[
    "Sarah M.", "James K.", "Linh T.", "Mateo R.", "Priya S.", "Tom W.",
    "Aiko N.", "Fatima Z.", "Lucas B.", "Emma L.", "Noah P.", "Chloe D.",
];

pub const LOCATIONS: &[&str] = &[
    "San Francisco, US", "London, UK", "Hanoi, VN", "Madrid, ES", "Bangalore, IN",
    "Toronto, CA", "Tokyo, JP", "Dubai, AE", "Berlin, DE", "Sydney, AU",
];

const PLANS: &[&str] = &["Pro", "Team", "Business", "Enterprise"];
const BADGES: &[&str] = &["Automation Master", "Early Bird", "Power User", "Streak Keeper"];
const WORKFLOWS: &[&str] = &[
    "invoice follow-ups", "lead enrichment", "weekly reporting", "support triage",
    "social scheduling",
];

/// Rendered display strings for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub title: String,
    pub description: String,
    pub icon: &'static str,
    pub metadata: HashMap<String, serde_json::Value>,
}

fn pick<'a, R: Rng>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

/// Fill title/description/icon for `kind`. Exhaustive over [`ProofType`].
pub fn render<R: Rng>(kind: ProofType, name: &str, location: &str, rng: &mut R) -> Rendered {
    let mut metadata = HashMap::new();
    let (title, description, icon) = match kind {
        ProofType::Signup => (
            "New signup".to_string(),
            format!("{name} from {location} just joined"),
            "👋",
        ),
        ProofType::Purchase => {
            let plan = pick(PLANS, rng);
            metadata.insert("plan".into(), plan.into());
            (
                "New upgrade".to_string(),
                format!("{name} upgraded to the {plan} plan"),
                "💳",
            )
        }
        ProofType::Achievement => {
            let badge = pick(BADGES, rng);
            metadata.insert("badge".into(), badge.into());
            (
                "Achievement unlocked".to_string(),
                format!("{name} earned the {badge} badge"),
                "🏆",
            )
        }
        ProofType::Workflow => {
            let workflow = pick(WORKFLOWS, rng);
            let saved: u32 = rng.gen_range(1..=12);
            metadata.insert("workflow".into(), workflow.into());
            metadata.insert("hours_saved".into(), saved.into());
            (
                "Workflow automated".to_string(),
                format!("{name} automated {workflow} and saved {saved}h this week"),
                "⚡",
            )
        }
        ProofType::Referral => {
            let invited: u32 = rng.gen_range(2..=8);
            metadata.insert("invited".into(), invited.into());
            (
                "Team growing".to_string(),
                format!("{name} invited {invited} teammates"),
                "🤝",
            )
        }
        ProofType::Review => {
            let stars: u8 = rng.gen_range(4..=5);
            metadata.insert("rating".into(), stars.into());
            (
                format!("New {stars}-star review"),
                format!("{name} rated us {stars}/5"),
                "⭐",
            )
        }
        ProofType::Milestone => {
            let count: u32 = rng.gen_range(1..=50) * 1_000;
            metadata.insert("count".into(), count.into());
            (
                "Milestone reached".to_string(),
                format!("{count} workflows run by the community"),
                "🎉",
            )
        }
    };
    Rendered {
        title,
        description,
        icon,
        metadata,
    }
}

/// Build a synthetic draft with a random identity from the pools.
pub fn synthetic_draft<R: Rng>(kind: ProofType, rng: &mut R) -> ProofDraft {
    let name = pick(NAMES, rng);
    let location = pick(LOCATIONS, rng);
    let verified = rng.gen_bool(0.5);
    let rendered = render(kind, name, location, rng);
    let mut draft = ProofDraft::new(
        kind,
        &rendered.title,
        &rendered.description,
        rendered.icon,
        UserInfo {
            name: name.to_string(),
            location: Some(location.to_string()),
            verified,
        },
    );
    draft.metadata = rendered.metadata;
    draft
}
