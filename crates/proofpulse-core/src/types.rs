//! Data model — notification items, live statistics and testimonials.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Floor for `LiveStats::active_users`. Never observed below this.
pub const MIN_ACTIVE_USERS: u64 = 100;

/// Kind of social proof event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofType {
    Signup,
    Purchase,
    Achievement,
    Workflow,
    Referral,
    Review,
    Milestone,
}

impl ProofType {
    /// Every variant, in declaration order.
    pub const ALL: [ProofType; 7] = [
        ProofType::Signup,
        ProofType::Purchase,
        ProofType::Achievement,
        ProofType::Workflow,
        ProofType::Referral,
        ProofType::Review,
        ProofType::Milestone,
    ];

    /// Fixed type→priority table. Individual items may override it.
    pub fn default_priority(&self) -> Priority {
        match self {
            ProofType::Milestone => Priority::Urgent,
            ProofType::Purchase | ProofType::Referral => Priority::High,
            ProofType::Signup | ProofType::Achievement | ProofType::Review => Priority::Medium,
            ProofType::Workflow => Priority::Low,
        }
    }
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofType::Signup => write!(f, "signup"),
            ProofType::Purchase => write!(f, "purchase"),
            ProofType::Achievement => write!(f, "achievement"),
            ProofType::Workflow => write!(f, "workflow"),
            ProofType::Referral => write!(f, "referral"),
            ProofType::Review => write!(f, "review"),
            ProofType::Milestone => write!(f, "milestone"),
        }
    }
}

/// Priority band. Ordered `Low < Medium < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Display identity attached to an item. Synthetic on the generated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// One displayable notification. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofItem {
    /// Process-unique id, assigned at enqueue time.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProofType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub user: UserInfo,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// An item as submitted by a caller: no id, no timestamp.
/// `priority: None` resolves through [`ProofType::default_priority`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofDraft {
    #[serde(rename = "type")]
    pub kind: ProofType,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub user: UserInfo,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProofDraft {
    pub fn new(kind: ProofType, title: &str, description: &str, icon: &str, user: UserInfo) -> Self {
        Self {
            kind,
            priority: None,
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            user,
            metadata: HashMap::new(),
        }
    }

    /// Override the table priority for this instance.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Effective priority after applying the override.
    pub fn resolved_priority(&self) -> Priority {
        self.priority.unwrap_or_else(|| self.kind.default_priority())
    }

    /// Stamp the draft into a full item.
    pub fn into_item(self, id: String, timestamp: DateTime<Utc>) -> ProofItem {
        let priority = self.resolved_priority();
        ProofItem {
            id,
            kind: self.kind,
            priority,
            title: self.title,
            description: self.description,
            icon: self.icon,
            user: self.user,
            timestamp,
            metadata: self.metadata,
        }
    }
}

/// Blended authoritative/simulated aggregate counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub active_users: u64,
    pub signups_today: u64,
    pub workflows_run: u64,
    /// Hours saved across all users.
    pub time_saved: u64,
    pub countries: u32,
    pub average_rating: f64,
    pub total_reviews: u64,
}

impl Default for LiveStats {
    fn default() -> Self {
        Self {
            active_users: 1_247,
            signups_today: 89,
            workflows_run: 15_420,
            time_saved: 3_200,
            countries: 47,
            average_rating: 4.8,
            total_reviews: 2_341,
        }
    }
}

impl LiveStats {
    /// Shift `active_users` by `delta`, clamped to [`MIN_ACTIVE_USERS`].
    pub fn shift_active_users(&mut self, delta: i64) {
        self.active_users = self
            .active_users
            .saturating_add_signed(delta)
            .max(MIN_ACTIVE_USERS);
    }

    /// Re-apply the floor clamp (used after deserializing foreign values).
    pub fn clamp(mut self) -> Self {
        self.active_users = self.active_users.max(MIN_ACTIVE_USERS);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestimonialAuthor {
    pub name: String,
    pub role: String,
    pub company: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Static customer quote. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: String,
    pub author: TestimonialAuthor,
    pub content: String,
    /// 1–5 stars.
    pub rating: u8,
    pub date: NaiveDate,
    pub featured: bool,
    #[serde(default)]
    pub metrics: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Vec<String>,
}
