//! # ProofPulse Core
//!
//! Shared vocabulary for the ProofPulse engine: the notification data model,
//! live statistics, static testimonials, configuration and the error type.
//! No async, no I/O beyond config files.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BackendConfig, EngineConfig, EngineConfigPatch, Position, ProofPulseConfig, SnapshotConfig,
};
pub use error::{ProofPulseError, Result};
pub use types::{
    LiveStats, Priority, ProofDraft, ProofItem, ProofType, Testimonial, TestimonialAuthor,
    UserInfo,
};
