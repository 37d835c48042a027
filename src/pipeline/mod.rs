//! Build, review, authenticate and submit pipeline
//!
//! ## Architecture
//!
//! - **state**: steps, close reasons and the cross-task [`RunHandle`]
//! - **context**: run-scoped scratch state ([`PipelineContext`])
//! - **machine**: the [`SendPipeline`] state machine
//!
//! ## Flow
//!
//! ```text
//! Building ──build ok──▶ Reviewing ──send──▶ [Authenticating] ──▶ Submitting ──▶ Closed(Completed)
//!    │  ▲                   │                                        │
//!    │  └──────back─────────┘◀──────────── submission failed ────────┘
//!    │
//!    └─consolidation error─▶ prompt ──accept──▶ [Authenticating] ──▶ Submitting (sweep)
//!                              └──decline──▶ Building
//! ```
//!
//! Any step except `Submitting` can be closed, either through
//! [`SendPipeline::close`] or from another task through [`RunHandle::close`].

mod context;
mod machine;
mod state;

pub use context::PipelineContext;
pub use machine::{
    BuildOutcome, Collaborators, ConsolidationPrompt, ReviewSummary, SendOutcome, SendPipeline,
    SendReport,
};
pub use state::{CloseReason, RunHandle, Step};
