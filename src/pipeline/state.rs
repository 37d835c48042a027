//! Pipeline steps and the cross-task run handle

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::collaborators::ProtocolSession;
use crate::errors::{PipelineError, PipelineResult};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Submission succeeded
    Completed,
    /// User closed the flow
    Cancelled,
}

/// User-visible pipeline step
///
/// A pending consolidation prompt is not a step of its own: the pipeline
/// stays in `Building` with the consolidation flag raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Building,
    Reviewing,
    Authenticating,
    Submitting,
    Closed(CloseReason),
}

impl Step {
    pub fn is_closed(&self) -> bool {
        matches!(self, Step::Closed(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Building => write!(f, "building"),
            Step::Reviewing => write!(f, "reviewing"),
            Step::Authenticating => write!(f, "authenticating"),
            Step::Submitting => write!(f, "submitting"),
            Step::Closed(CloseReason::Completed) => write!(f, "closed (completed)"),
            Step::Closed(CloseReason::Cancelled) => write!(f, "closed (cancelled)"),
        }
    }
}

const PHASE_IDLE: u8 = 0;
const PHASE_IN_FLIGHT: u8 = 1;
const PHASE_SUBMITTING: u8 = 2;
const PHASE_CLOSED: u8 = 3;

/// Ticket taken before a network call; checked when the call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

/// State shared between a pipeline and its handles
///
/// Atomics only: the pipeline owns its context, handles only flip the phase
/// and bump the generation.
struct RunShared {
    run_id: Uuid,
    generation: AtomicU64,
    phase: AtomicU8,
    session: Option<Arc<dyn ProtocolSession>>,
}

/// Cloneable handle used to close a run from another task
///
/// Closing while a build is in flight does not abort the call; its result
/// is discarded when it arrives. Closing while submitting is refused so a
/// sweep sequence is never cut in half.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.shared.run_id)
            .field("generation", &self.shared.generation.load(Ordering::Acquire))
            .field("phase", &self.shared.phase.load(Ordering::Acquire))
            .finish()
    }
}

impl RunHandle {
    pub(crate) fn new(session: Option<Arc<dyn ProtocolSession>>) -> Self {
        Self {
            shared: Arc::new(RunShared {
                run_id: Uuid::new_v4(),
                generation: AtomicU64::new(0),
                phase: AtomicU8::new(PHASE_IDLE),
                session,
            }),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.run_id
    }

    pub fn is_closed(&self) -> bool {
        self.shared.phase.load(Ordering::Acquire) == PHASE_CLOSED
    }

    /// True while a build or submission is awaiting the ledger
    pub fn is_loading(&self) -> bool {
        matches!(
            self.shared.phase.load(Ordering::Acquire),
            PHASE_IN_FLIGHT | PHASE_SUBMITTING
        )
    }

    /// Close the run
    ///
    /// Clears the pending peer request and invalidates any in-flight build.
    /// Idempotent once closed.
    pub fn close(&self) -> PipelineResult<()> {
        let mut current = self.shared.phase.load(Ordering::Acquire);
        loop {
            match current {
                PHASE_CLOSED => return Ok(()),
                PHASE_SUBMITTING => return Err(PipelineError::CloseDuringSubmission),
                _ => {}
            }
            match self.shared.phase.compare_exchange(
                current,
                PHASE_CLOSED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(session) = &self.shared.session {
            session.clear_pending_request();
        }
        debug!(run_id = %self.shared.run_id, "Run closed");
        Ok(())
    }

    /// Enter a suspension point; `None` if the run is already closed
    pub(crate) fn begin(&self, submitting: bool) -> Option<Ticket> {
        let next = if submitting { PHASE_SUBMITTING } else { PHASE_IN_FLIGHT };
        self.shared
            .phase
            .compare_exchange(PHASE_IDLE, next, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Ticket(self.shared.generation.load(Ordering::Acquire)))
    }

    /// Leave a suspension point; false when the result must be discarded
    pub(crate) fn finish(&self, ticket: Ticket) -> bool {
        let current = self.shared.generation.load(Ordering::Acquire) == ticket.0;
        let _ = self.shared.phase.compare_exchange(
            PHASE_IN_FLIGHT,
            PHASE_IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.shared.phase.compare_exchange(
            PHASE_SUBMITTING,
            PHASE_IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        current && !self.is_closed()
    }

    /// Mark the run finished after a successful submission
    pub(crate) fn complete(&self) {
        self.shared.phase.store(PHASE_CLOSED, Ordering::Release);
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
    }
}
