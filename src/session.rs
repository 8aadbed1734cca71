//! Detection session state machine.
//!
//! ```text
//!            select             begin_submit            finish(Ok)
//!   Empty ───────────▶ Previewing ──────────▶ Submitting ──────────▶ Succeeded
//!     ▲                  ▲    │                    │                     │
//!     │      clear       │    │                    │ finish(Err)         │
//!     └──────────────────┼────┘                    ▼                     │
//!                        └──── select ───────── Failed ◀─────────────────┘
//! ```
//!
//! `Succeeded` and `Failed` keep the image so the user can resubmit with
//! another format. While `Submitting`, every transition other than
//! `finish` is refused, which is what keeps at most one request in flight.

use thiserror::Error;

use crate::detect::Detector;
use crate::error::OrchestrationError;
use crate::types::{DetectionRequest, DetectionResult, EncodedImage, TargetFormat};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Previewing {
        image: EncodedImage,
    },
    Submitting {
        image: EncodedImage,
        target_format: TargetFormat,
    },
    Succeeded {
        image: EncodedImage,
        result: DetectionResult,
    },
    Failed {
        image: EncodedImage,
        error: OrchestrationError,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Previewing { .. } => "previewing",
            SessionState::Submitting { .. } => "submitting",
            SessionState::Succeeded { .. } => "succeeded",
            SessionState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a detection request is already in flight")]
    SubmissionInFlight,

    #[error("no image selected")]
    NoImage,

    #[error("no detection request is in flight")]
    NotSubmitting,
}

/// One user's upload/detect workflow.
#[derive(Debug, Clone, Default)]
pub struct DetectionSession {
    state: SessionState,
}

impl DetectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Submitting { .. })
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Previewing { image }
            | SessionState::Submitting { image, .. }
            | SessionState::Succeeded { image, .. }
            | SessionState::Failed { image, .. } => Some(image),
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match &self.state {
            SessionState::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&OrchestrationError> {
        match &self.state {
            SessionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Replace the current image (and drop any previous result).
    pub fn select(&mut self, image: EncodedImage) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.state = SessionState::Previewing { image };
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.state = SessionState::Empty;
        Ok(())
    }

    /// Enter `Submitting` and hand back the request to dispatch.
    pub fn begin_submit(
        &mut self,
        target_format: TargetFormat,
    ) -> Result<DetectionRequest, SessionError> {
        let image = self.enter_submitting(target_format)?;
        Ok(DetectionRequest::new(image, target_format))
    }

    fn enter_submitting(
        &mut self,
        target_format: TargetFormat,
    ) -> Result<&EncodedImage, SessionError> {
        let image = match std::mem::take(&mut self.state) {
            SessionState::Empty => return Err(SessionError::NoImage),
            SessionState::Previewing { image }
            | SessionState::Succeeded { image, .. }
            | SessionState::Failed { image, .. } => image,
            busy @ SessionState::Submitting { .. } => {
                self.state = busy;
                return Err(SessionError::SubmissionInFlight);
            }
        };
        self.state = SessionState::Submitting {
            image,
            target_format,
        };
        match &self.state {
            SessionState::Submitting { image, .. } => Ok(image),
            _ => Err(SessionError::NotSubmitting),
        }
    }

    /// Record the outcome of the in-flight request.
    pub fn finish(
        &mut self,
        outcome: Result<DetectionResult, OrchestrationError>,
    ) -> Result<(), SessionError> {
        let image = match std::mem::take(&mut self.state) {
            SessionState::Submitting { image, .. } => image,
            other => {
                self.state = other;
                return Err(SessionError::NotSubmitting);
            }
        };
        self.state = match outcome {
            Ok(result) => SessionState::Succeeded { image, result },
            Err(error) => SessionState::Failed { image, error },
        };
        Ok(())
    }

    /// Submit the selected image through `detector` and settle the session.
    /// The `&mut` borrow held across the await rules out a second
    /// concurrent submission on the same session.
    pub async fn submit(
        &mut self,
        detector: &Detector,
        target_format: TargetFormat,
    ) -> Result<&SessionState, SessionError> {
        let outcome = {
            let image = self.enter_submitting(target_format)?;
            detector.detect(image, target_format).await
        };
        self.finish(outcome)?;
        Ok(&self.state)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.is_busy() {
            Err(SessionError::SubmissionInFlight)
        } else {
            Ok(())
        }
    }
}
