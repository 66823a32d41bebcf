//! Processing outcomes and the downstream handoff descriptor.

use serde::{Deserialize, Serialize};

/// Result descriptor forwarded to the packaging service after a
/// successful run. This is the exact input the packager accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffDescriptor {
    pub job_ref: String,
    pub client_identification: String,
    pub bucket: String,
    /// Resolved prefix the frames were uploaded under
    pub frames_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
}

/// What a single task execution produced.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// Frames extracted and uploaded; descriptor ready for handoff
    Completed(HandoffDescriptor),
    /// Content moderation rejected the video; no frames were produced
    Rejected {
        job_ref: String,
        client_identification: String,
        reason: String,
    },
}

impl ProcessingOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ProcessingOutcome::Rejected { .. })
    }

    /// The handoff descriptor, when the run completed.
    pub fn descriptor(&self) -> Option<&HandoffDescriptor> {
        match self {
            ProcessingOutcome::Completed(desc) => Some(desc),
            ProcessingOutcome::Rejected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_outcome_has_no_descriptor() {
        let outcome = ProcessingOutcome::Rejected {
            job_ref: "c-1".to_string(),
            client_identification: "c".to_string(),
            reason: "Inappropriate content detected: Adult Content".to_string(),
        };
        assert!(outcome.is_rejected());
        assert!(outcome.descriptor().is_none());
    }
}
