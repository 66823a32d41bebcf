//! Moderation verdict types.

use serde::{Deserialize, Serialize};

/// An offending label found by the moderation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationLabel {
    pub name: String,
    pub confidence: f32,
    #[serde(default)]
    pub parent_name: String,
}

/// Appropriateness verdict for a stored video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// False when any label met the confidence threshold
    pub is_appropriate: bool,
    /// Highest confidence among offending labels
    pub confidence: f32,
    /// Offending labels at or above the threshold
    pub labels: Vec<ModerationLabel>,
    /// Remote moderation job id
    pub job_id: String,
}

impl ModerationVerdict {
    /// Automatic approval for media the scanner cannot analyze.
    pub fn pass_through(job_id: impl Into<String>) -> Self {
        Self {
            is_appropriate: true,
            confidence: 0.0,
            labels: Vec::new(),
            job_id: job_id.into(),
        }
    }

    /// Offending label names, for rejection reasons.
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_is_appropriate() {
        let verdict = ModerationVerdict::pass_through("job-1");
        assert!(verdict.is_appropriate);
        assert!(verdict.labels.is_empty());
    }

    #[test]
    fn test_label_names() {
        let verdict = ModerationVerdict {
            is_appropriate: false,
            confidence: 97.5,
            labels: vec![
                ModerationLabel {
                    name: "Explicit Nudity".to_string(),
                    confidence: 97.5,
                    parent_name: String::new(),
                },
                ModerationLabel {
                    name: "Adult Content".to_string(),
                    confidence: 88.0,
                    parent_name: String::new(),
                },
            ],
            job_id: "job-1".to_string(),
        };
        assert_eq!(verdict.label_names(), vec!["Explicit Nudity", "Adult Content"]);
    }
}
