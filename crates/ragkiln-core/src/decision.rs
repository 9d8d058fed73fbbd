//! The merge-or-create decision produced by `MergeDecider`.

/// `Decide(topic, existingDocs) -> Decision`.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No candidate cleared the low threshold: build a new document.
    Create,
    /// A candidate cleared the high threshold, or the LLM verification
    /// arbitrated in favor of merging.
    Merge { target_doc_id: String },
    /// Internal state during the uncertain band, before LLM arbitration
    /// resolves it into `Merge` or `Create`. Not returned by the public
    /// `decide` entry point, but exposed so the orchestrator can report how
    /// many topics entered the verification path.
    Verify { target_doc_id: String },
}

impl Decision {
    pub fn is_create(&self) -> bool {
        matches!(self, Decision::Create)
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, Decision::Merge { .. })
    }

    pub fn target_doc_id(&self) -> Option<&str> {
        match self {
            Decision::Merge { target_doc_id } | Decision::Verify { target_doc_id } => {
                Some(target_doc_id)
            }
            Decision::Create => None,
        }
    }
}
