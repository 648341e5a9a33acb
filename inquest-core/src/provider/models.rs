//! Model capability metadata.
//!
//! Maps model identifiers to the capability flags the engine routes on:
//! whether a model can run as a background job, and whether it can *only*
//! run that way (deep-research models).

/// Capability flags for a known model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// The model accepts the background flag.
    pub supports_background: bool,
    /// The model must run as a background job (deep-research models).
    pub background_only: bool,
}

impl ModelInfo {
    const STANDARD: ModelInfo = ModelInfo {
        supports_background: false,
        background_only: false,
    };
    const BACKGROUND_CAPABLE: ModelInfo = ModelInfo {
        supports_background: true,
        background_only: false,
    };
    const DEEP_RESEARCH: ModelInfo = ModelInfo {
        supports_background: true,
        background_only: true,
    };
}

/// Look up capability flags for a model id.
///
/// Matches by family prefix so dated snapshots ("o3-deep-research-2025-06-26")
/// resolve the same as the bare family name. Unknown models are treated as
/// standard synchronous models.
pub fn model_info(model: &str) -> ModelInfo {
    let model = model.trim().to_ascii_lowercase();

    if model.starts_with("o3-deep-research") || model.starts_with("o4-mini-deep-research") {
        return ModelInfo::DEEP_RESEARCH;
    }
    if model.starts_with("o3") || model.starts_with("o4-mini") || model.starts_with("gpt-5") {
        return ModelInfo::BACKGROUND_CAPABLE;
    }
    ModelInfo::STANDARD
}

/// Whether the model is a background-only deep-research model.
pub fn is_deep_research(model: &str) -> bool {
    model_info(model).background_only
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_research_models() {
        assert!(is_deep_research("o3-deep-research"));
        assert!(is_deep_research("o4-mini-deep-research-2025-06-26"));
        assert!(model_info("o3-deep-research").supports_background);
    }

    #[test]
    fn test_background_capable_models() {
        let info = model_info("o3");
        assert!(info.supports_background);
        assert!(!info.background_only);
        assert!(model_info("gpt-5-mini").supports_background);
    }

    #[test]
    fn test_standard_models() {
        let info = model_info("gpt-4o");
        assert!(!info.supports_background);
        assert!(!info.background_only);
        assert!(!is_deep_research("gpt-4o-mini"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(is_deep_research("O3-Deep-Research"));
    }
}
