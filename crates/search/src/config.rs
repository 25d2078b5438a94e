use serde::{Deserialize, Serialize};

/// Additive score boosts applied by reranking; the boosted score is capped at 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankBoosts {
    /// Candidate's `offence_number` equals the requested one
    pub offence_number: f32,

    /// Candidate's `jurisdiction` or `province` equals the requested one
    pub jurisdiction: f32,

    /// Candidate content is shorter than `concise_threshold_chars`
    pub concise: f32,

    pub concise_threshold_chars: usize,
}

impl Default for RerankBoosts {
    fn default() -> Self {
        Self {
            offence_number: 0.20,
            jurisdiction: 0.10,
            concise: 0.05,
            concise_threshold_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates fetched per requested result when filters are present
    pub overfetch_factor: usize,

    /// Candidate pool size for `search_with_reranking`
    pub rerank_pool_size: usize,

    pub boosts: RerankBoosts,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            rerank_pool_size: 20,
            boosts: RerankBoosts::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.overfetch_factor == 0 {
            return Err("overfetch_factor must be > 0".to_string());
        }
        if self.rerank_pool_size == 0 {
            return Err("rerank_pool_size must be > 0".to_string());
        }
        let b = &self.boosts;
        for (name, value) in [
            ("offence_number", b.offence_number),
            ("jurisdiction", b.jurisdiction),
            ("concise", b.concise),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("boost '{name}' must be a non-negative number"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = SearchConfig::default();
        assert_eq!(config.overfetch_factor, 3);
        assert_eq!(config.rerank_pool_size, 20);
        assert!((config.boosts.offence_number - 0.20).abs() < f32::EPSILON);
        assert_eq!(config.boosts.concise_threshold_chars, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"rerank_pool_size": 50, "boosts": {"concise": 0.0}}"#)
                .unwrap();
        assert_eq!(config.rerank_pool_size, 50);
        assert_eq!(config.overfetch_factor, 3);
        assert!((config.boosts.jurisdiction - 0.10).abs() < f32::EPSILON);
        assert!(config.boosts.concise.abs() < f32::EPSILON);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_pool = SearchConfig {
            rerank_pool_size: 0,
            ..SearchConfig::default()
        };
        assert!(zero_pool.validate().is_err());

        let mut negative = SearchConfig::default();
        negative.boosts.jurisdiction = -0.1;
        assert!(negative.validate().is_err());
    }
}
