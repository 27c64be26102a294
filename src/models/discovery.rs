//! Candidate discovery: a heuristic string filter over hub search results,
//! never a guarantee of actual parameter count.

use crate::config::schema::FilterConfig;
use crate::hub::ModelHub;

/// True when the case-folded identifier contains at least one small-size
/// keyword and none of the large-size keywords
#[must_use]
pub fn qualifies(model_id: &str, filter: &FilterConfig) -> bool {
    let lower = model_id.to_lowercase();
    filter.include_keywords.iter().any(|k| lower.contains(k.as_str()))
        && !filter.exclude_keywords.iter().any(|k| lower.contains(k.as_str()))
}

/// Produce up to `limit` candidate identifiers, most downloaded first.
///
/// Scans `scan_limit` hub results for qualifying identifiers, then appends
/// the configured fallback list (deduplicated) so the result is never
/// empty. A failing hub query degrades to the fallback list alone;
/// discovery itself never fails.
pub async fn list_candidates(
    hub: &dyn ModelHub,
    filter: &FilterConfig,
    scan_limit: usize,
    limit: usize,
) -> Vec<String> {
    let mut candidates = match hub.search_models(scan_limit).await {
        Ok(models) => {
            let mut matches = Vec::new();
            for model in models {
                if qualifies(&model.id, filter) {
                    matches.push(model.id);
                    if matches.len() >= limit {
                        break;
                    }
                }
            }
            matches
        }
        Err(e) => {
            tracing::warn!("Hub query failed, using fallback list: {e}");
            return filter.fallback_models.iter().take(limit).cloned().collect();
        }
    };

    for fallback in &filter.fallback_models {
        if !candidates.contains(fallback) {
            candidates.push(fallback.clone());
        }
    }
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfabError, Result};
    use crate::hub::{HubModel, ProgressFn};
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeHub {
        models: Option<Vec<&'static str>>,
    }

    #[async_trait]
    impl ModelHub for FakeHub {
        async fn search_models(&self, limit: usize) -> Result<Vec<HubModel>> {
            match &self.models {
                Some(ids) => Ok(ids
                    .iter()
                    .take(limit)
                    .enumerate()
                    .map(|(i, id)| HubModel {
                        id: (*id).to_string(),
                        downloads: 1000 - i as u64,
                    })
                    .collect()),
                None => Err(ConfabError::Discovery("hub unreachable".into())),
            }
        }

        async fn list_files(&self, _model_id: &str) -> Result<Vec<String>> {
            unimplemented!("not used by discovery")
        }

        async fn download_file(
            &self,
            _model_id: &str,
            _filename: &str,
            _dest: &Path,
            _progress: ProgressFn<'_>,
        ) -> Result<()> {
            unimplemented!("not used by discovery")
        }
    }

    fn filter_with_fallback(fallback: &[&str]) -> FilterConfig {
        FilterConfig {
            fallback_models: fallback.iter().map(ToString::to_string).collect(),
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_qualifies_include_and_exclude() {
        let filter = FilterConfig::default();
        assert!(qualifies("TinyLlama/TinyLlama-1.1B-Chat-v1.0", &filter));
        assert!(qualifies("Qwen/Qwen2.5-3B-Instruct-GGUF", &filter));
        // matches "instruct" but also the 8b exclude keyword
        assert!(!qualifies("meta-llama/Llama-3.1-8B-Instruct", &filter));
        // no include keyword at all
        assert!(!qualifies("org/bert-base-uncased", &filter));
    }

    #[test]
    fn test_qualifies_is_case_folded() {
        let filter = FilterConfig::default();
        assert!(qualifies("ORG/TINY-MODEL", &filter));
        assert!(!qualifies("ORG/HUGE-70B", &filter));
    }

    #[tokio::test]
    async fn test_hub_failure_returns_fallback_truncated() {
        let hub = FakeHub { models: None };
        let filter = filter_with_fallback(&["org/a", "org/b", "org/c"]);

        let result = list_candidates(&hub, &filter, 50, 2).await;
        assert_eq!(result, vec!["org/a".to_string(), "org/b".to_string()]);
    }

    #[tokio::test]
    async fn test_matches_come_before_fallback_dedup() {
        let hub = FakeHub {
            models: Some(vec!["org/tiny-chat", "org/mega-70b", "org/a"]),
        };
        let filter = filter_with_fallback(&["org/a", "org/b"]);

        // org/a has no include keyword, so it only arrives via the fallback
        let result = list_candidates(&hub, &filter, 50, 10).await;
        assert_eq!(
            result,
            vec![
                "org/tiny-chat".to_string(),
                "org/a".to_string(),
                "org/b".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_stops_at_limit() {
        let hub = FakeHub {
            models: Some(vec![
                "org/tiny-1",
                "org/tiny-2",
                "org/tiny-3",
                "org/tiny-4",
            ]),
        };
        let filter = filter_with_fallback(&[]);

        let result = list_candidates(&hub, &filter, 50, 2).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], "org/tiny-1");
        assert_eq!(result[1], "org/tiny-2");
    }

    #[tokio::test]
    async fn test_result_never_empty_with_fallback() {
        let hub = FakeHub {
            models: Some(vec!["org/nothing-matches-70b"]),
        };
        let filter = filter_with_fallback(&["org/known-small"]);

        let result = list_candidates(&hub, &filter, 50, 5).await;
        assert_eq!(result, vec!["org/known-small".to_string()]);
    }
}
