//! Optional AI annotation pass - fail-soft enrichment.
//!
//! Runs after the deterministic core completes and only ever adds the
//! optional explanation/suggestion fields and the rewritten-function list.
//! It never mutates classification or cost fields.
//!
//! Every provider call is bounded by a timeout and a concurrency limit;
//! errors and timeouts leave the fields absent instead of aborting the
//! analysis, and command-level cancellation abandons in-flight calls
//! without touching the already-computed result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::warn;

use crate::config::CalibrationConfig;
use crate::error::DeadwattResult;
use crate::report::{AnalysisResult, RewrittenFunction};

/// Free-text insight for one unused function.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub explanation: String,
    pub suggestion: String,
}

/// External annotation collaborator.
///
/// Implementations wrap an LLM or any other insight source. The engine
/// treats them as black boxes: slow or failing providers degrade to
/// absent fields, nothing more.
#[async_trait]
pub trait AnnotationProvider: Send + Sync {
    /// Explain why `source` (one function's slice) may be dead and how to
    /// remove it safely.
    async fn annotate(&self, function_name: &str, source: &str) -> DeadwattResult<Annotation>;

    /// Optionally rewrite an expensive function. Default: no rewrite.
    async fn rewrite(
        &self,
        _function_name: &str,
        _source: &str,
    ) -> DeadwattResult<Option<String>> {
        Ok(None)
    }
}

/// Limits for one enrichment run.
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Per-call deadline.
    pub timeout: Duration,
    /// Maximum in-flight provider calls.
    pub max_concurrency: usize,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_concurrency: 4,
        }
    }
}

/// Create a cancellation pair. Send `true` to abandon in-flight calls.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves when cancellation is requested; pends forever if the sender
/// is dropped without cancelling.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Enrich a result in place.
///
/// Unused functions receive explanation/suggestion; functions whose
/// `estimated_flops` exceed the calibrated threshold are offered for
/// rewriting. Per-record outcomes are independent.
pub async fn annotate_result(
    result: &mut AnalysisResult,
    source: &str,
    provider: Arc<dyn AnnotationProvider>,
    config: &CalibrationConfig,
    options: &AnnotateOptions,
    cancel: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut tasks: JoinSet<(usize, Option<Annotation>, Option<RewrittenFunction>)> =
        JoinSet::new();

    for (idx, record) in result.analyses.iter().enumerate() {
        let needs_annotation = record.is_unused;
        let needs_rewrite = record.estimated_flops > config.rewrite_flops_threshold;
        if !needs_annotation && !needs_rewrite {
            continue;
        }

        let slice = source
            .get(record.start_byte..record.end_byte)
            .unwrap_or_default()
            .to_string();
        let name = record.qualified_name.clone();
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let mut cancel = cancel.clone();
        let deadline = options.timeout;

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (idx, None, None),
            };

            let annotation = if needs_annotation {
                tokio::select! {
                    _ = wait_cancelled(&mut cancel) => None,
                    outcome = timeout(deadline, provider.annotate(&name, &slice)) => {
                        match outcome {
                            Ok(Ok(annotation)) => Some(annotation),
                            Ok(Err(e)) => {
                                warn!(function = %name, error = %e, "annotation failed");
                                None
                            }
                            Err(_) => {
                                warn!(function = %name, "annotation timed out");
                                None
                            }
                        }
                    }
                }
            } else {
                None
            };

            let rewritten = if needs_rewrite {
                tokio::select! {
                    _ = wait_cancelled(&mut cancel) => None,
                    outcome = timeout(deadline, provider.rewrite(&name, &slice)) => {
                        match outcome {
                            Ok(Ok(Some(improved))) => Some(RewrittenFunction {
                                name: name.clone(),
                                original: slice.clone(),
                                improved,
                            }),
                            Ok(Ok(None)) => None,
                            Ok(Err(e)) => {
                                warn!(function = %name, error = %e, "rewrite failed");
                                None
                            }
                            Err(_) => {
                                warn!(function = %name, "rewrite timed out");
                                None
                            }
                        }
                    }
                }
            } else {
                None
            };

            (idx, annotation, rewritten)
        });
    }

    let mut rewritten: Vec<(usize, RewrittenFunction)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let Ok((idx, annotation, rewrite)) = joined else {
            continue;
        };
        if let Some(annotation) = annotation {
            let record = &mut result.analyses[idx];
            record.ai_explanation = Some(annotation.explanation);
            record.ai_suggestion = Some(annotation.suggestion);
        }
        if let Some(rewrite) = rewrite {
            rewritten.push((idx, rewrite));
        }
    }

    if !rewritten.is_empty() {
        rewritten.sort_by_key(|(idx, _)| *idx);
        result.rewritten_functions =
            Some(rewritten.into_iter().map(|(_, r)| r).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{extract_usage, CallGraph};
    use crate::error::DeadwattError;
    use crate::estimate::estimate_function;
    use crate::parse::{extract_functions, parse_source};
    use crate::report::assemble;

    const SOURCE: &str = "\
def stale(n):
    t = 0
    for i in range(n):
        for j in range(n):
            t = t + i * j
    return t

def main():
    pass

main()
";

    fn analyzed() -> AnalysisResult {
        let config = CalibrationConfig::default();
        let unit = parse_source(1, "sample.py", SOURCE).unwrap();
        let decls = extract_functions(&unit);
        let usage = extract_usage(&unit, &decls);
        let graph = CallGraph::build(&decls, &usage, &config);
        let reachable = graph.compute_reachable();
        let estimates: Vec<_> = decls
            .iter()
            .map(|d| estimate_function(&unit, d, &config))
            .collect();
        assemble(&unit, &decls, &reachable, &estimates, &config)
    }

    struct EchoProvider;

    #[async_trait]
    impl AnnotationProvider for EchoProvider {
        async fn annotate(&self, name: &str, _source: &str) -> DeadwattResult<Annotation> {
            Ok(Annotation {
                explanation: format!("{name} is never invoked"),
                suggestion: "delete it".to_string(),
            })
        }

        async fn rewrite(&self, _name: &str, source: &str) -> DeadwattResult<Option<String>> {
            Ok(Some(format!("# tuned\n{source}")))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl AnnotationProvider for SlowProvider {
        async fn annotate(&self, name: &str, _source: &str) -> DeadwattResult<Annotation> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Annotation {
                explanation: name.to_string(),
                suggestion: String::new(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AnnotationProvider for FailingProvider {
        async fn annotate(&self, name: &str, _source: &str) -> DeadwattResult<Annotation> {
            Err(DeadwattError::annotation(name, "provider offline"))
        }
    }

    #[tokio::test]
    async fn test_annotates_unused_functions_only() {
        let mut result = analyzed();
        let (_tx, rx) = cancellation();
        annotate_result(
            &mut result,
            SOURCE,
            Arc::new(EchoProvider),
            &CalibrationConfig::default(),
            &AnnotateOptions::default(),
            rx,
        )
        .await;

        let stale = &result.analyses[0];
        assert!(stale.is_unused);
        assert_eq!(
            stale.ai_explanation.as_deref(),
            Some("stale is never invoked")
        );
        assert_eq!(stale.ai_suggestion.as_deref(), Some("delete it"));

        let main = &result.analyses[1];
        assert!(main.ai_explanation.is_none());
    }

    #[tokio::test]
    async fn test_rewrite_above_threshold() {
        let mut result = analyzed();
        assert!(result.analyses[0].estimated_flops > 50);
        let (_tx, rx) = cancellation();
        annotate_result(
            &mut result,
            SOURCE,
            Arc::new(EchoProvider),
            &CalibrationConfig::default(),
            &AnnotateOptions::default(),
            rx,
        )
        .await;

        let rewritten = result.rewritten_functions.expect("rewrite produced");
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].name, "stale");
        assert!(rewritten[0].improved.starts_with("# tuned"));
        assert!(rewritten[0].original.contains("def stale"));
    }

    #[tokio::test]
    async fn test_timeout_leaves_fields_absent() {
        let mut result = analyzed();
        let before = result.analyses.clone();
        let (_tx, rx) = cancellation();
        annotate_result(
            &mut result,
            SOURCE,
            Arc::new(SlowProvider),
            &CalibrationConfig::default(),
            &AnnotateOptions {
                timeout: Duration::from_millis(20),
                max_concurrency: 2,
            },
            rx,
        )
        .await;

        for (record, original) in result.analyses.iter().zip(&before) {
            assert!(record.ai_explanation.is_none());
            // Classification and cost fields are untouched
            assert_eq!(record.is_unused, original.is_unused);
            assert_eq!(record.estimated_flops, original.estimated_flops);
        }
    }

    #[tokio::test]
    async fn test_provider_error_is_soft() {
        let mut result = analyzed();
        let (_tx, rx) = cancellation();
        annotate_result(
            &mut result,
            SOURCE,
            Arc::new(FailingProvider),
            &CalibrationConfig::default(),
            &AnnotateOptions::default(),
            rx,
        )
        .await;

        assert!(result.analyses.iter().all(|r| r.ai_explanation.is_none()));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_calls() {
        let mut result = analyzed();
        let (tx, rx) = cancellation();
        tx.send(true).ok();
        annotate_result(
            &mut result,
            SOURCE,
            Arc::new(SlowProvider),
            &CalibrationConfig::default(),
            &AnnotateOptions::default(),
            rx,
        )
        .await;

        assert!(result.analyses.iter().all(|r| r.ai_explanation.is_none()));
        // The computed result survives cancellation intact
        assert!(result.analyses[0].is_unused);
    }
}
