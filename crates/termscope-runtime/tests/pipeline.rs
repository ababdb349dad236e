//! End-to-end pipeline tests with scripted model providers and the in-memory
//! history store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use termscope_core::{
    headline_recommendation, Dimension, Document, EngineError, ErrorKind, RiskTolerance,
    SummarySource, UserProfile,
};
use termscope_runtime::{
    AnalysisPipeline, ChatMessage, CompletionConfig, CompletionResponse, EngineConfig,
    FallbackReason, LlmProvider, ProviderError, SourceSpec, TokenUsage,
};

const DATA_HEAVY: &str = "We collect your email address when you create an account.\n\
    We automatically collect your IP address and device identifiers.\n\
    We collect your precise location data when the app is open.";

const RISKY: &str = "We collect your email address, phone number and contacts when you sign up.\n\
    We may share your personal information with advertising partners and data brokers.\n\
    We may terminate your account at any time without notice for any reason.";

const FRIENDLY: &str = "You can request deletion of your personal data at any time.\n\
    You may opt out of marketing emails from your account settings.\n\
    You have the right to access and export a copy of your data.";

const MODEL_REPLY: &str = r#"Here is the analysis:
```json
{
  "summary": "The service collects account and device data.",
  "data_collection": ["Email address", "IP address and device identifiers"],
  "user_rights": [],
  "recommendations": ["Limit location permissions"]
}
```"#;

enum Behavior {
    Reply(&'static str),
    Hang,
    Fail,
}

struct ScriptedProvider {
    behavior: Behavior,
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Reply(content) => Ok(CompletionResponse {
                content: content.to_string(),
                usage: TokenUsage {
                    prompt_tokens: 300,
                    completion_tokens: 80,
                },
                model: config.model.clone(),
                stop_reason: Some("end_turn".into()),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Timeout(Duration::from_secs(3600)))
            }
            Behavior::Fail => Err(ProviderError::ApiError {
                status: 400,
                message: "bad request".into(),
            }),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn pipeline_with(provider: Arc<ScriptedProvider>) -> AnalysisPipeline {
    AnalysisPipeline::builder()
        .provider(provider)
        .build()
        .unwrap()
}

fn temp_file(name: &str, contents: &str) -> String {
    let path = std::env::temp_dir().join(format!(
        "termscope-pipeline-{}-{}",
        std::process::id(),
        name
    ));
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_data_clauses_without_rights_are_partial() {
    let pipeline = AnalysisPipeline::builder().build().unwrap();
    let outcome = pipeline
        .analyze(&Document::text("policy.txt", DATA_HEAVY), false)
        .await
        .unwrap();

    let record = &outcome.record;
    assert_eq!(record.clauses.len(), 3);
    assert!(record.scores.data_risk() > 5.0);
    assert_eq!(record.scores.user_rights_score(), 5.0);
    assert!(record.partial_signal);
    assert!(record.neutral_dimensions.contains(&Dimension::UserRights));
    assert_eq!(record.recommendations[0], headline_recommendation(record.risk_level));
}

#[tokio::test]
async fn test_model_summary_is_used_when_valid() {
    let provider = ScriptedProvider::new(Behavior::Reply(MODEL_REPLY));
    let pipeline = pipeline_with(provider.clone());

    let outcome = pipeline
        .analyze(&Document::text("policy.txt", DATA_HEAVY), false)
        .await
        .unwrap();

    let record = &outcome.record;
    assert_eq!(record.summary_source, SummarySource::Model);
    assert_eq!(record.summary, "The service collects account and device data.");
    assert_eq!(record.data_collection_findings.len(), 2);
    assert_eq!(record.recommendations[0], headline_recommendation(record.risk_level));
    assert!(record.recommendations.contains(&"Limit location permissions".to_string()));
    assert_eq!(outcome.fallback_reason, None);
    assert_eq!(outcome.llm_usage.llm_calls, 1);
    assert_eq!(outcome.llm_usage.total_tokens, 380);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout_falls_back() {
    let provider = ScriptedProvider::new(Behavior::Hang);
    let pipeline = pipeline_with(provider);

    let outcome = pipeline
        .analyze(&Document::text("policy.txt", RISKY), false)
        .await
        .unwrap();

    assert_eq!(outcome.record.summary_source, SummarySource::Fallback);
    assert!(!outcome.record.summary.is_empty());
    assert_eq!(outcome.fallback_reason, Some(FallbackReason::Timeout));
}

#[tokio::test]
async fn test_malformed_model_output_falls_back() {
    let provider = ScriptedProvider::new(Behavior::Reply("Sorry, I can't summarize legal documents."));
    let pipeline = pipeline_with(provider);

    let outcome = pipeline
        .analyze(&Document::text("policy.txt", RISKY), false)
        .await
        .unwrap();

    assert_eq!(outcome.record.summary_source, SummarySource::Fallback);
    assert!(!outcome.record.summary.is_empty());
    assert_eq!(outcome.fallback_reason, Some(FallbackReason::InvalidResponse));
}

#[tokio::test]
async fn test_scores_do_not_depend_on_the_model() {
    let with_model = pipeline_with(ScriptedProvider::new(Behavior::Reply(MODEL_REPLY)));
    let failing = pipeline_with(ScriptedProvider::new(Behavior::Fail));
    let doc = Document::text("policy.txt", RISKY);

    let a = with_model.analyze(&doc, false).await.unwrap();
    let b = failing.analyze(&doc, false).await.unwrap();

    assert_eq!(a.record.summary_source, SummarySource::Model);
    assert_eq!(b.record.summary_source, SummarySource::Fallback);
    assert_eq!(a.record.scores, b.record.scores);
    assert_eq!(a.record.content_fingerprint, b.record.content_fingerprint);
}

#[tokio::test]
async fn test_file_history_is_shared_across_pipelines() {
    let dir = std::env::temp_dir().join(format!("termscope-pipeline-{}-history", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut config = EngineConfig::default();
    config.history.path = Some(dir.clone());

    let doc = Document::text("policy.txt", DATA_HEAVY);
    let first = AnalysisPipeline::builder()
        .config(config.clone())
        .build()
        .unwrap()
        .analyze(&doc, false)
        .await
        .unwrap();
    assert!(!first.from_history);

    let later = AnalysisPipeline::builder().config(config).build().unwrap();
    let second = later.analyze(&doc, false).await.unwrap();
    assert!(second.from_history);
    assert_eq!(second.record.content_fingerprint, first.record.content_fingerprint);
    assert_eq!(second.record.risk_level, first.record.risk_level);

    let found = later
        .get_by_fingerprint(&first.record.content_fingerprint)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.provenance, first.record.provenance);
    assert_eq!(later.recent(10).await.unwrap().len(), 1);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_history_reuse_and_force_refresh() {
    let provider = ScriptedProvider::new(Behavior::Reply(MODEL_REPLY));
    let pipeline = pipeline_with(provider.clone());

    let first = pipeline
        .analyze(&Document::text("https://a.example/terms", DATA_HEAVY), false)
        .await
        .unwrap();
    // Same text under another reference hits the same fingerprint.
    let second = pipeline
        .analyze(&Document::text("https://b.example/terms", DATA_HEAVY), false)
        .await
        .unwrap();

    assert!(!first.from_history);
    assert!(second.from_history);
    assert_eq!(second.record, first.record);
    assert_eq!(second.llm_usage.llm_calls, 0);
    assert_eq!(provider.calls(), 1);

    let refreshed = pipeline
        .analyze(&Document::text("https://a.example/terms", DATA_HEAVY), true)
        .await
        .unwrap();
    assert!(!refreshed.from_history);
    assert_eq!(refreshed.record.scores, first.record.scores);
    assert_eq!(provider.calls(), 2);

    let recent = pipeline.recent(20).await.unwrap();
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_for_one_text_agree() {
    let pipeline = Arc::new(AnalysisPipeline::builder().build().unwrap());
    let doc = Document::text("policy.txt", RISKY);

    let (a, b) = tokio::join!(pipeline.analyze(&doc, false), pipeline.analyze(&doc, false));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.record.content_fingerprint, b.record.content_fingerprint);
    assert_eq!(a.record.scores, b.record.scores);
    assert_eq!(pipeline.recent(20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_document_is_terminal_and_not_stored() {
    let pipeline = AnalysisPipeline::builder().build().unwrap();
    let err = pipeline
        .analyze(&Document::text("blank.txt", "   \n\n  "), false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyDocumentError);
    assert!(pipeline.recent(20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_profile_view_leaves_record_untouched() {
    let pipeline = AnalysisPipeline::builder().build().unwrap();
    let outcome = pipeline
        .analyze(&Document::text("policy.txt", RISKY), false)
        .await
        .unwrap();
    let before = (*outcome.record).clone();

    let profile = UserProfile {
        risk_tolerance: RiskTolerance::Low,
        location: Some("DE".into()),
        ..UserProfile::default()
    };
    let view = pipeline.view(&outcome.record, &profile);

    assert_eq!(view.content_fingerprint, before.content_fingerprint);
    assert_eq!(view.base_scores, before.scores);
    assert_eq!(*outcome.record, before);
}

#[tokio::test]
async fn test_compare_sources_degrades_per_entry() {
    let risky = temp_file("risky.txt", RISKY);
    let friendly = temp_file("friendly.txt", FRIENDLY);
    let pipeline = AnalysisPipeline::builder().build().unwrap();

    let result = pipeline
        .compare_sources(
            vec![
                SourceSpec::labeled("Risky", termscope_core::SourceKind::Text, &risky),
                SourceSpec::labeled("Friendly", termscope_core::SourceKind::Text, &friendly),
                SourceSpec::labeled("Missing", termscope_core::SourceKind::Text, "/nonexistent/terms.txt"),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.entries.len(), 3);
    let missing = &result.entries[2];
    assert!(missing.is_failed());
    assert_eq!(missing.error.as_ref().unwrap().kind, ErrorKind::FetchError);

    let (r, f) = (&result.entries[0], &result.entries[1]);
    assert!(!r.is_failed() && !f.is_failed());
    assert!(r.scores.overall_risk() > f.scores.overall_risk());
    assert!(!result.insights.is_empty());

    std::fs::remove_file(risky).unwrap();
    std::fs::remove_file(friendly).unwrap();
}

#[tokio::test]
async fn test_compare_reports_requested_source_for_reused_records() {
    let first = temp_file("same-a.txt", RISKY);
    let second = temp_file("same-b.txt", RISKY);
    let other = temp_file("same-other.txt", FRIENDLY);
    let pipeline = AnalysisPipeline::builder().build().unwrap();

    pipeline
        .analyze_source(termscope_core::SourceKind::Text, &first, false)
        .await
        .unwrap();
    let result = pipeline
        .compare_sources(vec![SourceSpec::infer(&second), SourceSpec::infer(&other)], None)
        .await
        .unwrap();

    assert_eq!(result.entries[0].label, second);
    assert_eq!(result.entries[0].source_ref, second);
    assert_eq!(result.entries[1].source_ref, other);

    for path in [first, second, other] {
        std::fs::remove_file(path).unwrap();
    }
}

#[tokio::test]
async fn test_compare_needs_two_scored_sources() {
    let risky = temp_file("only.txt", RISKY);
    let pipeline = AnalysisPipeline::builder().build().unwrap();

    let err = pipeline
        .compare_sources(
            vec![
                SourceSpec::infer(&risky),
                SourceSpec::infer("/nonexistent/other.txt"),
            ],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInput { given: 1, required: 2 }));

    std::fs::remove_file(risky).unwrap();
}

#[test]
fn test_yaml_config_builds_pipeline() {
    let config = EngineConfig::from_yaml(
        "summarizer:\n  provider: none\n  timeout: 5s\nhistory:\n  ttl: 1h\n",
    )
    .unwrap();
    assert_eq!(config.summarizer.timeout, Duration::from_secs(5));
    assert!(AnalysisPipeline::builder().config(config).build().is_ok());
}
