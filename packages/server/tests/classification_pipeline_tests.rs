//! Classification pipeline tests against the mock classifier, focused on
//! the interaction between the AI judgment and the fallback ladder.

use server_core::common::EngagementError;
use server_core::domains::classification::{classify, ClassificationAction};
use server_core::domains::sprints::ResponseMethod;
use server_core::kernel::test_dependencies::MockClassifierService;
use server_core::kernel::BaseClassifierService;

#[tokio::test]
async fn middling_ai_confidence_routes_to_clarify() {
    let classifier = MockClassifierService::new().with_judgment(2, 0.70);

    let outcome = classify("it was sort of there all morning", &classifier)
        .await
        .expect("must classify");

    assert_eq!(outcome.level, 2);
    assert_eq!(outcome.method, ResponseMethod::AiParsed);
    assert_eq!(outcome.action, ClassificationAction::Clarify);
}

#[tokio::test]
async fn low_ai_confidence_routes_to_reprompt() {
    let classifier = MockClassifierService::new().with_judgment(3, 0.40);

    let outcome = classify("hmm", &classifier).await.expect("must classify");

    assert_eq!(outcome.action, ClassificationAction::Reprompt);
}

#[tokio::test]
async fn classifier_is_attempted_before_falling_back() {
    let classifier = MockClassifierService::unavailable();

    let outcome = classify("pushed through today", &classifier)
        .await
        .expect("fallback must match");

    assert_eq!(outcome.level, 3);
    assert_eq!(outcome.method, ResponseMethod::RegexFallback);
    assert_eq!(classifier.classify_calls().len(), 1);
}

#[tokio::test]
async fn classifier_outage_surfaces_as_a_transient_error() {
    let classifier = MockClassifierService::unavailable();

    let err = classifier.classify("anything").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<EngagementError>(),
        Some(EngagementError::Transient(_))
    ));
}

#[tokio::test]
async fn out_of_range_ai_level_falls_through_to_fallback() {
    let classifier = MockClassifierService::new().with_judgment(7, 0.99);

    let outcome = classify("couldn't get out of bed", &classifier)
        .await
        .expect("fallback must match");

    assert_eq!(outcome.level, 5);
    assert_eq!(outcome.method, ResponseMethod::RegexFallback);
}

#[tokio::test]
async fn ai_judgment_beats_a_would_be_fallback_match() {
    // "took some advil" would match the medication pattern at 0.70, but a
    // healthy classifier answers first with its own confidence.
    let classifier = MockClassifierService::new().with_judgment(3, 0.88);

    let outcome = classify("took some advil at lunch", &classifier)
        .await
        .expect("must classify");

    assert_eq!(outcome.method, ResponseMethod::AiParsed);
    assert_eq!(outcome.action, ClassificationAction::Accept);
}
