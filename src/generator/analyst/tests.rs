use super::*;
use crate::error::ResearchError;
use crate::generator::graph::{GraphExecutor, RunStatus};
use crate::testing::{CallKind, ScriptedModel, TestServices, test_config};

fn named(name: &str) -> Analyst {
    Analyst::new(name, "Role", "Org", "Focus")
}

#[tokio::test]
async fn test_create_analysts_renders_prompt_and_decodes() {
    let services = TestServices::default();
    let ctx = services.context(test_config("Cats", 3));

    let analysts = create_analysts(&ctx, "Cats", 3, Some("add a historian"))
        .await
        .unwrap();
    assert_eq!(analysts.len(), 3);

    let calls = services.llm.calls_of(CallKind::Perspectives);
    assert_eq!(calls.len(), 1);
    assert!(calls[0].system_prompt.contains("Cats"));
    assert!(calls[0].system_prompt.contains("add a historian"));
    assert!(calls[0].system_prompt.contains("Pick the top 3 themes."));
    assert_eq!(calls[0].messages, vec![Message::human(ANALYST_REQUEST)]);
}

#[tokio::test]
async fn test_create_analysts_keeps_model_cardinality() {
    let model = ScriptedModel::new()
        .with_analyst_batches(vec![vec![named("A"), named("B"), named("C"), named("D")]]);
    let services = TestServices::new(model);
    let ctx = services.context(test_config("Cats", 2));

    let analysts = create_analysts(&ctx, "Cats", 2, None).await.unwrap();
    assert_eq!(analysts.len(), 4);
}

#[tokio::test]
async fn test_create_analysts_surfaces_decoding_failure() {
    let services = TestServices::new(ScriptedModel::new().failing_on(CallKind::Perspectives));
    let ctx = services.context(test_config("Cats", 2));
    assert!(create_analysts(&ctx, "Cats", 2, None).await.is_err());
}

#[test]
fn test_generation_router() {
    let mut state = GenerationState::new("Cats", 2);
    assert_eq!(
        should_continue_analyst_generation(&state),
        GenerationRoute::End
    );

    state.human_analyst_feedback = Some(String::new());
    assert_eq!(
        should_continue_analyst_generation(&state),
        GenerationRoute::End
    );

    state.human_analyst_feedback = Some("approve".to_string());
    assert_eq!(
        should_continue_analyst_generation(&state),
        GenerationRoute::CreateAnalysts
    );
}

#[tokio::test]
async fn test_generation_graph_pauses_then_regenerates_on_feedback() {
    let model = ScriptedModel::new().with_analyst_batches(vec![
        vec![named("First")],
        vec![named("Second")],
    ]);
    let services = TestServices::new(model);
    let executor = GraphExecutor::new(
        AnalystGenerationGraph,
        services.context(test_config("Cats", 1)),
    );

    let outcome = executor
        .invoke("1", GenerationState::new("Cats", 1))
        .await
        .unwrap();
    assert_eq!(
        outcome.status,
        RunStatus::Interrupted {
            before: GenerationStep::HumanFeedback
        }
    );
    assert_eq!(executor.get_state("1").await.unwrap().state.analysts[0].name, "First");

    executor
        .update_state("1", |s| {
            s.human_analyst_feedback = Some("more diverse please".to_string())
        })
        .await
        .unwrap();
    let outcome = executor.resume("1").await.unwrap();
    assert!(outcome.is_interrupted());

    let checkpoint = executor.get_state("1").await.unwrap();
    assert_eq!(checkpoint.state.analysts[0].name, "Second");
    let calls = services.llm.calls_of(CallKind::Perspectives);
    assert!(calls[1].system_prompt.contains("more diverse please"));

    executor
        .update_state("1", |s| s.human_analyst_feedback = None)
        .await
        .unwrap();
    let outcome = executor.resume("1").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(services.llm.count(CallKind::Perspectives), 2);
}

#[tokio::test]
async fn test_generation_graph_missing_thread() {
    let services = TestServices::default();
    let executor = GraphExecutor::new(
        AnalystGenerationGraph,
        services.context(test_config("Cats", 1)),
    );
    let err = executor.resume("nope").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResearchError>(),
        Some(ResearchError::Checkpoint(_))
    ));
}
