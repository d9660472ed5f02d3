use research_panel_rs::generator::graph::{GraphExecutor, RunStatus};
use research_panel_rs::generator::research::{ResearchGraph, ResearchStep};
use research_panel_rs::generator::state::ResearchState;
use research_panel_rs::generator::workflow::run_research;
use research_panel_rs::generator::{analyst::AnalystGenerationGraph, outlet};
use research_panel_rs::testing::{CallKind, ScriptedModel, TestServices, persistent_config, test_config};
use research_panel_rs::types::{Analyst, Message};
use std::collections::VecDeque;
use tempfile::TempDir;

fn sample_analyst() -> Analyst {
    Analyst::new(
        "Dr. Test Analyst",
        "AI Research Specialist",
        "Tech University",
        "Expert in analyzing AI trends and patterns",
    )
}

#[tokio::test]
async fn test_end_to_end_single_analyst_report() {
    let temp_dir = TempDir::new().unwrap();
    let services =
        TestServices::new(ScriptedModel::new().with_analyst_batches(vec![vec![sample_analyst()]]));
    let config = persistent_config("Test Topic", 1, temp_dir.path());
    let output_path = config.output_path.clone();
    let context = services.context(config);

    let state = run_research(&context, "test_1", &mut VecDeque::<String>::new())
        .await
        .unwrap();

    // Exactly one analyst and one interview.
    assert_eq!(state.analysts, vec![sample_analyst()]);
    assert_eq!(state.sections().len(), 1);
    assert_eq!(services.llm.count(CallKind::Section), 1);

    // The interview was seeded with the topic opener.
    let first_question = &services.llm.calls_of(CallKind::Question)[0];
    assert_eq!(
        first_question.messages,
        vec![Message::human(
            "So you said you were writing an article on Test Topic?"
        )]
    );
    assert!(first_question.system_prompt.contains("Dr. Test Analyst"));

    // intro --- body --- conclusion, with sources appended.
    let report = state.final_report.clone().unwrap();
    assert!(!report.is_empty());
    let parts: Vec<&str> = report.split("\n\n---\n\n").collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].contains("## Introduction"));
    assert!(parts[1].starts_with("Combined insights"));
    assert!(parts[2].starts_with("## Conclusion"));
    assert!(parts[2].contains("\n\n## Sources\n"));

    let written = outlet::save(&output_path, &state).await.unwrap();
    assert_eq!(std::fs::read_to_string(written).unwrap(), report);
}

#[tokio::test]
async fn test_checkpoint_resume_across_executors() {
    let temp_dir = TempDir::new().unwrap();
    let config = persistent_config("Test Topic", 2, temp_dir.path());

    // First process: run until the feedback pause.
    {
        let services = TestServices::default();
        let executor = GraphExecutor::new(ResearchGraph, services.context(config.clone()));
        let outcome = executor
            .invoke("resume_me", ResearchState::new("Test Topic", 2))
            .await
            .unwrap();
        assert_eq!(
            outcome.status,
            RunStatus::Interrupted {
                before: ResearchStep::HumanFeedback
            }
        );
    }

    // Second process: load the snapshot from disk and finish.
    let services = TestServices::default();
    let executor = GraphExecutor::new(ResearchGraph, services.context(config));
    executor
        .update_state("resume_me", |state| {
            state.human_analyst_feedback = Some(String::new())
        })
        .await
        .unwrap();
    let outcome = executor.resume("resume_me").await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(services.llm.count(CallKind::Perspectives), 0);
    assert_eq!(services.llm.count(CallKind::Section), 2);
    let checkpoint = executor.get_state("resume_me").await.unwrap();
    assert!(checkpoint.is_complete());
    assert!(checkpoint.state.final_report.is_some());
}

#[tokio::test]
async fn test_feedback_regenerates_analysts_before_interviews() {
    let services = TestServices::new(ScriptedModel::new().with_analyst_batches(vec![
        vec![Analyst::new("Old", "Role", "Org", "Focus")],
        vec![sample_analyst()],
    ]));
    let context = services.context(test_config("Test Topic", 1));
    let mut feedback: VecDeque<String> = vec!["Add someone from academia".to_string()].into();

    let state = run_research(&context, "feedback", &mut feedback)
        .await
        .unwrap();

    assert_eq!(state.analysts, vec![sample_analyst()]);
    let questions = services.llm.calls_of(CallKind::Question);
    assert!(
        questions
            .iter()
            .all(|call| call.system_prompt.contains("Dr. Test Analyst"))
    );
}

#[tokio::test]
async fn test_analyst_generation_graph_alone() {
    let services = TestServices::new(ScriptedModel::new().with_analyst_batches(vec![vec![sample_analyst()]]));
    let executor = GraphExecutor::new(
        AnalystGenerationGraph,
        services.context(test_config("Test Topic", 1)),
    );

    let outcome = executor
        .invoke(
            "test_1",
            research_panel_rs::generator::state::GenerationState::new("Test Topic", 1),
        )
        .await
        .unwrap();
    assert!(outcome.is_interrupted());
    executor.resume("test_1").await.unwrap();

    let checkpoint = executor.get_state("test_1").await.unwrap();
    assert!(checkpoint.is_complete());
    assert_eq!(checkpoint.state.analysts, vec![sample_analyst()]);
}

#[tokio::test]
async fn test_unknown_thread_has_no_state() {
    let services = TestServices::default();
    let executor = GraphExecutor::new(ResearchGraph, services.context(test_config("x", 1)));
    assert!(executor.get_state("test_persist").await.is_err());
}
