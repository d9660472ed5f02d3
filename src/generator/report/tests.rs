use super::*;
use crate::testing::{CallKind, ScriptedModel, TestServices, test_config};
use crate::types::Analyst;

fn analysts(n: usize) -> Vec<Analyst> {
    (1..=n)
        .map(|i| Analyst::new(format!("Analyst {}", i), "Role", "Org", format!("Focus {}", i)))
        .collect()
}

#[test]
fn test_finalize_removes_insights_prefix_and_splits_sources() {
    let report = finalize_report(
        "# Title\n## Introduction\nIntro",
        "## Insights\nBody text [1]\n## Sources\n[1] https://a.example",
        "## Conclusion\nDone",
    );
    assert_eq!(
        report,
        "# Title\n## Introduction\nIntro\n\n---\n\nBody text [1]\n\n---\n\n## Conclusion\nDone\n\n## Sources\n[1] https://a.example"
    );
}

#[test]
fn test_finalize_without_sources_keeps_body() {
    let report = finalize_report("Intro", "Plain body", "Outro");
    assert_eq!(report, "Intro\n\n---\n\nPlain body\n\n---\n\nOutro");
}

#[test]
fn test_finalize_keeps_sources_when_insights_header_is_followed_by_sources() {
    // An empty body: the header newline doubles as the start of the sources delimiter.
    let report = finalize_report("I", "## Insights\n## Sources\n[1] a", "C");
    assert_eq!(report, "I\n\n---\n\n\n\n---\n\nC\n\n## Sources\n[1] a");
}

#[test]
fn test_finalize_with_two_sources_headers_treats_sources_as_absent() {
    let content = "Body\n## Sources\nfirst\n## Sources\nsecond";
    let report = finalize_report("I", content, "C");
    assert_eq!(report, format!("I\n\n---\n\n{}\n\n---\n\nC", content));
}

#[test]
fn test_finalize_only_removes_exact_prefix() {
    // Characters of the header appearing elsewhere are left alone.
    let report = finalize_report("I", "Insights about cats ##", "C");
    assert_eq!(report, "I\n\n---\n\nInsights about cats ##\n\n---\n\nC");

    let report = finalize_report("I", "Body ends with ## Insights", "C");
    assert!(report.contains("Body ends with ## Insights"));
}

#[test]
fn test_finalize_with_empty_parts() {
    assert_eq!(finalize_report("", "", ""), "\n\n---\n\n\n\n---\n\n");
}

#[test]
fn test_format_sections_joins_with_blank_line() {
    let sections = vec!["## A".to_string(), "## B".to_string()];
    assert_eq!(format_sections(&sections), "## A\n\n## B");
    assert_eq!(format_sections(&[]), "");
}

#[test]
fn test_initiate_all_interviews_seeds_one_per_analyst() {
    let mut state = ResearchState::new("Test Topic", 2);
    state.analysts = analysts(2);

    let ResearchRoute::ConductInterviews(seeds) = initiate_all_interviews(&state) else {
        panic!("expected interviews to be dispatched");
    };
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[0].analyst.name, "Analyst 1");
    assert_eq!(seeds[1].analyst.name, "Analyst 2");
    for seed in &seeds {
        assert_eq!(
            seed.messages,
            vec![Message::human(
                "So you said you were writing an article on Test Topic?"
            )]
        );
    }
}

#[test]
fn test_feedback_takes_precedence_over_dispatch() {
    let mut state = ResearchState::new("Test Topic", 2);
    state.analysts = analysts(2);
    state.human_analyst_feedback = Some("approve".to_string());
    assert_eq!(initiate_all_interviews(&state), ResearchRoute::CreateAnalysts);
}

#[test]
fn test_no_analysts_dispatches_nothing() {
    let state = ResearchState::new("Test Topic", 2);
    assert_eq!(
        initiate_all_interviews(&state),
        ResearchRoute::ConductInterviews(Vec::new())
    );
}

#[tokio::test]
async fn test_conduct_interviews_returns_one_section_per_seed() {
    let services = TestServices::default();
    let mut config = test_config("Cats", 3);
    config.llm.max_parallels = 2;
    let ctx = services.context(config);

    let mut state = ResearchState::new("Cats", 3);
    state.analysts = analysts(3);
    let ResearchRoute::ConductInterviews(seeds) = initiate_all_interviews(&state) else {
        panic!("expected interviews to be dispatched");
    };

    let sections = conduct_interviews(&ctx, seeds).await.unwrap();
    assert_eq!(sections.len(), 3);
    assert_eq!(services.llm.count(CallKind::Section), 3);
}

#[tokio::test]
async fn test_conduct_interviews_fails_when_any_interview_fails() {
    let services = TestServices::new(ScriptedModel::new().failing_on(CallKind::Section));
    let ctx = services.context(test_config("Cats", 2));
    let seeds = analysts(2)
        .into_iter()
        .map(|analyst| InterviewSeed {
            analyst,
            messages: vec![opening_message("Cats")],
        })
        .collect();

    assert!(conduct_interviews(&ctx, seeds).await.is_err());
}

#[tokio::test]
async fn test_report_parts_use_distinct_prompts() {
    let services = TestServices::default();
    let ctx = services.context(test_config("Cats", 1));
    let sections = vec!["## S1".to_string(), "## S2".to_string()];

    let (content, intro, conclusion) = tokio::try_join!(
        write_report(&ctx, "Cats", &sections),
        write_introduction(&ctx, "Cats", &sections),
        write_conclusion(&ctx, "Cats", &sections)
    )
    .unwrap();

    assert!(content.starts_with("## Insights"));
    assert!(intro.contains("## Introduction"));
    assert!(conclusion.contains("## Conclusion"));

    let report_call = &services.llm.calls_of(CallKind::Report)[0];
    assert!(report_call.system_prompt.contains("## S1\n\n## S2"));
    let intro_call = &services.llm.calls_of(CallKind::Introduction)[0];
    assert_eq!(intro_call.messages[0].content(), "Write the report introduction");
    let conclusion_call = &services.llm.calls_of(CallKind::Conclusion)[0];
    assert_eq!(
        conclusion_call.messages[0].content(),
        "Write the report conclusion"
    );
}
