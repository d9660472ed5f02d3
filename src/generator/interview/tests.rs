use super::*;
use crate::testing::{
    CallKind, MockEncyclopedia, MockWebSearch, ScriptedModel, TestServices, test_config,
};
use std::sync::Arc;

fn analyst() -> Analyst {
    Analyst::new("Ada", "Historian", "Cat Museum", "History of internet cats")
}

fn seed(topic: &str) -> InterviewSeed {
    InterviewSeed {
        analyst: analyst(),
        messages: vec![Message::human(format!(
            "So you said you were writing an article on {}?",
            topic
        ))],
    }
}

#[test]
fn test_route_saves_when_turn_limit_reached() {
    let messages = vec![
        Message::human("start"),
        Message::ai("q1"),
        Message::expert("a1"),
        Message::ai("q2"),
        Message::expert("a2"),
    ];
    assert_eq!(
        route_messages(&messages, 2).unwrap(),
        InterviewRoute::SaveInterview
    );
    assert_eq!(
        route_messages(&messages, 3).unwrap(),
        InterviewRoute::AskQuestion
    );
}

#[test]
fn test_route_saves_on_closing_phrase() {
    let messages = vec![
        Message::human("start"),
        Message::ai("Great. Thank you so much for your help!"),
        Message::expert("You're welcome"),
    ];
    assert_eq!(
        route_messages(&messages, 5).unwrap(),
        InterviewRoute::SaveInterview
    );
}

#[test]
fn test_route_only_counts_expert_tagged_replies() {
    // Untagged AI messages are questions, not answers.
    let messages = vec![Message::ai("q1"), Message::ai("q2"), Message::ai("q3")];
    assert_eq!(
        route_messages(&messages, 2).unwrap(),
        InterviewRoute::AskQuestion
    );
}

#[test]
fn test_route_rejects_single_message_history() {
    let err = route_messages(&[Message::human("only one")], 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResearchError>(),
        Some(ResearchError::Precondition(_))
    ));
}

#[test]
fn test_route_with_limit_already_reached_ignores_length() {
    let messages = vec![Message::expert("a1")];
    assert_eq!(
        route_messages(&messages, 1).unwrap(),
        InterviewRoute::SaveInterview
    );
}

#[test]
fn test_save_interview_is_role_prefixed_transcript() {
    let messages = vec![Message::human("Hi"), Message::ai("Question?"), Message::expert("Answer.")];
    assert_eq!(
        save_interview(&messages),
        "Human: Hi\nAI: Question?\nAI: Answer."
    );
}

#[tokio::test]
async fn test_generate_answer_is_expert_tagged_and_sees_context() {
    let services = TestServices::default();
    let ctx = services.context(test_config("Cats", 1));
    let context = vec!["<Document href=\"u\"/>\nfact one\n</Document>".to_string()];

    let answer = generate_answer(&ctx, &analyst(), &[Message::ai("Why?")], &context)
        .await
        .unwrap();
    assert!(answer.is_from(EXPERT_NAME));

    let call = &services.llm.calls_of(CallKind::Answer)[0];
    assert!(call.system_prompt.contains("fact one"));
    assert!(call.system_prompt.contains("Name: Ada"));
}

#[tokio::test]
async fn test_search_steps_use_configured_caps() {
    let services = TestServices::default();
    let mut config = test_config("Cats", 1);
    config.search.web_max_results = 4;
    config.search.wikipedia_max_docs = 1;
    let ctx = services.context(config);
    let messages = vec![Message::human("start"), Message::ai("Why cats?")];

    let web = search_web(&ctx, &messages).await.unwrap();
    let wiki = search_wikipedia(&ctx, &messages).await.unwrap();

    assert_eq!(
        services.web.queries(),
        vec![("scripted search query".to_string(), 4)]
    );
    assert_eq!(
        services.encyclopedia.queries(),
        vec![("scripted search query".to_string(), 1)]
    );
    assert_eq!(web.matches("<Document").count(), 4);
    assert_eq!(wiki.matches("<Document").count(), 1);
    assert_eq!(services.llm.count(CallKind::SearchQuery), 2);
}

#[tokio::test]
async fn test_write_section_uses_focus_and_context() {
    let services = TestServices::default();
    let ctx = services.context(test_config("Cats", 1));
    let context = vec!["block a".to_string(), "block b".to_string()];

    let section = write_section(&ctx, &analyst(), &context).await.unwrap();
    assert!(section.starts_with("## "));

    let call = &services.llm.calls_of(CallKind::Section)[0];
    assert!(call.system_prompt.contains("History of internet cats"));
    assert_eq!(
        call.messages[0].content(),
        "Use this source to write your section: block a\n\nblock b"
    );
}

#[tokio::test]
async fn test_conduct_interview_runs_until_turn_limit() {
    let services = TestServices::default();
    let ctx = services.context(test_config("Cats", 1));

    let state = conduct_interview(&ctx, seed("Cats")).await.unwrap();

    // Two turns by default: each turn is question + answer.
    assert_eq!(state.messages.len(), 5);
    assert_eq!(
        state.messages.iter().filter(|m| m.is_from(EXPERT_NAME)).count(),
        2
    );
    // Each turn contributes one web block and one wikipedia block.
    assert_eq!(state.context().len(), 4);
    assert_eq!(state.sections().len(), 1);
    assert!(
        state
            .interview
            .as_deref()
            .unwrap()
            .starts_with("Human: So you said you were writing an article on Cats?")
    );
    assert_eq!(services.llm.count(CallKind::Question), 2);
    assert_eq!(services.llm.count(CallKind::Section), 1);
}

#[tokio::test]
async fn test_conduct_interview_stops_on_closing_phrase() {
    let services =
        TestServices::new(ScriptedModel::new().with_question("Thank you so much for your help!"));
    let mut config = test_config("Cats", 1);
    config.interview.max_num_turns = 5;
    let ctx = services.context(config);

    let state = conduct_interview(&ctx, seed("Cats")).await.unwrap();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(services.llm.count(CallKind::Question), 1);
}

#[tokio::test]
async fn test_search_failure_fails_the_interview() {
    let services = TestServices {
        llm: Arc::new(ScriptedModel::new()),
        web: Arc::new(MockWebSearch::failing()),
        encyclopedia: Arc::new(MockEncyclopedia::new()),
    };
    let ctx = services.context(test_config("Cats", 1));

    let err = conduct_interview(&ctx, seed("Cats")).await.unwrap_err();
    assert!(err.to_string().contains("Ada"));
    assert!(
        err.chain()
            .any(|cause| matches!(
                cause.downcast_ref::<ResearchError>(),
                Some(ResearchError::Provider { .. })
            ))
    );
    assert_eq!(services.llm.count(CallKind::Answer), 0);
}

#[test]
fn test_interview_graph_edges_include_both_search_branches() {
    let edges = InterviewGraph.edges();
    assert!(edges.contains(&Edge::direct("ask_question", "search_web")));
    assert!(edges.contains(&Edge::direct("ask_question", "search_wikipedia")));
    assert!(edges.contains(&Edge::conditional("answer_question", "save_interview")));
}
