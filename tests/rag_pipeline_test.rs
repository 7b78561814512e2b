// tests/rag_pipeline_test.rs - Knowledge base lifecycle and retrieval

mod common;

use common::setup;

#[tokio::test]
async fn test_nutrition_kb_build_is_idempotent() {
    let app = setup().await;
    let kb = &app.state.nutrition_kb;

    let first = kb.build(false).expect("first build");
    assert!(first > 0);

    // Second build leaves the populated collection alone
    let second = kb.build(false).expect("second build");
    assert_eq!(first, second);

    // Force rebuild produces the same row count again
    let rebuilt = kb.build(true).expect("force rebuild");
    assert_eq!(first, rebuilt);
    let after = kb.build(false).expect("build after rebuild");
    assert_eq!(first, after);
}

#[tokio::test]
async fn test_ensure_initialized_reports_truth() {
    let app = setup().await;
    let kb = &app.state.nutrition_kb;
    assert!(kb.ensure_initialized());
    assert!(kb.ensure_initialized());
    assert!(kb.stats().exists);
    assert!(kb.stats().row_count > 0);
}

#[tokio::test]
async fn test_nutrition_context_names_the_dish() {
    let app = setup().await;
    let context = app.state.nutrition_kb.get_nutrition_context("番茄炒蛋");
    assert!(context.contains("番茄炒蛋"), "context was: {context}");
    assert!(context.contains("中国食物成分表"));
    assert!(context.contains("每100g"));
}

#[tokio::test]
async fn test_nutrition_context_tolerates_unknown_dish() {
    let app = setup().await;
    // A tight distance threshold excludes everything for nonsense input
    let context = app
        .state
        .nutrition_kb
        .get_nutrition_context_with("zzzz unrelated query", 3, 0.01);
    assert!(context.is_empty());
}

#[tokio::test]
async fn test_recipe_graph_hidden_allergens() {
    let app = setup().await;
    let hidden = app.state.recipe_graph.get_hidden_allergens("宫保鸡丁");
    // The graph marks soy/wheat from seasoning as hidden for this dish
    assert!(
        hidden.iter().any(|h| h.code == "soy" || h.code == "wheat"),
        "hidden allergens: {hidden:?}"
    );
    for h in &hidden {
        assert_eq!(h.confidence, "medium");
    }
}

#[tokio::test]
async fn test_recipe_graph_context_aggregates_codes() {
    let app = setup().await;
    let context = app.state.recipe_graph.get_allergen_context("蛋炒饭", 3);
    assert!(!context.matched_recipes.is_empty());
    assert!(context.all_allergen_codes.iter().any(|c| c == "egg"));
}

#[tokio::test]
async fn test_exercise_kb_mets_lookup() {
    let app = setup().await;
    let lookup = app
        .state
        .exercise_kb
        .lookup_mets("跳绳")
        .expect("jumping rope is in the knowledge base");
    assert_eq!(lookup.mets, 11.0);
}

#[tokio::test]
async fn test_all_three_collections_coexist() {
    let app = setup().await;
    assert!(app.state.nutrition_kb.ensure_initialized());
    assert!(app.state.recipe_graph.ensure_initialized());
    assert!(app.state.exercise_kb.ensure_initialized());

    assert!(app.state.nutrition_kb.stats().row_count > 0);
    assert!(app.state.recipe_graph.stats().row_count > 0);
    assert!(app.state.exercise_kb.stats().row_count > 0);
}
