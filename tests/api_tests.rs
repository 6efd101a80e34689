use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use promptforge::{
    api::{router, AppState},
    config::AppConfig,
    generate::PLACEHOLDER_IMAGE,
    learn::{Chapter, LearningPath},
    providers::{ImageProvider, MockModel, MockProvider, ProviderError},
    store::{MemoryStore, PathStore, StoredPath},
};

struct DownProvider;

#[async_trait::async_trait]
impl ImageProvider for DownProvider {
    fn name(&self) -> &'static str { "down" }
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Http("API request failed with status 503".into()))
    }
}

fn path_json(n: usize) -> String {
    let path = LearningPath {
        chapters: (1..=n)
            .map(|i| Chapter { title: format!("Chapter title {i}"), description: format!("One liner {i}") })
            .collect(),
    };
    serde_json::to_string(&path).unwrap()
}

struct Harness {
    server: TestServer,
    state: AppState,
    model: Arc<MockModel>,
    store: Arc<MemoryStore>,
}

fn harness_with(model: MockModel, images: Arc<dyn ImageProvider>) -> Harness {
    let model = Arc::new(model);
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(AppConfig::mock(), images, model.clone(), store.clone());
    let server = TestServer::new(router(state.clone())).expect("test server");
    Harness { server, state, model, store }
}

fn harness(model: MockModel) -> Harness {
    harness_with(model, Arc::new(MockProvider))
}

mod prompts {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let h = harness(MockModel::new());
        let res = h.server.get("/health").await;
        res.assert_status_ok();
        assert_eq!(res.json::<Value>()["status"], "ok");
    }

    #[tokio::test]
    async fn modifiers_catalog() {
        let h = harness(MockModel::new());
        let body: Value = h.server.get("/api/modifiers").await.json();
        assert_eq!(body["styles"][0]["value"], "none");
        assert_eq!(body["lighting"].as_array().unwrap().len(), 9);
        assert!(body["camera_angles"]
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["value"] == "dutch-angle"));
    }

    #[tokio::test]
    async fn compose_documented_example() {
        let h = harness(MockModel::new());
        let res = h
            .server
            .post("/api/prompt/compose")
            .json(&json!({ "basePrompt": "a cat", "style": "anime", "cameraAngle": "none", "lighting": "studio" }))
            .await;
        res.assert_status_ok();
        assert_eq!(
            res.json::<Value>()["prompt"],
            "a cat, anime style, manga art, vibrant colors, clean lines, studio lighting, professional setup, controlled environment"
        );
    }

    #[tokio::test]
    async fn random_prompt_is_from_the_list() {
        let h = harness(MockModel::new());
        let body: Value = h.server.get("/api/prompt/random").await.json();
        let prompt = body["prompt"].as_str().unwrap();
        assert!(promptforge::modifiers::RANDOM_PROMPTS.contains(&prompt));
    }

    #[tokio::test]
    async fn local_enhance_appends_phrases() {
        let h = harness(MockModel::new());
        let body: Value = h.server.post("/api/prompt/enhance").json(&json!({ "prompt": "a barn" })).await.json();
        let out = body["prompt"].as_str().unwrap();
        assert!(out.starts_with("a barn, "));

        let res = h.server.post("/api/prompt/enhance").json(&json!({ "prompt": "" })).await;
        res.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ai_enhance_uses_model() {
        let h = harness(MockModel::new().with_reply("A weathered red barn under a violet sky"));
        let body: Value = h
            .server
            .post("/api/prompt/enhance/ai")
            .json(&json!({ "prompt": "a barn" }))
            .await
            .json();
        assert_eq!(body["prompt"], "A weathered red barn under a violet sky");
        assert_eq!(h.model.calls(), 1);
    }
}

mod text {
    use super::*;

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_remote_call() {
        let h = harness(MockModel::new());
        let res = h.server.post("/api/generate/text").json(&json!({ "prompt": "" })).await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(res.text(), "Prompt is required");

        let res = h.server.post("/api/generate/text").json(&json!({})).await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn returns_plain_text() {
        let h = harness(MockModel::new().with_reply("## Hello 👋"));
        let res = h
            .server
            .post("/api/generate/text")
            .json(&json!({ "prompt": "greet me", "model": "gemini-2.0-flash" }))
            .await;
        res.assert_status_ok();
        assert_eq!(res.text(), "## Hello 👋");
    }

    #[tokio::test]
    async fn remote_failure_is_a_generic_500() {
        let h = harness(MockModel::new().with_failure(ProviderError::Fatal("quota".into())));
        let res = h.server.post("/api/generate/text").json(&json!({ "prompt": "hi" })).await;
        res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.text(), "Error generating text");
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected() {
        let h = harness(MockModel::new().with_reply("done"));
        let guard = h.state.in_flight().try_begin("text").unwrap();
        let res = h.server.post("/api/generate/text").json(&json!({ "prompt": "hi" })).await;
        res.assert_status(StatusCode::CONFLICT);
        assert_eq!(res.text(), "A request is already in progress");
        assert_eq!(h.model.calls(), 0);
        drop(guard);
        let res = h.server.post("/api/generate/text").json(&json!({ "prompt": "hi" })).await;
        res.assert_status_ok();
        assert_eq!(res.text(), "done");
    }
}

mod image {
    use super::*;

    #[tokio::test]
    async fn returns_data_uri_and_composed_prompt() {
        let h = harness(MockModel::new());
        let res = h
            .server
            .post("/api/generate/image")
            .json(&json!({ "prompt": "a fox", "lighting": "neon" }))
            .await;
        res.assert_status_ok();
        let body: Value = res.json();
        assert!(body["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(body["fallback"], false);
        assert_eq!(body["prompt"], "a fox, neon lighting, vibrant colors, urban night, cyberpunk aesthetic");
    }

    #[tokio::test]
    async fn provider_failure_yields_placeholder() {
        let h = harness_with(MockModel::new(), Arc::new(DownProvider));
        let body: Value = h
            .server
            .post("/api/generate/image")
            .json(&json!({ "basePrompt": "a fox" }))
            .await
            .json();
        assert_eq!(body["image"], PLACEHOLDER_IMAGE);
        assert_eq!(body["fallback"], true);
    }

    #[tokio::test]
    async fn blank_prompt_is_bad_request() {
        let h = harness(MockModel::new());
        let res = h.server.post("/api/generate/image").json(&json!({ "basePrompt": "  ", "style": "anime" })).await;
        res.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(res.json::<Value>()["code"], "bad_request");
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected() {
        let h = harness(MockModel::new());
        let guard = h.state.in_flight().try_begin("image").unwrap();
        let res = h.server.post("/api/generate/image").json(&json!({ "basePrompt": "a fox" })).await;
        res.assert_status(StatusCode::CONFLICT);
        assert_eq!(res.json::<Value>()["code"], "request_in_flight");
        drop(guard);
        h.server
            .post("/api/generate/image")
            .json(&json!({ "basePrompt": "a fox" }))
            .await
            .assert_status_ok();
    }
}

mod learning {
    use super::*;

    #[tokio::test]
    async fn generate_store_and_clear() {
        let h = harness(MockModel::new().with_reply(path_json(6)));

        h.server.get("/api/learn").await.assert_status(StatusCode::NOT_FOUND);

        let res = h.server.post("/api/learn").json(&json!({ "topic": "Astronomy" })).await;
        res.assert_status_ok();
        let body: Value = res.json();
        assert_eq!(body["topic"], "Astronomy");
        assert_eq!(body["chapters"].as_array().unwrap().len(), 6);

        let stored = h.store.get().await.unwrap().unwrap();
        assert_eq!(stored.path.chapters.len(), 6);

        let body: Value = h.server.get("/api/learn").await.json();
        assert_eq!(body["chapters"][0]["title"], "Chapter title 1");

        h.server.delete("/api/learn").await.assert_status(StatusCode::NO_CONTENT);
        h.server.get("/api/learn").await.assert_status(StatusCode::NOT_FOUND);
        assert!(h.store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_topic_overwrites_previous_path() {
        let h = harness(MockModel::new().with_reply(path_json(5)).with_reply(path_json(7)));
        h.server.post("/api/learn").json(&json!({ "topic": "Go" })).await.assert_status_ok();
        h.server.post("/api/learn").json(&json!({ "topic": "Chess" })).await.assert_status_ok();
        let stored = h.store.get().await.unwrap().unwrap();
        assert_eq!(stored.topic, "Chess");
        assert_eq!(stored.path.chapters.len(), 7);
    }

    #[tokio::test]
    async fn schema_violation_is_surfaced_and_nothing_is_stored() {
        let h = harness(MockModel::new().with_reply(r#"{"chapters":"not a list"}"#));
        let res = h.server.post("/api/learn").json(&json!({ "topic": "Go" })).await;
        res.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(res.json::<Value>()["code"], "schema_error");
        assert!(h.store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_topic_is_bad_request() {
        let h = harness(MockModel::new());
        h.server
            .post("/api/learn")
            .json(&json!({ "topic": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn chapter_content_for_stored_path() {
        let content = json!({
            "Theory": { "description": "## Orbits\n...", "resources": ["https://www.youtube.com/watch?v=orbit"] },
            "Assignments": [
                { "question": "What is an ellipse?", "answer": "A closed conic." },
                { "question": "Research Kepler's third law.", "answer": "Self-research." }
            ]
        });
        let h = harness(MockModel::new().with_reply(content.to_string()));
        h.store
            .set(StoredPath::new("Astronomy", serde_json::from_str(&path_json(5)).unwrap()))
            .await
            .unwrap();

        let res = h.server.get("/api/learn/chapters/2").await;
        res.assert_status_ok();
        let body: Value = res.json();
        assert_eq!(body["number"], 2);
        assert_eq!(body["total"], 5);
        assert_eq!(body["chapter"]["title"], "Chapter title 2");
        assert_eq!(body["content"]["Assignments"].as_array().unwrap().len(), 2);
        assert!(h.model.prompts()[0].contains("Chapter title 2"));
    }

    #[tokio::test]
    async fn chapter_without_path_or_out_of_range_is_not_found() {
        let h = harness(MockModel::new());
        h.server.get("/api/learn/chapters/1").await.assert_status(StatusCode::NOT_FOUND);

        h.store
            .set(StoredPath::new("Astronomy", serde_json::from_str(&path_json(5)).unwrap()))
            .await
            .unwrap();
        h.server.get("/api/learn/chapters/0").await.assert_status(StatusCode::NOT_FOUND);
        h.server.get("/api/learn/chapters/6").await.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(h.model.calls(), 0);
    }
}
