pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::bookmarks::handlers as bookmarks;
use crate::comments::handlers as comments;
use crate::papers::handlers as papers;
use crate::state::AppState;
use crate::votes::handlers as votes;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Papers
        .route(
            "/api/v1/papers",
            post(papers::handle_add_paper).get(papers::handle_list_papers),
        )
        .route("/api/v1/papers/:paper_id", get(papers::handle_get_paper))
        // Discussion threads
        .route(
            "/api/v1/papers/:paper_id/comments",
            get(comments::handle_get_thread).post(comments::handle_add_comment),
        )
        .route("/api/v1/comments/:comment_id/vote", post(votes::handle_vote))
        // Bookmarks
        .route(
            "/api/v1/users/:user_id/bookmarks",
            get(bookmarks::handle_list_bookmarks).post(bookmarks::handle_add_bookmark),
        )
        .route(
            "/api/v1/users/:user_id/bookmarks/:paper_id",
            delete(bookmarks::handle_remove_bookmark),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::papers::metadata::{MetadataBundle, MetadataError, MetadataSource};
    use crate::papers::resolver::MetadataSources;
    use crate::store::MemoryStore;

    struct StaticSource;

    #[async_trait]
    impl MetadataSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, identifier: &str) -> Result<MetadataBundle, MetadataError> {
            if identifier.starts_with("missing") {
                return Err(MetadataError::NotFound(identifier.to_string()));
            }
            Ok(MetadataBundle {
                title: format!("Paper {identifier}"),
                authors: "Grace Hopper".to_string(),
                abstract_text: "Compilers, mostly.".to_string(),
                published_date: None,
                journal: "Proceedings".to_string(),
            })
        }
    }

    fn app() -> Router {
        let source: Arc<dyn MetadataSource> = Arc::new(StaticSource);
        build_router(AppState {
            store: Arc::new(MemoryStore::new()),
            sources: MetadataSources {
                doi: source.clone(),
                arxiv: source,
            },
        })
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "ok");
    }

    #[tokio::test]
    async fn test_add_paper_created_then_existing() {
        let app = app();
        let req = json!({ "user_id": 1, "doi": "10.1000/abc" });

        let (status, first) = call(&app, Method::POST, "/api/v1/papers", Some(req.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["paper"]["title"], "Paper 10.1000/abc");
        assert_eq!(first["paper"]["abstract"], "Compilers, mostly.");

        let (status, second) = call(&app, Method::POST, "/api/v1/papers", Some(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["paper"]["id"], first["paper"]["id"]);

        let (status, listing) = call(&app, Method::GET, "/api/v1/papers?page=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["total"], 1);
    }

    #[tokio::test]
    async fn test_add_paper_validation_and_lookup_failure() {
        let app = app();

        let (status, body) =
            call(&app, Method::POST, "/api/v1/papers", Some(json!({ "user_id": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/papers",
            Some(json!({ "user_id": 1, "arxiv_id": "missing-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "ENRICHMENT_FAILED");
    }

    #[tokio::test]
    async fn test_comment_vote_and_thread() {
        let app = app();
        let (_, paper) = call(
            &app,
            Method::POST,
            "/api/v1/papers",
            Some(json!({ "user_id": 1, "arxiv_id": "1706.03762" })),
        )
        .await;
        let paper_id = paper["paper"]["id"].as_i64().unwrap();
        let comments_uri = format!("/api/v1/papers/{paper_id}/comments");

        let (status, root) = call(
            &app,
            Method::POST,
            &comments_uri,
            Some(json!({ "user_id": 2, "content": "Attention is all you need?" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let root_id = root["comment"]["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            &comments_uri,
            Some(json!({ "user_id": 3, "content": "Apparently.", "parent_id": root_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let vote_uri = format!("/api/v1/comments/{root_id}/vote");
        let (status, body) = call(
            &app,
            Method::POST,
            &vote_uri,
            Some(json!({ "user_id": 3, "vote_type": "sideways" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Vote type must be upvote or downvote");

        let (status, body) = call(
            &app,
            Method::POST,
            &vote_uri,
            Some(json!({ "user_id": 3, "vote_type": "upvote" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comment"]["upvotes"], 1);

        let (status, thread) = call(&app, Method::GET, &comments_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread[0]["id"], root_id);
        assert_eq!(thread[0]["replies"][0]["content"], "Apparently.");
    }

    #[tokio::test]
    async fn test_deep_reply_chain_is_served() {
        let app = app();
        let (_, paper) = call(
            &app,
            Method::POST,
            "/api/v1/papers",
            Some(json!({ "user_id": 1, "doi": "10.1000/deep" })),
        )
        .await;
        let paper_id = paper["paper"]["id"].as_i64().unwrap();
        let comments_uri = format!("/api/v1/papers/{paper_id}/comments");

        let mut parent_id: Option<i64> = None;
        for i in 0..3_000 {
            let reply = json!({
                "user_id": 2,
                "content": format!("level {i}"),
                "parent_id": parent_id
            });
            let (status, body) = call(&app, Method::POST, &comments_uri, Some(reply)).await;
            assert_eq!(status, StatusCode::CREATED);
            parent_id = body["comment"]["id"].as_i64();
        }

        // Nesting is far beyond serde_json's parse limit, so inspect raw bytes.
        let request = Request::builder()
            .uri(&comments_uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let levels = bytes.windows(11).filter(|w| *w == b"\"replies\":[").count();
        assert_eq!(levels, 3_000);
    }

    #[tokio::test]
    async fn test_vote_on_missing_comment_is_404() {
        let (status, _) = call(
            &app(),
            Method::POST,
            "/api/v1/comments/999/vote",
            Some(json!({ "user_id": 1, "vote_type": "downvote" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let app = app();
        let (_, paper) = call(
            &app,
            Method::POST,
            "/api/v1/papers",
            Some(json!({ "user_id": 1, "doi": "10.1000/bm" })),
        )
        .await;
        let paper_id = paper["paper"]["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/users/5/bookmarks",
            Some(json!({ "paper_id": paper_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/users/5/bookmarks",
            Some(json!({ "paper_id": paper_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, listed) = call(&app, Method::GET, "/api/v1/users/5/bookmarks", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["paper"]["doi"], "10.1000/bm");

        let uri = format!("/api/v1/users/5/bookmarks/{paper_id}");
        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
