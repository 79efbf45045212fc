use std::sync::Arc;
use std::time::Duration;

use goatdom::app::artifact::ArtifactOptions;
use goatdom::app::builder::TreeBuilder;
use goatdom::app::coordinator::BuildState;
use goatdom::app::session::AuthoringSession;
use goatdom::domain::errors::DomainError;
use goatdom::infra::client::ServiceClient;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(title: &str) -> serde_json::Value {
    json!({
        "root": {
            "id": 1,
            "tag_type": "html",
            "children": [
                { "id": 2, "raw": format!("<h1>{title}</h1>"), "tag_type": "h1", "has_data": true, "body": title },
                { "id": 3, "raw": "<a href=\"/next\">", "tag_type": "a", "html_attributes": { "href": "/next" } }
            ]
        }
    })
}

async fn mount_page(server: &MockServer, url: &str, title: &str) {
    Mock::given(method("POST"))
        .and(path("/api/dom-tree/build"))
        .and(body_json(json!({ "url": url })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(title)))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Arc<ServiceClient> {
    let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
    Arc::new(ServiceClient::new(base, Duration::from_secs(5), None).unwrap())
}

#[tokio::test]
async fn build_mark_export_import_and_scrape() {
    let server = MockServer::start().await;
    mount_page(&server, "https://shop.example", "Catalog").await;
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .and(body_json(json!({
            "url": "https://shop.example",
            "retrieval_instructions": [
                { "node_query": "nq_2", "output": { "location": "l1", "key": "heading" }, "flags": {} },
                { "node_query": "nq_3", "output": { "location": "l1", "key": "a" }, "flags": {} }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://shop.example",
            "data": [{ "heading": "Catalog" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut builder = TreeBuilder::spawn(client.clone(), Duration::from_millis(20));
    builder.set_url("https://shop.example").unwrap();
    let snapshot = builder.settled().await.unwrap();
    let tree = match snapshot.state {
        BuildState::Ready(tree) => tree,
        other => panic!("expected a tree, got {other:?}"),
    };

    let mut session = AuthoringSession::new();
    session.set_url("https://shop.example");
    session.attach_tree(tree);
    session.mark(2).unwrap();
    session.mark(3).unwrap();
    session.set_key(0, "heading").unwrap();
    assert!(session.key_warnings().is_empty());

    let text = session.export_artifact(ArtifactOptions::default()).unwrap();
    let mut restored = AuthoringSession::new();
    restored.import_artifact(&text).unwrap();
    assert_eq!(restored.instructions(), session.instructions());

    let dataset = client.scrape(&restored.scrape_request()).await.unwrap();
    assert_eq!(dataset["data"][0]["heading"], "Catalog");

    builder.shutdown().await;
}

#[tokio::test]
async fn instructions_survive_a_rebuild_for_another_url() {
    let server = MockServer::start().await;
    mount_page(&server, "https://one.example", "One").await;
    mount_page(&server, "https://two.example", "Two").await;

    let mut builder = TreeBuilder::spawn(client(&server), Duration::from_millis(20));
    let mut session = AuthoringSession::new();

    builder.set_url("https://one.example").unwrap();
    let first = builder.settled().await.unwrap().tree.unwrap();
    session.attach_tree(Arc::clone(&first));
    session.mark(2).unwrap();

    builder.set_url("https://two.example").unwrap();
    let second = builder.settled().await.unwrap().tree.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.node(2).unwrap().body.as_deref(), Some("Two"));

    session.attach_tree(second);
    let kept = session.instructions();
    assert_eq!(kept.len(), 1);
    assert_eq!(
        kept[0].preview.as_ref().unwrap().raw_preview,
        "<h1>One</h1>"
    );

    builder.shutdown().await;
}

#[tokio::test]
async fn unreachable_service_fails_the_build() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut builder = TreeBuilder::spawn(client(&server), Duration::from_millis(20));
    builder.set_url("https://down.example").unwrap();
    builder.rebuild().unwrap();
    let snapshot = builder.settled().await.unwrap();

    match snapshot.state {
        BuildState::Failed(err) => {
            assert!(matches!(err, DomainError::Network(_)));
            assert!(err.is_transient());
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(snapshot.tree.is_none());
    builder.shutdown().await;
}
