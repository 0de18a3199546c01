mod common;

use std::time::Duration;

use common::MemoryTransport;
use linkdoc::{
    oml, ClientConfig, Document, DocumentError, Input, LoadState, ObservableError, Path, Response, Session, Snapshot,
    StaticToken, Value,
};
use serde_json::json;

const ROOT: &str = "http://x/root";
const DOC: &str = "http://x/doc";

fn session(transport: &MemoryTransport) -> Session {
    Session::new(transport.clone())
}

#[test]
fn oml_link_decodes_to_document_and_reencodes_as_url() {
    let transport = MemoryTransport::new();
    let session = session(&transport);
    let mut graph = session.graph();
    let root = graph.create_dict();
    graph.decode_into(root, "a: 1\nb: !link 'http://x/doc'\n").unwrap();

    assert_eq!(graph.get(root, "a"), Some(Value::Number(1.into())));
    let doc = graph.get(root, "b").and_then(|v| v.as_node()).unwrap();
    assert_eq!(graph.document_url(doc).map(|u| u.as_str()), Some(DOC));

    let text = graph.encode(root).unwrap();
    let Input::Map(decoded) = oml::decode(&text).unwrap() else {
        panic!("expected map");
    };
    assert_eq!(decoded["b"], Input::Link(DOC.into()));
}

#[tokio::test]
async fn load_assigns_fetched_tree() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "title: hello\nitems: [1, 2]\n");
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    assert_eq!(session.graph().load_state(doc.id()), Some(LoadState::Unloaded));

    let changes = session.load(&doc, true).await.unwrap();
    assert_eq!(changes.len(), 2);
    let graph = session.graph();
    assert_eq!(graph.load_state(doc.id()), Some(LoadState::Loaded));
    assert_eq!(
        graph.snapshot(doc.id()).unwrap(),
        Snapshot::from(json!({"title": "hello", "items": [1, 2]}))
    );
}

#[tokio::test]
async fn cached_load_does_not_refetch() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "a: 1\n");
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    session.load(&doc, true).await.unwrap();
    session.load(&doc, true).await.unwrap();
    assert_eq!(transport.fetches(ROOT), 1);

    transport.serve(ROOT, "a: 2\n");
    let changes = session.load(&doc, false).await.unwrap();
    assert_eq!(transport.fetches(ROOT), 2);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path().to_string(), "a");
}

#[tokio::test]
async fn reload_preserves_untouched_subscriptions() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "keep: {x: 1}\nchange: {y: 1}\n");
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    session.load(&doc, true).await.unwrap();
    let keep = session.graph().get(doc.id(), "keep").and_then(|v| v.as_node()).unwrap();

    transport.serve(ROOT, "keep: {x: 1}\nchange: {y: 2}\n");
    let changes = session.load(&doc, false).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path().to_string(), "change.y");
    assert_eq!(session.graph().get(doc.id(), "keep").and_then(|v| v.as_node()), Some(keep));
}

#[tokio::test]
async fn http_error_body_is_surfaced_and_state_restored() {
    let transport = MemoryTransport::new();
    transport.respond(ROOT, Response::ok("document is gone").with_status(410));
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();

    let err = session.load(&doc, true).await.unwrap_err();
    match err {
        DocumentError::Http { status, message } => {
            assert_eq!(status, 410);
            assert_eq!(message, "document is gone");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(session.graph().load_state(doc.id()), Some(LoadState::Unloaded));
}

#[tokio::test]
async fn undecodable_reload_leaves_previous_tree() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "a: 1\n");
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    session.load(&doc, true).await.unwrap();

    transport.serve(ROOT, "a: [unclosed\n");
    let err = session.load(&doc, false).await.unwrap_err();
    assert!(matches!(err, DocumentError::Oml(_)));
    let graph = session.graph();
    assert_eq!(graph.snapshot(doc.id()).unwrap(), Snapshot::from(json!({"a": 1})));
    assert_eq!(graph.load_state(doc.id()), Some(LoadState::Loaded));
}

#[tokio::test]
async fn read_only_permission_guards_every_nested_write() {
    let transport = MemoryTransport::new();
    transport.respond(
        ROOT,
        Response::ok("meta: {tags: [a, b]}\nname: x\n").with_permission("read"),
    );
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    session.load(&doc, true).await.unwrap();

    let mut graph = session.graph();
    assert!(graph.is_read_only(doc.id()));
    let meta = graph.get(doc.id(), "meta").and_then(|v| v.as_node()).unwrap();
    let tags = graph.get(meta, "tags").and_then(|v| v.as_node()).unwrap();
    let denied = ObservableError::WritePermission { url: ROOT.into() };

    assert_eq!(graph.dict(doc.id()).unwrap().set("name", "y"), Err(denied.clone()));
    assert_eq!(graph.dict(doc.id()).unwrap().delete("name"), Err(denied.clone()));
    assert_eq!(graph.dict(meta).unwrap().set("new", 1), Err(denied.clone()));
    assert_eq!(graph.list(tags).unwrap().insert(0, "z"), Err(denied.clone()));
    assert_eq!(graph.list(tags).unwrap().remove(1), Err(denied.clone()));
    assert_eq!(graph.list(tags).unwrap().set(0, "q"), Err(denied));
    assert_eq!(
        graph.snapshot(doc.id()).unwrap(),
        Snapshot::from(json!({"meta": {"tags": ["a", "b"]}, "name": "x"}))
    );
}

#[tokio::test]
async fn read_only_document_can_still_be_reloaded() {
    let transport = MemoryTransport::new();
    transport.respond(ROOT, Response::ok("a: 1\n").with_permission("read"));
    let session = session(&transport);
    let doc = session.open(ROOT).unwrap();
    session.load(&doc, true).await.unwrap();

    transport.serve(ROOT, "a: 2\n");
    session.load(&doc, false).await.unwrap();
    let graph = session.graph();
    assert!(!graph.is_read_only(doc.id()));
    assert_eq!(graph.get(doc.id(), "a"), Some(Value::Number(2.into())));
}

#[tokio::test]
async fn nested_links_are_loaded_once() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "left: !link 'http://x/doc'\nright: [!link 'http://x/doc']\n");
    transport.serve(DOC, "back: !link 'http://x/root'\nvalue: 42\n");
    let session = session(&transport);
    let root = session.open(ROOT).unwrap();
    session.load(&root, true).await.unwrap();

    assert_eq!(transport.fetches(ROOT), 1);
    assert_eq!(transport.fetches(DOC), 1);
    let graph = session.graph();
    let left = graph.get(root.id(), "left").and_then(|v| v.as_node()).unwrap();
    assert_eq!(graph.lookup(root.id(), "right.0"), Some(Value::Node(left)));
    assert_eq!(graph.load_state(left), Some(LoadState::Loaded));
    assert_eq!(graph.lookup(root.id(), "left.value"), Some(Value::Number(42.into())));
    assert_eq!(graph.lookup(left, "back"), Some(Value::Node(root.id())));
}

#[tokio::test]
async fn failed_nested_load_fails_parent() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "child: !link 'http://x/missing'\n");
    let session = session(&transport);
    let root = session.open(ROOT).unwrap();
    let err = session.load(&root, true).await.unwrap_err();
    assert!(matches!(err, DocumentError::Http { status: 404, .. }));
    // The parent itself was assigned before its links were followed.
    assert_eq!(session.graph().load_state(root.id()), Some(LoadState::Loaded));
}

#[tokio::test]
async fn store_posts_encoded_snapshot_without_mutating() {
    let transport = MemoryTransport::new();
    let session = session(&transport).with_authorization(StaticToken::bearer("t0k"));
    let doc = session.open(DOC).unwrap();
    {
        let mut graph = session.graph();
        graph.dict(doc.id()).unwrap().set("a", json!([1, 2])).unwrap();
        graph.dict(doc.id()).unwrap().set("link", Input::Link(ROOT.into())).unwrap();
    }
    session.store(&doc).await.unwrap();

    let stored = transport.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, DOC);
    let Input::Map(body) = oml::decode(&stored[0].1).unwrap() else {
        panic!("expected map");
    };
    assert_eq!(body["link"], Input::Link(ROOT.into()));
    assert_eq!(transport.authorizations(), vec![Some("Bearer t0k".to_string())]);

    transport.respond_to_store(Response::ok("quota exceeded").with_status(507));
    let err = session.store(&doc).await.unwrap_err();
    assert!(matches!(err, DocumentError::Http { status: 507, ref message } if message == "quota exceeded"));
    let snapshot = session.graph().snapshot(doc.id()).unwrap();
    assert_eq!(snapshot.lookup(&Path::parse("a")), Some(Snapshot::from(json!([1, 2]))));
    assert_eq!(snapshot.lookup(&Path::parse("link")), Some(Snapshot::Link(ROOT.into())));
}

#[tokio::test(start_paused = true)]
async fn slow_transport_times_out() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "a: 1\n");
    transport.delay(Duration::from_secs(60));
    let session = session(&transport).with_config(ClientConfig::default().with_timeout(Duration::from_secs(1)));
    let doc = session.open(ROOT).unwrap();
    let err = session.load(&doc, true).await.unwrap_err();
    assert!(matches!(err, DocumentError::Timeout));
    assert_eq!(session.graph().load_state(doc.id()), Some(LoadState::Unloaded));
}

async fn open_and_load(session: &Session, url: &str, after: Duration) -> Result<(Document, Option<LoadState>), DocumentError> {
    tokio::time::sleep(after).await;
    let doc = session.open(url)?;
    session.load(&doc, true).await?;
    let state = session.graph().load_state(doc.id());
    Ok((doc, state))
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_loads_share_one_fetch() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "a: 1\n");
    transport.delay(Duration::from_millis(100));
    let session = session(&transport);

    let (first, second) = tokio::join!(
        open_and_load(&session, ROOT, Duration::ZERO),
        open_and_load(&session, ROOT, Duration::from_millis(10)),
    );
    let (first, first_state) = first.unwrap();
    let (second, second_state) = second.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_state, Some(LoadState::Loaded));
    assert_eq!(second_state, Some(LoadState::Loaded));
    assert_eq!(transport.fetches(ROOT), 1);
    assert_eq!(session.graph().snapshot(first.id()).unwrap(), Snapshot::from(json!({"a": 1})));
}

#[tokio::test(start_paused = true)]
async fn parent_load_waits_for_link_loading_elsewhere() {
    let transport = MemoryTransport::new();
    transport.serve(ROOT, "child: !link 'http://x/doc'\n");
    transport.serve(DOC, "value: 42\n");
    transport.delay(Duration::from_millis(100));
    let session = session(&transport);

    // The root's fetch ends at 100ms; the direct fetch of the link runs
    // from 50ms to 150ms, so the root's link load finds it in flight.
    let (parent, direct) = tokio::join!(
        async {
            let result = open_and_load(&session, ROOT, Duration::ZERO).await;
            let value = session.graph().lookup(session.open(ROOT).unwrap().id(), "child.value");
            (result, value)
        },
        open_and_load(&session, DOC, Duration::from_millis(50)),
    );
    let (result, value) = parent;
    assert_eq!(result.unwrap().1, Some(LoadState::Loaded));
    assert_eq!(value, Some(Value::Number(42.into())));
    assert_eq!(direct.unwrap().1, Some(LoadState::Loaded));
    assert_eq!(transport.fetches(DOC), 1);
}

#[test]
fn config_embeds_in_host_yaml() {
    #[derive(serde::Deserialize)]
    struct Host {
        client: ClientConfig,
    }
    let host: Host = serde_yaml::from_str("client:\n  permission_header: x-access\n").unwrap();
    assert_eq!(host.client.permission_header, "x-access");
    assert_eq!(host.client.timeout(), Duration::from_secs(30));
}
