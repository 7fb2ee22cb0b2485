//! Integration tests for the crawler
//!
//! These tests use wiremock to serve the pages of a document target and run
//! the full crawl cycle end-to-end through the control channel.

use pagesweep::config::{ConfigSource, FileConfigSource, PaginationSpec};
use pagesweep::crawler::{DriverState, Orchestrator};
use pagesweep::messaging::{spawn_control_server, spawn_picker_bridge, ControlChannel};
use pagesweep::target::{build_http_client, DocumentPage, TargetHandle, TargetProvider, TargetRegistry};
use pagesweep::CrawlError;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Responds with an HTML document wrapping `body`
fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Listing</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

/// Writes a JSON crawl config to a temporary file
fn write_config(json: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Failed to create config file");
    file.write_all(json.as_bytes())
        .expect("Failed to write config file");
    file.flush().expect("Failed to flush config file");
    file
}

fn items_config(pagination: &str) -> String {
    format!(
        r#"{{
            "pagination": {},
            "templates": [
                {{ "name": "other", "fields": [{{ "name": "x", "selector": "h1" }}] }},
                {{
                    "name": "items",
                    "selected": true,
                    "fields": [
                        {{ "name": "title", "selector": ".item .t" }},
                        {{ "name": "link", "selector": ".item a" }}
                    ]
                }}
            ]
        }}"#,
        pagination
    )
}

/// Opens `url` as the active target
async fn open_page(registry: &TargetRegistry, url: &str) -> (TargetHandle, DocumentPage) {
    let context = registry.new_context();
    let page = DocumentPage::open(
        context.clone(),
        build_http_client().expect("Failed to build client"),
        Url::parse(url).expect("Failed to parse URL"),
    )
    .await
    .expect("Failed to open page");
    let handle = registry.attach(context, page.clone());
    (handle, page)
}

/// Starts a control server crawling the registry's active target
fn control(store: Arc<FileConfigSource>, registry: &Arc<TargetRegistry>) -> ControlChannel {
    let orchestrator = Orchestrator::new(store.clone(), registry.clone() as Arc<dyn TargetProvider>);
    let (control, _task) =
        spawn_control_server(Arc::new(orchestrator), store, CancellationToken::new());
    control
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<div class="item"><p class="t">A</p><a href="/a">more</a></div>
               <div class="item"><p class="t">B</p><a href="/b">more</a></div>
               <nav><a class="next" href="/list/2">Next</a></nav>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list/2"))
        .respond_with(html(
            r#"<div class="item"><p class="t">C</p><a href="/c">more</a></div>
               <div class="item"><p class="t">D</p></div>
               <nav><a class="next" href="/list/3">Next</a></nav>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list/3"))
        .respond_with(html(
            r#"<div class="item"><p class="t">E</p><a href="/e">more</a></div>
               <nav><span class="disabled">Next</span></nav>"#,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_click_pagination_across_pages() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let config = write_config(&items_config(
        r#"{ "type": "click", "nextPageSelector": "nav > a.next" }"#,
    ));
    let store = Arc::new(FileConfigSource::new(config.path()));
    let registry = Arc::new(TargetRegistry::new());
    let (target, page) = open_page(&registry, &format!("{}/list", server.uri())).await;

    let report = control(store, &registry)
        .start_crawl()
        .await
        .expect("Crawl should start");

    assert!(report.is_success());
    assert_eq!(report.target, target.id());
    assert_eq!(report.final_state, DriverState::Done);
    assert_eq!(report.pages_scraped, 3);
    assert_eq!(report.advances, 2);
    assert!(report.config_hash.is_some());

    let titles: Vec<_> = report
        .records
        .iter()
        .map(|r| r.get("title").flatten().unwrap_or_default().to_string())
        .collect();
    assert_eq!(titles, vec!["A", "B", "C", "D", "E"]);
    assert_eq!(report.records[3].get("link"), Some(None));
    assert_eq!(page.current_url().path(), "/list/3");
}

#[tokio::test]
async fn test_single_page_example() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<div class="item"><p class="t">A</p><a href="/a">more</a></div>
               <div class="item"><p class="t">B</p><a href="/b">more</a></div>
               <div class="item"><p class="t">C</p></div>"#,
        ))
        .mount(&server)
        .await;

    let config = write_config(&items_config(r#"{ "type": "none" }"#));
    let store = Arc::new(FileConfigSource::new(config.path()));
    let registry = Arc::new(TargetRegistry::new());
    open_page(&registry, &format!("{}/", server.uri())).await;

    let report = control(store, &registry).start_crawl().await.unwrap();

    assert_eq!(report.pages_scraped, 1);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.records[2].get("title"), Some(Some("C")));
    assert_eq!(report.records[2].get("link"), Some(None));
}

#[tokio::test]
async fn test_scroll_pagination_scrapes_each_round() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let config = write_config(&items_config(
        r#"{ "type": "scroll_down", "scrollCount": 2, "scrollInterval": 20 }"#,
    ));
    let store = Arc::new(FileConfigSource::new(config.path()));
    let registry = Arc::new(TargetRegistry::new());
    open_page(&registry, &format!("{}/list", server.uri())).await;

    let report = control(store, &registry).start_crawl().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.advances, 2);
    // A static document yields the same items after every scroll
    assert_eq!(report.records.len(), 4);
}

#[tokio::test]
async fn test_missing_config_is_setup_error() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileConfigSource::new(dir.path().join("crawlConfig.json")));
    let registry = Arc::new(TargetRegistry::new());
    open_page(&registry, &format!("{}/list", server.uri())).await;

    let err = control(store, &registry).start_crawl().await.unwrap_err();
    assert!(err.to_string().contains("No crawl config found"));
}

#[tokio::test]
async fn test_closing_target_mid_load_keeps_partial_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<div class="item"><p class="t">A</p></div>
               <a class="next" href="/slow">Next</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = write_config(&items_config(
        r#"{ "type": "click", "nextPageSelector": "a.next" }"#,
    ));
    let store = Arc::new(FileConfigSource::new(config.path()));
    let registry = Arc::new(TargetRegistry::new());
    let (target, _page) = open_page(&registry, &format!("{}/list", server.uri())).await;

    let closer = registry.clone();
    let id = target.id();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        closer.close(id);
    });

    let report = control(store, &registry).start_crawl().await.unwrap();

    assert!(!report.is_success());
    assert!(matches!(report.error(), Some(CrawlError::AdvanceFailed(_))));
    assert_eq!(report.final_state, DriverState::Failed);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].get("title"), Some(Some("A")));
}

#[tokio::test]
async fn test_picked_selector_drives_next_crawl() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let config = write_config(&items_config(r#"{ "type": "none" }"#));
    let store = Arc::new(FileConfigSource::new(config.path()));
    let registry = Arc::new(TargetRegistry::new());
    let (target, page) = open_page(&registry, &format!("{}/list", server.uri())).await;

    let control = control(store.clone(), &registry);
    let cancel = CancellationToken::new();
    let bridge = spawn_picker_bridge(registry.events(), control.clone(), cancel.clone());

    target.channel().start_pagination_picking().await.unwrap();
    let picked = page.pick("a.next").unwrap().expect("Next link should match");
    assert_eq!(picked, "body > nav > a");

    cancel.cancel();
    bridge.await.unwrap();
    assert_eq!(
        store.load().unwrap().map(|loaded| loaded.config.pagination),
        Some(PaginationSpec::Click {
            next_page_selector: "body > nav > a".to_string()
        })
    );

    let report = control.start_crawl().await.unwrap();
    assert_eq!(report.pages_scraped, 3);
    assert_eq!(report.records.len(), 5);
}
