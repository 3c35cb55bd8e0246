//! Real-browser smoke test for the Chrome-backed page surface.
//!
//! Run with: cargo test --test browser_test -- --ignored --nocapture

use messages_web::chrome::{BrowserHandle, PageSignal, PageSurface, StorageKind, WaitOptions, WaitPolicy};
use messages_web::config::Config;
use messages_web::locators::Locator;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const PAGE: &str = "data:text/html,<html><body><div id='box'><img id='qr'></div><button id='go' onclick=\"this.dataset.clicked='yes'\">Go</button><input id='field'></body></html>";

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chromium_page_surface() {
    let mut config = Config::default();
    config.browser.port = 9333;
    let browser = BrowserHandle::launch(&config).await.unwrap();
    let page = browser.page();

    let mut signals = page.subscribe_signals();
    page.navigate(PAGE, WaitPolicy::Load).await.unwrap();
    loop {
        if let PageSignal::Navigated(url) = signals.recv().await.unwrap() {
            assert!(url.starts_with("data:text/html"));
            break;
        }
    }

    let button = page
        .wait_for_element(&Locator::parse("#go"), WaitOptions::visible(5_000))
        .await
        .unwrap();
    assert!(page.is_interactable(&button).await.unwrap());
    page.click(&button, Default::default()).await.unwrap();
    let clicked = page
        .evaluate("()=>document.getElementById('go').dataset.clicked", vec![])
        .await
        .unwrap();
    assert_eq!(clicked, json!("yes"));

    let field = page
        .wait_for_element(&Locator::parse("//input[@id='field']"), WaitOptions::visible(5_000))
        .await
        .unwrap();
    page.type_text(&field, "hello", Default::default()).await.unwrap();
    assert_eq!(page.read_property(&field, "value").await.unwrap(), json!("hello"));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    page.expose_callback(
        "__smokeBinding",
        Arc::new(move |_payload: String| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .await
    .unwrap();
    page.evaluate("()=>window.__smokeBinding('ping')", vec![]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // data: URLs have no storage; only check that the call round-trips.
    let _ = page.get_storage(StorageKind::Local).await;

    let missing = page
        .wait_for_element(&Locator::parse("#absent"), WaitOptions::attached(300))
        .await;
    assert!(missing.is_err());

    browser.close().await.unwrap();
}
