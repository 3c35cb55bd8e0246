mod common;

use common::{CONVERSATIONS_URL, FakeElement, FakePage, test_config};
use messages_web::chrome::PageSurface;
use messages_web::locators::LocatorKey;
use messages_web::{MessageDispatcher, MessagesError, OutboundMessage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const COMPOSE_URL: &str = "https://messages.google.com/web/conversations/new";

fn dispatcher(page: &Arc<FakePage>) -> MessageDispatcher {
    MessageDispatcher::new(page.clone(), Arc::new(test_config()))
}

fn message() -> OutboundMessage {
    OutboundMessage::new("+15551234567", "See you at eight")
}

/// Compose view with every input in place.
fn compose_page() -> FakePage {
    FakePage::new()
        .with_element(LocatorKey::ContactInput, FakeElement::new())
        .with_element(LocatorKey::ContactConfirm, FakeElement::new())
        .with_element(LocatorKey::MessageInput, FakeElement::new())
}

#[tokio::test]
async fn sends_through_the_visible_send_button() {
    let page = Arc::new(
        compose_page()
            .with_element(LocatorKey::SendButton, FakeElement::hidden())
            .with_element(LocatorKey::SendButton, FakeElement::new())
            .reveal_on_click(
                LocatorKey::SendButton,
                LocatorKey::StatusMessage,
                FakeElement::new().with_property("innerText", "  Sent \n"),
            ),
    );

    let result = dispatcher(&page).send(&message()).await.unwrap();

    assert_eq!(result.status_message.as_deref(), Some("Sent"));
    assert_eq!(page.navigations(), vec![COMPOSE_URL.to_string()]);
    assert_eq!(page.typed_into(LocatorKey::ContactInput), vec!["+15551234567"]);
    assert_eq!(page.typed_into(LocatorKey::MessageInput), vec!["See you at eight"]);
    assert_eq!(page.clicks_on(LocatorKey::ContactConfirm), 1);
    assert_eq!(page.clicked_indices(LocatorKey::SendButton), vec![1]);
    assert_eq!(page.reloads(), 0);
    // Recipient, confirm, body, the clicked button and the status; not the hidden button.
    assert_eq!(page.live_handles(), 5);
}

#[tokio::test]
async fn missing_status_is_not_an_error() {
    let page = Arc::new(compose_page().with_element(LocatorKey::SendButton, FakeElement::new()));

    let result = dispatcher(&page).send(&message()).await.unwrap();

    assert_eq!(result.status_message, None);
    assert_eq!(page.clicks_on(LocatorKey::SendButton), 1);
}

#[tokio::test]
async fn dismisses_the_interstitial_dialog() {
    let page = Arc::new(
        compose_page()
            .with_element(LocatorKey::SendButton, FakeElement::new())
            .with_element(LocatorKey::DismissDialog, FakeElement::new()),
    );

    dispatcher(&page).send(&message()).await.unwrap();

    assert_eq!(page.clicks_on(LocatorKey::DismissDialog), 1);
}

#[tokio::test(start_paused = true)]
async fn reloads_once_when_the_body_input_is_late() {
    let page = Arc::new(
        FakePage::new()
            .with_element(LocatorKey::ContactInput, FakeElement::new())
            .with_element(LocatorKey::ContactConfirm, FakeElement::new())
            .with_element(LocatorKey::SendButton, FakeElement::new())
            .reveal_on_reload(LocatorKey::MessageInput, FakeElement::new()),
    );

    let result = dispatcher(&page).send(&message()).await;

    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(page.reloads(), 1);
    assert_eq!(page.navigations().len(), 2);
    assert_eq!(page.typed_into(LocatorKey::ContactInput).len(), 2);
    assert_eq!(page.typed_into(LocatorKey::MessageInput), vec!["See you at eight"]);
    assert_eq!(page.clicks_on(LocatorKey::SendButton), 1);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_second_attempt() {
    let page = Arc::new(
        FakePage::new()
            .with_element(LocatorKey::ContactInput, FakeElement::new())
            .with_element(LocatorKey::ContactConfirm, FakeElement::new())
            .with_element(LocatorKey::SendButton, FakeElement::new()),
    );

    let err = dispatcher(&page).send(&message()).await.unwrap_err();

    match err {
        MessagesError::SendFailed { attempts, reason } => {
            assert_eq!(attempts, 2);
            assert!(reason.contains("message-input"), "{}", reason);
        }
        other => panic!("expected SendFailed, got {:?}", other),
    }
    assert_eq!(page.reloads(), 1);
    assert_eq!(page.clicks_on(LocatorKey::SendButton), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_recipient_input_is_retried_too() {
    let page = Arc::new(FakePage::new());

    let err = dispatcher(&page).send(&message()).await.unwrap_err();

    assert!(matches!(err, MessagesError::SendFailed { attempts: 2, .. }));
    assert_eq!(page.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn offscreen_send_button_is_not_retried() {
    let page = Arc::new(compose_page().with_element(LocatorKey::SendButton, FakeElement::offscreen()));

    let err = dispatcher(&page).send(&message()).await.unwrap_err();

    assert!(
        matches!(err, MessagesError::ElementNotFound { ref step } if step == "send-button"),
        "{:?}",
        err
    );
    assert_eq!(page.reloads(), 0);
    assert_eq!(page.clicks_on(LocatorKey::SendButton), 0);
    assert_eq!(page.live_handles(), 3, "send button handles outlived their poll");
}

#[tokio::test]
async fn closing_the_page_mid_send_is_not_retried() {
    let page = Arc::new(
        FakePage::new()
            .with_element(LocatorKey::ContactInput, FakeElement::new())
            .with_element(LocatorKey::ContactConfirm, FakeElement::new()),
    );

    let closer_page = page.clone();
    let closer = tokio::spawn(async move {
        while closer_page.typed_into(LocatorKey::ContactInput).is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        closer_page.close().await.unwrap();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), dispatcher(&page).send(&message()))
        .await
        .expect("send kept waiting on a closed page");
    closer.await.unwrap();

    assert!(matches!(result, Err(MessagesError::PageClosed)), "{:?}", result);
    assert_eq!(page.reloads(), 0);
    assert_eq!(page.typed_into(LocatorKey::MessageInput), Vec::<String>::new());
}

#[tokio::test]
async fn navigation_failure_is_returned_as_is() {
    let page = Arc::new(compose_page().fail_navigation("conversations/new", "net::ERR_ABORTED"));

    let err = dispatcher(&page).send(&message()).await.unwrap_err();

    assert!(matches!(err, MessagesError::NavigationError(_)));
    assert_eq!(page.reloads(), 0);
}

#[tokio::test]
async fn empty_message_never_touches_the_page() {
    let page = Arc::new(compose_page());

    let err = dispatcher(&page)
        .send(&OutboundMessage::new("+15551234567", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, MessagesError::General(_)));
    assert!(page.navigations().is_empty());
}

#[tokio::test]
async fn lists_conversations_from_the_page() {
    let page = Arc::new(
        FakePage::new()
            .reveal_on_navigate(
                "/web/conversations",
                LocatorKey::ConversationList,
                FakeElement::new(),
            )
            .evaluate_returning(
                "mws-conversation-snippet",
                json!([
                    {
                        "href": "https://messages.google.com/web/conversations/new",
                        "from": "Start chat",
                    },
                    {
                        "href": "https://messages.google.com/web/conversations/42",
                        "unread": true,
                        "timestamp": "10:15 AM",
                        "from": " Alice ",
                        "snippet": "You: on my way",
                    },
                    {
                        "href": "https://messages.google.com/web/conversations/7",
                        "timestamp": "Yesterday",
                        "from": "Bob",
                        "snippet": "ok",
                    },
                    {
                        "href": "https://messages.google.com/web/conversations/3",
                        "from": "Carol",
                    },
                ]),
            ),
    );

    let conversations = dispatcher(&page).conversations(Some(2)).await.unwrap();

    assert_eq!(page.navigations(), vec![CONVERSATIONS_URL.to_string()]);
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].id, 42);
    assert_eq!(conversations[0].from, "Alice");
    assert_eq!(conversations[0].snippet, "on my way");
    assert!(conversations[0].unread);
    assert_eq!(conversations[1].id, 7);
    assert_eq!(conversations[1].timestamp, "Yesterday");
    assert!(!conversations[1].unread);
}

#[tokio::test(start_paused = true)]
async fn conversation_list_must_render() {
    let page = Arc::new(FakePage::new());

    let err = dispatcher(&page).conversations(None).await.unwrap_err();

    assert!(
        matches!(err, MessagesError::ElementNotFound { ref step } if step == "conversation_list")
    );
}
