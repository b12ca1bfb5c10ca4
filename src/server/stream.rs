//! Live event stream (Server-Sent Events)
//!
//! Each `GET /event` request registers a subscriber and streams its
//! notifications until either side goes away. The [`Subscription`] lives
//! inside the response body stream: when hyper drops the body (client
//! disconnect, write error, server shutdown) the subscription's drop
//! deregisters it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};
use tokio::sync::OwnedSemaphorePermit;

use crate::broker::{Notification, Subscription};

use super::AppState;

/// Subscription plus the connection slot it occupies
struct LiveStream {
    subscription: Subscription,
    _slot: Option<OwnedSemaphorePermit>,
}

/// `GET /event`
pub async fn event_stream(State(state): State<AppState>) -> Response {
    let slot = match &state.slots {
        Some(slots) => match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(
                    max = state.config.max_connections,
                    "Live stream rejected: limit reached"
                );
                return (StatusCode::SERVICE_UNAVAILABLE, "too many live streams").into_response();
            }
        },
        None => None,
    };

    let subscription = match state.broker.register().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(error = %e, "Live stream rejected");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    tracing::info!(subscriber_id = %subscription.id(), "Live stream opened");

    let live = LiveStream {
        subscription,
        _slot: slot,
    };
    let sse = Sse::new(notification_stream(live))
        .keep_alive(KeepAlive::new().interval(state.config.keep_alive_interval));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        sse,
    )
        .into_response()
}

/// Adapt a subscription to an SSE event stream; ends when the broker evicts it
fn notification_stream(live: LiveStream) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(live, |mut live| async move {
        let notification = live.subscription.recv().await?;
        Some((Ok(to_event(&notification)), live))
    })
}

/// SSE frame for a notification
///
/// Data goes out as an unnamed event (`onmessage`); joins and leaves are
/// named events carrying the subscriber count.
pub fn to_event(notification: &Notification) -> Event {
    match notification {
        Notification::Data(payload) => {
            let text = String::from_utf8_lossy(payload);
            // SSE forbids bare CR inside data lines
            Event::default().data(text.replace('\r', ""))
        }
        Notification::Joined { subscribers } => Event::default()
            .event("joined")
            .data(subscribers.to_string()),
        Notification::Left { subscribers } => Event::default()
            .event("left")
            .data(subscribers.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::broker::{BrokerConfig, FanoutBroker};

    #[tokio::test]
    async fn test_stream_yields_notifications_in_order() {
        let (handle, _task) = FanoutBroker::spawn(BrokerConfig::default());
        let subscription = handle.register().await.unwrap();
        let mut events = Box::pin(notification_stream(LiveStream {
            subscription,
            _slot: None,
        }));

        handle.publish("first").await.unwrap();
        handle.publish("second").await.unwrap();

        // joined, first, second
        for _ in 0..3 {
            assert!(events.next().await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_deregisters() {
        let (handle, _task) = FanoutBroker::spawn(BrokerConfig::default());
        let subscription = handle.register().await.unwrap();
        let events = notification_stream(LiveStream {
            subscription,
            _slot: None,
        });

        drop(events);
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.left, 1);
    }

    #[tokio::test]
    async fn test_stream_ends_after_eviction() {
        let (handle, _task) = FanoutBroker::spawn(BrokerConfig::default().subscriber_buffer(1));
        let subscription = handle.register().await.unwrap();
        let mut events = Box::pin(notification_stream(LiveStream {
            subscription,
            _slot: None,
        }));

        // Buffer holds the join; this publish overruns it
        handle.publish("overrun").await.unwrap();
        handle.stats().await.unwrap();

        assert!(events.next().await.is_some());
        let end = tokio::time::timeout(Duration::from_secs(1), events.next()).await;
        assert!(matches!(end, Ok(None)));
    }

    #[test]
    fn test_to_event_does_not_panic_on_control_chars() {
        let _ = to_event(&Notification::data("line one\r\nline two"));
        let _ = to_event(&Notification::Joined { subscribers: 3 });
        let _ = to_event(&Notification::Left { subscribers: 2 });
    }
}
