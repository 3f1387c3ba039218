//! Notification bridge.
//!
//! When the user taps a system notification, the bridge closes it and
//! opens an app window at the hosting base URL with the notification's
//! payload serialized into the `data` query parameter. A failure to open
//! the window is swallowed; there is nothing useful to do with it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use sideout_core::{CacheConfig, Error};

/// Seam to the host's window-opening facility.
#[async_trait]
pub trait WindowOpener: Send + Sync {
    async fn open(&self, url: &Url) -> Result<(), Error>;
}

/// A displayed system notification with its attached payload.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    /// Opaque JSON payload, forwarded verbatim to the opened window.
    pub data: Option<serde_json::Value>,
    closed: bool,
}

impl Notification {
    pub fn new(title: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self { title: title.into(), data, closed: false }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Reacts to notification interaction by opening an app window.
pub struct NotificationBridge {
    base: Url,
    opener: Arc<dyn WindowOpener>,
}

impl NotificationBridge {
    /// Compute the window base URL from the app origin and hosting scope.
    pub fn new(config: &CacheConfig, opener: Arc<dyn WindowOpener>) -> Result<Self, Error> {
        let mut base = Url::parse(&config.app_origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        base.set_path(&config.scope);
        Ok(Self { base, opener })
    }

    /// Handle a click on a notification: close it, then open a window with
    /// the payload (or an empty object) in the `data` query parameter.
    pub async fn on_notification_click(&self, notification: &mut Notification) {
        notification.close();
        let payload = notification.data.take().unwrap_or_else(|| serde_json::json!({}));

        let mut target = self.base.clone();
        target.query_pairs_mut().append_pair("data", &payload.to_string());

        if let Err(e) = self.opener.open(&target).await {
            warn!(url = %target, error = %e, "failed to open window from notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sideout_core::CacheConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<Url>>,
    }

    #[async_trait]
    impl WindowOpener for RecordingOpener {
        async fn open(&self, url: &Url) -> Result<(), Error> {
            self.opened.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    struct FailingOpener;

    #[async_trait]
    impl WindowOpener for FailingOpener {
        async fn open(&self, _url: &Url) -> Result<(), Error> {
            Err(Error::InvalidInput("no window manager".into()))
        }
    }

    #[tokio::test]
    async fn test_click_closes_and_opens_with_payload() {
        let opener = Arc::new(RecordingOpener::default());
        let bridge =
            NotificationBridge::new(&CacheConfig::default(), opener.clone() as Arc<dyn WindowOpener>)
                .unwrap();

        let payload = serde_json::json!({"game_id": 12, "court": "riverside"});
        let mut notification = Notification::new("Game tonight!", Some(payload));

        bridge.on_notification_click(&mut notification).await;

        assert!(notification.is_closed());
        let opened = opener.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        let (key, value) = opened[0].query_pairs().next().unwrap();
        assert_eq!(key, "data");
        let round_trip: serde_json::Value = serde_json::from_str(&value).unwrap();
        assert_eq!(round_trip["game_id"], 12);
    }

    #[tokio::test]
    async fn test_click_without_payload_sends_empty_object() {
        let opener = Arc::new(RecordingOpener::default());
        let bridge =
            NotificationBridge::new(&CacheConfig::default(), opener.clone() as Arc<dyn WindowOpener>)
                .unwrap();

        let mut notification = Notification::new("Roster updated", None);
        bridge.on_notification_click(&mut notification).await;

        let opened = opener.opened.lock().unwrap();
        let (_, value) = opened[0].query_pairs().next().unwrap();
        assert_eq!(value, "{}");
    }

    #[tokio::test]
    async fn test_open_failure_is_swallowed() {
        let bridge = NotificationBridge::new(&CacheConfig::default(), Arc::new(FailingOpener)).unwrap();
        let mut notification = Notification::new("Game tonight!", None);
        // must not panic or propagate
        bridge.on_notification_click(&mut notification).await;
        assert!(notification.is_closed());
    }

    #[tokio::test]
    async fn test_base_url_reflects_hosting_scope() {
        let config = CacheConfig { scope: "/league/".into(), ..Default::default() };
        let opener = Arc::new(RecordingOpener::default());
        let bridge =
            NotificationBridge::new(&config, opener.clone() as Arc<dyn WindowOpener>).unwrap();

        let mut notification = Notification::new("Draft open", None);
        bridge.on_notification_click(&mut notification).await;

        let opened = opener.opened.lock().unwrap();
        assert_eq!(opened[0].path(), "/league/");
    }
}
