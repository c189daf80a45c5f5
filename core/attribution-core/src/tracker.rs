//! Page-load bootstrap.
//!
//! Wires resolver, augmenter and channel together for one page. The listener
//! is registered last so that a failure anywhere earlier leaves nothing half
//! attached.

use serde_json::Value;
use tracing::{debug, error};

use crate::augment::augment_all;
use crate::channel::{
    CrossFrameChannel, DataLayer, Disposition, EventQueue, FramePort, InboundMessage,
};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::record::AttributionRecord;
use crate::resolver::AttributionResolver;
use crate::signals::Navigation;
use crate::store::AttributionStore;

pub struct Tracker<S: AttributionStore> {
    config: TrackerConfig,
    resolver: AttributionResolver<S>,
    channel: CrossFrameChannel,
    data_layer: DataLayer,
}

impl<S: AttributionStore> Tracker<S> {
    pub fn new(config: TrackerConfig, navigation: Navigation, store: S) -> Self {
        let resolver = AttributionResolver::new(store, navigation, config.resolver());
        let channel = CrossFrameChannel::new(config.channel());
        Tracker {
            config,
            resolver,
            channel,
            data_layer: DataLayer::new(),
        }
    }

    /// Seeds the outbound queue, e.g. with entries a tag manager pushed
    /// before the tracker loaded.
    pub fn with_data_layer(mut self, data_layer: DataLayer) -> Self {
        self.data_layer = data_layer;
        self
    }

    /// Resolves attribution, rewrites `embed_urls`, and starts listening for
    /// frame messages.
    ///
    /// Never fails: on error the problem is logged once, no listener is left
    /// registered, and the embed URLs come back untouched.
    pub fn init(&mut self, embed_urls: &[String]) -> Vec<String> {
        match self.try_init(embed_urls) {
            Ok(rewritten) => rewritten,
            Err(err) => {
                self.channel.unlisten();
                error!(error = %err, "Attribution tracker initialization failed");
                embed_urls.to_vec()
            }
        }
    }

    fn try_init(&mut self, embed_urls: &[String]) -> Result<Vec<String>> {
        let record = self.resolver.resolve();
        let rewritten = augment_all(embed_urls, &record, self.resolver.navigation().page_url())?;
        self.channel.listen();

        if self.config.debug {
            debug!(
                attribution = %record.to_value(),
                embeds = rewritten.len(),
                "Attribution tracker initialized"
            );
        }
        Ok(rewritten)
    }

    pub fn handle_message<P: FramePort + ?Sized>(
        &mut self,
        message: &InboundMessage,
        port: &mut P,
    ) -> Disposition {
        self.channel
            .handle_message(message, port, &mut self.resolver, &mut self.data_layer)
    }

    pub fn attribution(&mut self) -> AttributionRecord {
        self.resolver.resolve()
    }

    /// Appends to the outbound queue on behalf of the host page.
    pub fn push_event(&mut self, event: Value) {
        self.data_layer.push(event);
    }

    pub fn data_layer(&self) -> &DataLayer {
        &self.data_layer
    }

    pub fn channel(&self) -> &CrossFrameChannel {
        &self.channel
    }

    pub fn resolver(&self) -> &AttributionResolver<S> {
        &self.resolver
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{HandshakeState, RecordingPort};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn tracker(page: &str, referrer: Option<&str>) -> Tracker<MemoryStore> {
        let navigation = Navigation::new(page, referrer).unwrap();
        Tracker::new(TrackerConfig::default(), navigation, MemoryStore::new())
    }

    #[test]
    fn test_init_rewrites_embeds_and_listens() {
        let mut tracker = tracker(
            "https://shop.example.com/?utm_source=news&utm_medium=email",
            None,
        );
        let rewritten = tracker.init(&["https://embeds.beehiiv.com/abc".to_string()]);
        assert!(rewritten[0].contains("utm_source=news&utm_medium=email"));
        assert!(tracker.channel().is_listening());
        assert_eq!(
            tracker.channel().session_state("https://embeds.beehiiv.com"),
            HandshakeState::AwaitingReady
        );
    }

    #[test]
    fn test_failed_init_leaves_no_listener() {
        let mut tracker = tracker("https://shop.example.com/", None);
        let embeds = vec!["https://embeds.beehiiv.com/a".to_string(), "::bad::".to_string()];
        let returned = tracker.init(&embeds);
        assert_eq!(returned, embeds);
        assert!(!tracker.channel().is_listening());

        let mut port = RecordingPort::default();
        let outcome = tracker.handle_message(
            &InboundMessage::new("https://embeds.beehiiv.com", json!("childReady")),
            &mut port,
        );
        assert_eq!(outcome, Disposition::Dropped(crate::channel::DropReason::NotListening));
        assert!(port.posts.is_empty());
    }

    #[test]
    fn test_handshake_uses_resolved_record_and_seeded_client_id() {
        let mut tracker = tracker("https://shop.example.com/?gclid=abc123", None)
            .with_data_layer(DataLayer::from(vec![json!({"ga-client-id": "GA1.1.99"})]));
        tracker.init(&[]);

        let mut port = RecordingPort::default();
        let outcome = tracker.handle_message(
            &InboundMessage::new("https://embeds.beehiiv.com", json!("childReady")),
            &mut port,
        );

        assert_eq!(outcome, Disposition::Handshake { sent: 3 });
        let attribution = port.posts[1].0.to_value();
        assert_eq!(attribution["data"]["source"], json!("google"));
        assert_eq!(attribution["data"]["medium"], json!("paid"));
        assert_eq!(port.posts[2].0.to_value()["clientId"], json!("GA1.1.99"));
    }

    #[test]
    fn test_unstorable_expiry_still_initializes() {
        let config = TrackerConfig {
            ttl_days: 1_000_000_000,
            ..TrackerConfig::default()
        };
        let navigation = Navigation::new("https://shop.example.com/?gclid=abc123", None).unwrap();
        let mut tracker = Tracker::new(config, navigation, MemoryStore::new());

        let rewritten = tracker.init(&["https://embeds.beehiiv.com/abc".to_string()]);
        assert!(rewritten[0].contains("utm_source=google&utm_medium=paid"));
        assert!(tracker.channel().is_listening());
        assert_eq!(tracker.resolver().store().write_count(), 0);
    }

    #[test]
    fn test_forwarded_events_land_in_data_layer() {
        let mut tracker = tracker("https://shop.example.com/", None);
        tracker.init(&[]);
        tracker.push_event(json!({"event": "page_view"}));
        tracker.handle_message(
            &InboundMessage::new("https://embeds.beehiiv.com", json!({"event": "subscribe"})),
            &mut RecordingPort::default(),
        );
        assert_eq!(
            tracker.data_layer().entries(),
            &[json!({"event": "page_view"}), json!({"event": "subscribe"})]
        );
    }
}
