//! # attribution-core
//!
//! Resolves marketing attribution for a page visit and relays it to an
//! embedded widget over a cross-frame message protocol.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Every operation runs to completion in
//!   response to one host event (page load, inbound message).
//! - **Not thread-safe**: One tracker per page; hosts own synchronization.
//! - **Graceful degradation**: Missing or corrupt state reads as empty, never
//!   as an error.
//! - **Explicit configuration**: Trusted origin, record key and expiry are
//!   passed into constructors, not read from globals.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use attribution_core::{FileStore, Navigation, Tracker, TrackerConfig};
//!
//! let navigation = Navigation::new(page_url, Some(referrer))?;
//! let store = FileStore::load(&store_path);
//! let mut tracker = Tracker::new(TrackerConfig::default(), navigation, store);
//! let embeds = tracker.init(&embed_urls);
//! let outcome = tracker.handle_message(&message, &mut port);
//! ```

pub mod augment;
pub mod channel;
pub mod config;
pub mod error;
pub mod record;
pub mod resolver;
pub mod signals;
pub mod store;
pub mod tracker;

pub use augment::{augment, augment_all, has_explicit_attribution};
pub use channel::{
    find_client_id, CrossFrameChannel, DataLayer, Disposition, DropReason, EventQueue, FramePort,
    HandshakeState, IgnoreReason, InboundMessage, RecordingPort,
};
pub use config::{
    default_config_path, default_store_path, ChannelConfig, ResolverConfig, TrackerConfig,
    MAX_TTL_DAYS,
};
pub use error::{AttributionError, Result};
pub use record::{AttributionRecord, Signals, UpdateMetadata, UtmField};
pub use resolver::{AttributionResolver, AttributionSource};
pub use signals::{extract_parameters, extract_referrer, Navigation};
pub use store::{AttributionStore, FileStore, MemoryStore};
pub use tracker::Tracker;

pub use embed_attribution_protocol as protocol;
