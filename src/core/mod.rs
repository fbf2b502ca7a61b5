//! Core domain types and collaborator abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod log;
pub mod notify;
pub mod pricing;
pub mod quote;
pub mod source;

// Re-export main types for cleaner imports
pub use error::{RateError, RateResult};
pub use history::{Snapshot, SnapshotSink, TriggerKind};
pub use notify::{LogNotifier, NoticeKind, Notifier};
pub use pricing::{CostPriceBook, CostPriceSet, MarginSettings};
pub use quote::{BuySell, Origin, RateQuote, RateValue, SourceId, Usable};
pub use source::{BrokerQuote, RateSource, RawPayload};
