//! Domain services for the GPS tracker.
//!
//! Services contain business logic that operates on domain models.

pub mod access;
pub mod aggregation;
pub mod registration;
pub mod source;

pub use access::AccessGate;
pub use aggregation::{AggregationContext, AggregationService};
pub use registration::{prepare_new_device, register_device};
pub use source::{MockTrackingSource, SourceError, TrackingSource};
