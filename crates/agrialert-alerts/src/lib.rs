//! Weather alert subscriptions, scheduling and geofenced dispatch.
//!
//! State lives in explicitly owned objects: a `SubscriptionStore` shared by
//! the `SubscriptionService` (writer) and the `AlertDispatcher` (reader), and
//! an `AlertScheduler` owning one cancellable task per monitored location.

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod geo;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use error::{AlertError, TransportError};
pub use geo::{planar_distance, within_radius, DEFAULT_RADIUS_DEGREES};
pub use pipeline::{AlertPipeline, CheckOutcome, LocationCheck};
pub use scheduler::{AlertScheduler, JobInfo, DEFAULT_INTERVAL_MINUTES};
pub use store::{Subscription, SubscriptionStore};
pub use subscription::{
    subscriber_job_id, SubscriptionService, SubscriptionSettings, SubscriptionStatus,
    SubscriptionView, VerificationSent,
};
