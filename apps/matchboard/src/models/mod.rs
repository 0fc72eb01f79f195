pub mod candidate;
pub mod notification;

pub use candidate::{normalize_skill, Candidate, JobPosting};
pub use notification::{Notification, NotificationKind, NotificationPayload};
