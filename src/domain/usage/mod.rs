//! Usage auditing domain
//!
//! Append-only records of every authentication attempt plus the aggregation
//! types the reporting queries return.

mod record;
mod repository;

pub use record::{AuthOutcome, UsageAggregate, UsageRecord, UsageRecordId};
pub use repository::{UsageQuery, UsageRepository};
