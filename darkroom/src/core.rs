pub use xid::new as new_xid;
pub use xid::Id as Xid;

pub type DateTime = chrono::DateTime<chrono::Utc>;
pub use bincode;
pub use bytes::Bytes;
pub use chrono::{Duration, Utc};

pub mod analysis;
pub mod artifact;
pub mod job;
pub mod job_processor;
pub mod job_store;
pub mod memory;
pub mod mixins;
pub mod producer;
