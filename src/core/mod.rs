pub mod clock;
pub mod error;
pub mod ids;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, StoreError};
pub use ids::{ActivityId, UserId};
pub use types::{
    derive_instance_id, Event, EventKind, InstanceRecord, StoreSnapshot, INSTANCE_ID_PREFIX,
};
