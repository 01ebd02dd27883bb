//! Online-user detection for collaborative rooms.

pub mod aggregator;
pub mod memory;
pub mod probe;
pub mod record;
pub mod room;
pub mod timer;

pub use aggregator::PresenceAggregator;
pub use memory::MemoryRoomHub;
pub use probe::{ProbeSettings, probe_room};
pub use record::{PresenceRecord, RoomBinding};
pub use room::{DISPLAY_NAME_FIELD, MembershipChange, RoomEngine, RoomError, RoomSession};
pub use timer::{ManualTimer, ObservationTimer, TokioTimer};
