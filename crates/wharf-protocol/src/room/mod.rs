//! Room state machine: configuration, id generation, durable-storage
//! boundary, and the scheduler itself.

pub mod config;
pub mod id;
pub mod state;
pub mod store;

pub use config::RoomConfig;
pub use id::{generate_room_id, is_valid_room_id};
pub use state::{
    AdmitOutcome, DepartureOutcome, FillSlotsOutcome, Promotion, ReceiverState, Role, Room,
    SocketAttachment,
};
pub use store::ConfigStore;
