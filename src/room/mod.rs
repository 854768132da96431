//! Rooms
//!
//! The state machine itself lives in [`model`]; [`actor`] runs one room per
//! task and [`registry`] keeps track of them.

pub mod actor;
pub mod model;
pub mod registry;

pub use actor::{RoomActor, RoomCommand, RoomHandle, RoomServices};
pub use model::{
    CloseReason, GameState, JoinOutcome, LeaveOutcome, NewRoom, Player, RankedSeat, Room,
    RoomEvent, RoomTimings, Timer, TimerKind,
};
pub use registry::{CreateRoomRequest, CreatedRoom, RoomRegistry, DEFAULT_CAPACITY};
