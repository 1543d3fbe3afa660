pub mod item;
pub mod reservation;
pub mod tasks;
pub mod worker;

pub use item::{Item, ItemLedger, ItemLocation, ItemStore, NodeSlot, Perishable};
pub use reservation::Reservations;
pub use tasks::{Destination, FrameKind, TaskFrame, TaskInstance, TaskKind, TaskState};
pub use worker::{Movement, Worker};
