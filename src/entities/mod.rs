//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod appointment_event;
pub mod blocked_slot;
pub mod branch;
pub mod customer;
pub mod session_bundle;
pub mod session_ledger;
pub mod topping;
pub mod treatment;
pub mod usage_event;

// Re-export specific types to avoid conflicts
pub use appointment::{
    AppointmentStatus, Column as AppointmentColumn, Entity as Appointment,
    Model as AppointmentModel,
};
pub use appointment_event::{
    Column as AppointmentEventColumn, Entity as AppointmentEvent, Model as AppointmentEventModel,
};
pub use blocked_slot::{
    Column as BlockedSlotColumn, Entity as BlockedSlot, Model as BlockedSlotModel,
};
pub use branch::{Column as BranchColumn, Entity as Branch, Model as BranchModel};
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use session_bundle::{
    Column as SessionBundleColumn, Entity as SessionBundle, Model as SessionBundleModel,
};
pub use session_ledger::{
    Column as SessionLedgerColumn, Entity as SessionLedger, Model as SessionLedgerModel,
};
pub use topping::{Column as ToppingColumn, Entity as Topping, Model as ToppingModel};
pub use treatment::{Column as TreatmentColumn, Entity as Treatment, Model as TreatmentModel};
pub use usage_event::{Column as UsageEventColumn, Entity as UsageEvent, Model as UsageEventModel};
