//! Switching table and its entries.
//!
//! An entry is created on the first packet or signaling request for an
//! unknown (port, label-or-FEC) pair and removed once its labels are
//! withdrawn in both directions or the links around it are gone.

mod table;
mod types;

pub use table::{EntryId, SwitchingTable};
pub use types::{
    EntryKey, EntryKind, LabelEvent, LabelStackOp, LabelState, PortRole, SwitchingEntry,
};
