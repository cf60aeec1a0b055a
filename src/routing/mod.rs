//! Device selection: logical device masks and the mixer routing table.

mod mask;
mod table;

pub use mask::DeviceMask;
pub use table::{RoutingPath, RoutingTable};
