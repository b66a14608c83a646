//! Table: schema + backing representation + dispatchable operations

pub mod schema;
#[allow(clippy::module_inception)]
pub mod table;
pub mod view;

pub use schema::{Field, Schema};
pub use table::Table;
pub use view::{ColumnView, NumericView};
