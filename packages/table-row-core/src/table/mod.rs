//! Table schemas, column definitions and generic rows.

mod column;
mod edit;
mod relation;
mod row;
mod schema;
pub(crate) mod validation;
mod value;

pub use column::{ColumnDefinition, ColumnType, Mandatory, PickSource, RowPredicate};
pub use edit::{CellInput, EditOutcome};
pub use relation::Relation;
pub use row::{PutOutcome, RowStatus, TableRow};
pub use schema::{SchemaBuilder, TableSchema};
pub use value::{ColumnId, ColumnValue, RowId};
