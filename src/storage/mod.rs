pub mod cursor;
pub mod node;
pub mod pager;
pub mod row;
pub mod table;

pub use cursor::Cursor;
pub use row::Row;
pub use table::{dump_tree, insert_row, select_rows, Table};
