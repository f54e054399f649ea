pub mod table;

pub use table::{render_table, TableRenderer};
