pub mod scanner;
pub mod iter;
pub mod row;
pub mod batch;
pub mod chain;

pub use batch::BatchScanner;
pub use chain::ChainScanner;
pub use iter::IterScanner;
pub use row::ColumnUnionRowScanner;
pub use scanner::{collect_entries, collect_nested, BoxScanner, ColumnScanner, RowScanner, Scanner};
