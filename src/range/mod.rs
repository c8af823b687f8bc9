pub mod range;
pub mod range_set;

pub use range::Range;
pub use range_set::RangeSet;
