pub mod range_tombstone;

pub use range_tombstone::RangeTombstone;
