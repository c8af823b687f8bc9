pub mod generation;
pub mod flusher;
pub mod one_tier;

pub use one_tier::OneTierDatabase;
