pub mod data_buffer;

pub use data_buffer::DataBuffer;
