pub mod channels;
pub mod videos;

pub use channels::*;
pub use videos::*;
