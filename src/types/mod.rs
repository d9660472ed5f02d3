pub mod analyst;
pub mod message;

pub use analyst::{Analyst, Perspectives, SearchQuery};
pub use message::{Message, Role, get_buffer_string};
