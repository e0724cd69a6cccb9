mod connection;
mod introspection;
mod model;

pub use connection::*;
pub use introspection::*;
pub use model::*;
