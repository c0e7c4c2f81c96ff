mod schema;
mod tuple;
mod value;

pub use schema::{Column, Schema};
pub use tuple::Tuple;
pub use value::{DataType, Value};
