pub mod primitive_type;
pub mod typed_value;

pub use primitive_type::PrimitiveType;
pub use typed_value::{Scalar, TypedValue};
