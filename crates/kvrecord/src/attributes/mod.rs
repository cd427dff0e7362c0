//! # Attribute System
//!
//! Records hold their fields in an [`AttributeSet`] governed by a per-model
//! [`AttributeSchema`]. The schema is declared once when the model type is
//! built and never changes afterwards.
//!
//! - **Type definitions**: [`AttrValue`] is the runtime value of a field
//! - **Specifications**: [`AttributeSpec`] names a field, its [`AttributeKind`],
//!   its default and whether it is read-only
//! - **Casting**: assigned input is coerced through the kind (`"5"` becomes
//!   `5` for an integer field); undeclared names are rejected
//! - **Filtering**: [`AttrFilter`] matches records by string-form equality
//!
//! ## Attribute Kinds
//!
//! | Kind | Stored as | Accepts |
//! |------|-----------|---------|
//! | `Boolean` | `true`/`false` | bools, `0`/`1`, `"yes"`, `"off"`, ... |
//! | `Integer` | number | numbers (truncated), numeric strings |
//! | `Float` | number | numbers, numeric strings |
//! | `String` | string | anything, scalars stringified |
//! | `DateTime` | RFC 3339 string | RFC 3339 strings, unix seconds |
//! | `Json` | any JSON | anything |
//!
//! The names `id`, `created_at` and `updated_at` are reserved; they live on
//! the record itself and are persisted next to the attribute mapping.

mod filter;
mod set;
mod spec;
mod value;

pub use filter::{AttrFilter, FilterOp};
pub use set::{map_to_json, AttrMap, AttributeSet};
pub use spec::{AttributeKind, AttributeSchema, AttributeSpec, RESERVED_ATTRIBUTES};
pub use value::AttrValue;
