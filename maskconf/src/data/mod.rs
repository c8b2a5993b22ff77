//! Parameter schema and validated value store.
//!
//! - [`definition`] - Raw nested definition as supplied by the application
//! - [`spec`] - Single parameter description, ranges and value coercion
//! - [`value`] - Canonical parameter values
//! - [`schema`] - Schema parsing and structural validation
//! - [`store`] - Validated value store

/// Raw parameter definitions.
pub mod definition;

/// Parameter descriptions, value ranges and coercion rules.
pub mod spec;

/// Canonical parameter values.
pub mod value;

/// Schema parsing and structural validation.
pub mod schema;

/// Validated value store.
pub mod store;

pub use definition::Definition;
pub use schema::{ConfigSchema, ParameterGroup, ParseOptions, SchemaError};
pub use spec::{ControlKind, InputType, ParameterSpec, ValueError, ValueRange};
pub use store::{StoreError, ValueStore};
pub use value::{Complex, ParamValue};
