//! # maskconf
//!
//! Declarative settings panels: describe parameters once, get a validated value store and
//! controls that stay in sync with it.
//!
//! ## Features
//!
//! - Nested group → parameter definitions from JSON values, JSON text or TOML text
//! - Integer, float, complex, string and bit-flag parameters with ranges, steps and enumerations
//! - A value store that validates and coerces every write, with atomic batch updates
//! - A toolkit-neutral [`WidgetBinding`] contract for two-way control synchronization
//! - A [Cursive](https://github.com/gyscos/cursive) adapter and dialog runner (`tui` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use maskconf::data::{ConfigSchema, ParamValue, ValueStore};
//! use serde_json::json;
//!
//! let schema = ConfigSchema::from_value(&json!({
//!     "Calculation": {
//!         "maxIter": { "inputType": "integer", "valueRange": [100, 4000, 10], "initialValue": 250 }
//!     }
//! }))
//! .unwrap();
//!
//! let mut store = ValueStore::new(schema);
//! store.set("maxIter", "1000").unwrap();
//! assert_eq!(store["maxIter"], ParamValue::Integer(1000));
//! assert!(store.set("maxIter", 5000).is_err());
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Schema parsing, value coercion and the value store
//! - [`binding`] - Widget synchronization contract
//! - [`mask`] - Building sets of bound controls
//! - `ui` - Cursive controls (requires `tui` feature)
//! - `run` - Modal settings dialog (requires `tui` feature)

#[macro_use]
extern crate log;

/// Schema parsing, value coercion and the value store.
pub mod data;

pub mod binding;

pub mod mask;

/// Cursive controls implementing [`WidgetBinding`].
#[cfg(feature = "tui")]
pub mod ui;

/// Modal settings dialog on top of the cursive controls.
#[cfg(feature = "tui")]
pub mod run;

pub use binding::{Binding, SharedWidget, WidgetBinding, shared};
pub use data::{ConfigSchema, ParamValue, ValueStore};
pub use mask::{Mask, MaskBuilder, MaskError, WidgetFactory};
#[cfg(feature = "tui")]
pub use run::*;
pub use serde_json::Value;
