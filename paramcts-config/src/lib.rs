//! Callstring templates, instance selection and the HAL-JSON field subset
//! this system reads (spec.md §4.A, §4.B, §6).

mod callstring;
pub mod error;
mod hal_json;
mod instance_selector;

pub use callstring::Callstring;
pub use error::{ArgumentError, CallstringError, ConfigError, InstanceError, VariableError};
pub use hal_json::{load as load_hal_json, LoadedScenario, INTERRUPTED_PATTERN};
pub use instance_selector::InstanceSelector;
