//! Terminal output with CI fallback
//!
//! Status goes to stderr so that stdout stays machine-readable: `find`
//! prints nothing there but the binary path.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{key_value, remark, step_ok};
pub use progress::TaskSpinner;
pub use prompts::confirm;
