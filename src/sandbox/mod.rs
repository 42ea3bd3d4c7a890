//! Path containment, policy rule evaluation, and bounded file IO for the sandbox root.

mod io;
mod resolve;
mod rules;

pub use io::{BoundedText, read_bounded};
pub(crate) use io::write_bytes_atomic;
pub(crate) use resolve::canonicalize_lenient;
pub use resolve::{SandboxPath, URI_SCHEME, resolve};
pub use rules::{PathRules, is_allowed};
