//! Shared primitive types.
mod authorization;
pub use authorization::*;

mod intent;
pub use intent::*;

mod receipt;
pub use receipt::*;

mod sponsorship;
pub use sponsorship::*;

mod submission;
pub use submission::*;

mod user_op;
pub use user_op::*;
