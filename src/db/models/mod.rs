//! Database models split into domain-specific modules.

pub mod attendance;
pub mod audit;
pub mod bill;
pub mod leave;
pub mod plan;
pub mod session;

pub use attendance::*;
pub use audit::*;
pub use bill::*;
pub use leave::*;
pub use plan::*;
pub use session::*;
