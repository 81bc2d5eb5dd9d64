pub mod import;
pub mod serve;
pub mod sync;

// Re-export command functions for convenience
pub use import::import;
pub use serve::{serve, ServeParams};
pub use sync::sync;
