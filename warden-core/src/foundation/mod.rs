pub mod constants;
pub mod error;
pub mod types;
pub mod util;

pub use constants::*;
pub use error::{ErrorCode, Result, WardenError};
pub use types::{BlockNumber, Wei, ETHER, GWEI};
