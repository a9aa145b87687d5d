pub mod executor;
pub mod sender;
pub mod strategy;

pub use executor::Executor;
pub use sender::TransactionSender;
