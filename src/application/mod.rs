// Application layer - orchestration of wallet and transaction operations.

pub mod error;
pub mod transactions;
pub mod wallets;

pub use error::*;
pub use transactions::*;
pub use wallets::*;
