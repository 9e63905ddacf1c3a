mod money;
mod transaction;
mod wallet;

pub use money::*;
pub use transaction::*;
pub use wallet::*;
