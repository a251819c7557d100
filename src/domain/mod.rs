mod expense;
mod ledger;
mod money;
mod trip;
mod user;

pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use trip::*;
pub use user::*;
