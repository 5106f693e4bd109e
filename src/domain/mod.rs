//! Framework-agnostic domain types.

pub mod payment_method;
pub mod transaction;
pub mod wallet;

pub use payment_method::{PaymentMethod, PaymentMethodDetails};
pub use transaction::{
    CallbackOutcome, Transaction, TransactionStatus, TransactionType, TransitionError,
};
pub use wallet::Wallet;
