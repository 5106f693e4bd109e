pub mod in_memory;
pub mod postgres_transaction_repository;
pub mod postgres_wallet_repository;

pub use in_memory::{InMemoryTransactionRepository, InMemoryWalletRepository};
pub use postgres_transaction_repository::PostgresTransactionRepository;
pub use postgres_wallet_repository::PostgresWalletRepository;
