pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::LogQuery;
pub use record::{
    LineItemRecord, LogEntryRecord, NewOrder, OrderFlag, OrderNumberSequenceRecord, OrderRecord,
    OrderUpdate, PaymentRecord, StockChange, StoredOrder,
};
pub use store::{OrderStore, OrderStoreExt, OrderValidationError, validate_new_order};
