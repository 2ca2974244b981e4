//! Record persistence over the SQL builder, and posted-data normalization.

mod crud;
mod validation;
pub use crud::PgRecordStore;
pub use validation::RequestValidator;
