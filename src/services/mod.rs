pub mod error;
pub mod note_query;
pub mod note_store;
pub mod tag_registry;
pub mod user_service;

pub use error::ServiceError;
pub use note_query::NoteQuery;
pub use note_store::NoteStore;
pub use tag_registry::TagRegistry;
pub use user_service::UserService;
