pub mod notes;
pub mod users;
pub mod validate;

pub use notes::{NoteCreate, NoteFilter, NoteOut, NoteUpdate, TagOut};
pub use users::{LoginForm, Token, UserCreate, UserOut};
pub use validate::{FieldErrors, Validate};
