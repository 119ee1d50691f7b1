pub mod note;
pub mod tag;
pub mod user;

pub use note::{Note, NoteRow};
pub use tag::{NoteTagRow, Tag};
pub use user::User;
