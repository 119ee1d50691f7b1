/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Storage operations performed by the services.
/// Carried on storage failures so the log line names what was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateNote,
    GetNote,
    UpdateNote,
    DeleteNote,
    ListNotes,
    ListTags,
    ResolveTag,
    RegisterUser,
    Login,
    LoadUser,
    DeleteUser,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateNote => "create_note",
            Operation::GetNote => "get_note",
            Operation::UpdateNote => "update_note",
            Operation::DeleteNote => "delete_note",
            Operation::ListNotes => "get_notes",
            Operation::ListTags => "get_tags",
            Operation::ResolveTag => "resolve_tag",
            Operation::RegisterUser => "register",
            Operation::Login => "login",
            Operation::LoadUser => "load_user",
            Operation::DeleteUser => "delete_user",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
