use serde::{Deserialize, Serialize};

use super::validate::{check_length, finish, FieldErrors, Validate};
use crate::database::models::{Note, Tag};

pub const TITLE_MAX: usize = 200;
pub const TAG_NAME_MAX: usize = 50;

/// POST /notes body
#[derive(Debug, Clone, Deserialize)]
pub struct NoteCreate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl NoteCreate {
    pub fn tag_names(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

impl Validate for NoteCreate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "title", &self.title, 1, Some(TITLE_MAX));
        check_length(&mut errors, "content", &self.content, 1, None);
        check_tag_names(&mut errors, self.tag_names());
        finish(errors)
    }
}

/// PUT /notes/{id} body. Absent (or null) fields are left untouched;
/// a present `tags` list, even an empty one, replaces the whole tag set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl Validate for NoteUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            check_length(&mut errors, "title", title, 1, Some(TITLE_MAX));
        }
        if let Some(content) = &self.content {
            check_length(&mut errors, "content", content, 1, None);
        }
        if let Some(tags) = &self.tags {
            check_tag_names(&mut errors, tags);
        }
        finish(errors)
    }
}

fn check_tag_names(errors: &mut FieldErrors, names: &[String]) {
    for (i, name) in names.iter().enumerate() {
        check_length(errors, &format!("tags[{}]", i), name, 1, Some(TAG_NAME_MAX));
    }
}

/// GET /notes query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
}

impl NoteFilter {
    /// Empty strings count as "no filter".
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref().filter(|s| !s.is_empty())
    }
}

/// Tag as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOut {
    pub id: i64,
    pub name: String,
}

impl From<Tag> for TagOut {
    fn from(tag: Tag) -> Self {
        Self { id: tag.id, name: tag.name }
    }
}

/// Note as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteOut {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub user_id: i64,
    pub tags: Vec<TagOut>,
}

impl From<Note> for NoteOut {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            updated_at: note.updated_at,
            user_id: note.user_id,
            tags: note.tags.into_iter().map(TagOut::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str, content: &str, tags: Option<Vec<&str>>) -> NoteCreate {
        NoteCreate {
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.map(|t| t.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn accepts_valid_note() {
        assert!(create("Groceries", "milk, eggs", Some(vec!["home", "errand"])).validate().is_ok());
        assert!(create("Groceries", "milk, eggs", None).validate().is_ok());
    }

    #[test]
    fn rejects_title_bounds() {
        let errors = create("", "body", None).validate().unwrap_err();
        assert!(errors.contains_key("title"));

        let long = "x".repeat(TITLE_MAX + 1);
        let errors = create(&long, "body", None).validate().unwrap_err();
        assert_eq!(errors["title"], "must be at most 200 characters");

        let max = "x".repeat(TITLE_MAX);
        assert!(create(&max, "body", None).validate().is_ok());
    }

    #[test]
    fn rejects_empty_content_and_bad_tags() {
        let long_tag = "t".repeat(TAG_NAME_MAX + 1);
        let errors = create("ok", "", Some(vec!["fine", "", long_tag.as_str()]))
            .validate()
            .unwrap_err();
        assert!(errors.contains_key("content"));
        assert!(errors.contains_key("tags[1]"));
        assert!(errors.contains_key("tags[2]"));
        assert!(!errors.contains_key("tags[0]"));
    }

    #[test]
    fn rejects_nul_in_any_text_field() {
        let errors = create("a\u{0}b", "body\u{0}", Some(vec!["ok", "x\u{0}"]))
            .validate()
            .unwrap_err();
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("content"));
        assert!(errors.contains_key("tags[1]"));
        assert!(!errors.contains_key("tags[0]"));

        let update = NoteUpdate {
            title: Some("\u{0}".to_string()),
            ..Default::default()
        };
        assert!(update.validate().unwrap_err().contains_key("title"));
    }

    #[test]
    fn update_only_checks_present_fields() {
        assert!(NoteUpdate::default().validate().is_ok());

        let update = NoteUpdate {
            content: Some("new body".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = NoteUpdate {
            title: Some(String::new()),
            tags: Some(vec![]),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("title"));
    }

    #[test]
    fn update_distinguishes_missing_and_empty_tags() {
        let missing: NoteUpdate = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert!(missing.tags.is_none());

        let null: NoteUpdate = serde_json::from_str(r#"{"tags": null}"#).unwrap();
        assert!(null.tags.is_none());

        let empty: NoteUpdate = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        assert_eq!(empty.tags, Some(vec![]));
    }

    #[test]
    fn empty_filters_are_ignored() {
        let filter = NoteFilter {
            search: Some(String::new()),
            tag: Some("work".to_string()),
        };
        assert_eq!(filter.search(), None);
        assert_eq!(filter.tag(), Some("work"));
    }
}
