use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use serde::Deserialize;

use crate::db::models::Group;
use crate::error::{AppError, AppResult};
use crate::media::UploadedImage;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice.";
const EMPTY_FILE: &str = "The submitted file is empty.";
const INVALID_IMAGE: &str = "Upload a valid image.";

/// Raw post form fields as submitted (multipart, since it may carry an image).
#[derive(Debug, Default)]
pub struct PostForm {
    pub text: String,
    /// `None` when the field was not sent at all.
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
}

/// How a submitted form wants the post's group set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupChoice {
    Unchanged,
    Clear,
    Set(i64),
}

impl GroupChoice {
    /// Group for a brand-new post.
    pub fn for_create(self) -> Option<i64> {
        match self {
            GroupChoice::Set(id) => Some(id),
            GroupChoice::Unchanged | GroupChoice::Clear => None,
        }
    }

    /// Group change for an edit: `None` keeps the current group.
    pub fn for_edit(self) -> Option<Option<i64>> {
        match self {
            GroupChoice::Unchanged => None,
            GroupChoice::Clear => Some(None),
            GroupChoice::Set(id) => Some(Some(id)),
        }
    }
}

#[derive(Debug)]
pub struct CleanPost {
    pub text: String,
    pub group: GroupChoice,
    pub image: Option<UploadedImage>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
    pub image: Vec<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.group.is_empty() && self.image.is_empty()
    }
}

/// A `<select>` entry for the group picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub fn group_options(groups: &[Group], selected: Option<i64>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|group| GroupOption {
            id: group.id,
            title: group.title.clone(),
            selected: Some(group.id) == selected,
        })
        .collect()
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(e.body_text())
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "text" => form.text = field.text().await.map_err(bad_multipart)?,
                "group" => form.group = Some(field.text().await.map_err(bad_multipart)?),
                "image" => {
                    let file_name = field
                        .file_name()
                        .map(str::to_string)
                        .filter(|name| !name.is_empty());
                    let data = field.bytes().await.map_err(bad_multipart)?;
                    // Browsers send an empty, nameless part when no file was picked.
                    if file_name.is_some() || !data.is_empty() {
                        form.image = Some(UploadedImage { file_name, data });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Group id the form currently points at, for re-rendering the picker.
    pub fn selected_group(&self) -> Option<i64> {
        self.group.as_deref().and_then(|raw| raw.trim().parse().ok())
    }

    /// Check every field against the known groups; all errors are collected.
    pub fn validate(self, groups: &[Group]) -> Result<CleanPost, PostFormErrors> {
        let mut errors = PostFormErrors::default();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.text.push(REQUIRED.to_string());
        }

        let group = match self.group.as_deref().map(str::trim) {
            None => GroupChoice::Unchanged,
            Some("") => GroupChoice::Clear,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => GroupChoice::Set(id),
                _ => {
                    errors.group.push(INVALID_CHOICE.to_string());
                    GroupChoice::Unchanged
                }
            },
        };

        if let Some(ref image) = self.image {
            if image.data.is_empty() {
                errors.image.push(EMPTY_FILE.to_string());
            } else if !image.is_image() {
                errors.image.push(INVALID_IMAGE.to_string());
            }
        }

        if errors.is_empty() {
            Ok(CleanPost {
                text,
                group,
                image: self.image,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    /// Trimmed comment text, or `None` when blank.
    pub fn cleaned_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}
