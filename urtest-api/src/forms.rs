//! Submitted forms and their validation
//!
//! Browsers post `application/x-www-form-urlencoded` bodies (or multipart for
//! uploads) where every value is a string. Each form is deserialized as
//! strings, normalized (trimmed), then checked; all problems are collected
//! into one [`ApiError::ValidationError`] so the page can show every message
//! at once. Database-backed checks (uniqueness, existing language ids) are
//! done by the handlers on top of these.

use axum::extract::{FromRequest, Multipart};
use bytes::Bytes;
use serde::Deserialize;
use std::borrow::Cow;
use urtest_shared::{
    auth::password::validate_password_strength,
    models::bug::{BugSeverity, BugStatus},
    storage::sanitize_filename,
};
use validator::{Validate, ValidationError};

use crate::error::{validation_details, ApiError, ApiResult, ValidationErrorDetail};

const REQUIRED: &str = "This field is required.";

/// `application/x-www-form-urlencoded` body extractor
///
/// Same as [`axum::Form`], except that a missing content type or an
/// undecodable body is answered with the usual [`ApiError`] JSON.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct FormBody<T>(pub T);

fn detail(field: &str, message: impl Into<String>) -> ValidationErrorDetail {
    ValidationErrorDetail {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Problems found by the derive-based rules
fn problems(form: &impl Validate) -> Vec<ValidationErrorDetail> {
    match form.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => validation_details(&errors),
    }
}

fn finish(details: Vec<ValidationErrorDetail>) -> ApiResult<()> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(details))
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if username.chars().all(allowed) {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message(Cow::Borrowed(
            "Letters, digits and _ . - only.",
        )))
    }
}

/// `POST /login`
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Page to return to after logging in
    pub next: Option<String>,
}

/// Tester and customer registration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(
        length(min = 3, max = 30, message = "Between 3 and 30 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 characters."))]
    pub display_name: String,

    /// Legal customers only
    #[validate(length(min = 1, max = 200, message = "Between 1 and 200 characters."))]
    pub organization: Option<String>,
}

impl RegisterForm {
    /// Trims every field except the password; a blank organization is absent
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            display_name: self.display_name.trim().to_string(),
            organization: self
                .organization
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty()),
        }
    }

    /// Field checks; `organization_required` is set for legal customers
    pub fn check(&self, organization_required: bool) -> ApiResult<()> {
        let mut details = problems(self);

        if let Err(message) = validate_password_strength(&self.password) {
            details.push(detail("password", message));
        }
        if organization_required && self.organization.is_none() {
            details.push(detail("organization", REQUIRED));
        }

        finish(details)
    }
}

/// Cleaned `ProjectForm`
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewProject {
    #[validate(length(min = 1, max = 50, message = "At most 50 characters."))]
    pub name: String,

    #[validate(range(min = 0, message = "Must not be negative."))]
    pub size: i64,

    #[validate(length(min = 1, message = "Choose at least one language."))]
    pub program_languages: Vec<i32>,

    #[validate(length(min = 1, message = "Choose at least one language."))]
    pub doc_languages: Vec<i32>,

    pub description: String,
}

/// Raw `ProjectForm`
///
/// Language choices are checkboxes, so the same key repeats once per
/// selected language. The body is therefore read as ordered pairs rather
/// than a struct.
#[derive(Debug, Default, Clone)]
pub struct ProjectForm {
    pub name: String,
    pub size: String,
    pub program_languages: Vec<String>,
    pub doc_languages: Vec<String>,
    pub description: String,
}

impl ProjectForm {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = ProjectForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "name" => form.name = value,
                "size" => form.size = value,
                "program_languages" => form.program_languages.push(value),
                "doc_languages" => form.doc_languages.push(value),
                "description" => form.description = value,
                _ => {}
            }
        }
        form
    }

    pub fn parse(body: &[u8]) -> ApiResult<Self> {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .map(Self::from_pairs)
            .map_err(|e| ApiError::BadRequest(format!("Invalid form body: {}", e)))
    }

    /// Converts and validates the submitted strings
    pub fn clean(self) -> ApiResult<NewProject> {
        let mut extra = Vec::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            extra.push(detail("name", REQUIRED));
        }

        let size = match self.size.trim() {
            "" => {
                extra.push(detail("size", REQUIRED));
                0
            }
            raw => raw.parse::<i64>().unwrap_or_else(|_| {
                extra.push(detail("size", "Enter a whole number."));
                0
            }),
        };

        let program_languages = parse_ids("program_languages", &self.program_languages, &mut extra);
        let doc_languages = parse_ids("doc_languages", &self.doc_languages, &mut extra);

        let project = NewProject {
            name,
            size,
            program_languages,
            doc_languages,
            description: self.description.trim().to_string(),
        };

        let mut details = problems(&project);
        if project.name.is_empty() {
            // Reported as required above
            details.retain(|d| d.field != "name");
        }
        details.append(&mut extra);

        finish(details)?;
        Ok(project)
    }
}

fn parse_ids(field: &str, raw: &[String], extra: &mut Vec<ValidationErrorDetail>) -> Vec<i32> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        match value.trim().parse::<i32>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => {
                extra.push(detail(
                    field,
                    format!("Select a valid choice. {} is not one of the available choices.", value),
                ));
            }
        }
    }
    ids
}

/// `BugForm`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BugForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 characters."))]
    pub short_description: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 600, message = "Between 1 and 600 characters."))]
    pub finding_description: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 600, message = "Between 1 and 600 characters."))]
    pub full_description: String,

    /// Severity level `1..=4`; missing means the default level
    #[serde(default)]
    pub severity: String,
}

impl BugForm {
    pub fn clean(self) -> ApiResult<(Self, BugSeverity)> {
        let form = Self {
            short_description: self.short_description.trim().to_string(),
            finding_description: self.finding_description.trim().to_string(),
            full_description: self.full_description.trim().to_string(),
            severity: self.severity.trim().to_string(),
        };

        let mut extra = Vec::new();
        let severity = if form.severity.is_empty() {
            BugSeverity::default()
        } else {
            form.severity
                .parse::<i16>()
                .ok()
                .and_then(BugSeverity::from_level)
                .unwrap_or_else(|| {
                    extra.push(detail("severity", "Select a valid choice."));
                    BugSeverity::default()
                })
        };

        let mut details = problems(&form);
        details.append(&mut extra);
        finish(details)?;
        Ok((form, severity))
    }
}

/// `BugStatusForm`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BugStatusForm {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "At most 100 characters."))]
    pub status_comment: String,
}

impl BugStatusForm {
    pub fn clean(self) -> ApiResult<(BugStatus, String)> {
        let form = Self {
            status: self.status.trim().to_string(),
            status_comment: self.status_comment.trim().to_string(),
        };

        let mut extra = Vec::new();
        let status = match BugStatus::parse(&form.status) {
            Some(status) => status,
            None => {
                let message = if form.status.is_empty() {
                    REQUIRED.to_string()
                } else {
                    format!("Select a valid choice. {} is not one of the available choices.", form.status)
                };
                extra.push(detail("status", message));
                BugStatus::default()
            }
        };

        let mut details = problems(&form);
        details.append(&mut extra);
        finish(details)?;
        Ok((status, form.status_comment))
    }
}

/// Multipart upload: a `file` part and an optional `comment`
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// Sanitized final path component of the client's filename
    pub filename: String,
    pub data: Bytes,
    pub comment: String,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut file: Option<(Option<String>, Bytes)> = None;
        let mut comment = String::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let filename = field.file_name().map(str::to_string);
                    let data = field.bytes().await?;
                    file = Some((filename, data));
                }
                Some("comment") => comment = field.text().await?,
                _ => {}
            }
        }

        let (filename, data) = match file {
            Some((Some(name), data)) if !name.is_empty() => (name, data),
            _ => return Err(ApiError::field("file", "No file was submitted.")),
        };

        if data.is_empty() {
            return Err(ApiError::field("file", "The submitted file is empty."));
        }

        Ok(Self {
            filename: sanitize_filename(&filename)?,
            data,
            comment: comment.trim().to_string(),
        })
    }
}
