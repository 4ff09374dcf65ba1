use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::domain::{ApplicantRecord, Requirement};

/// Placeholder tokens the composer substitutes. Anything else in braces is kept.
pub const RECOGNIZED_TOKENS: [&str; 9] = [
    "full_name",
    "branch",
    "specialization",
    "phone",
    "username",
    "admin_username",
    "he_or_she",
    "his_or_her",
    "him_or_her",
];

/// Letter body for one requirement kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterTemplate {
    pub requirement: Requirement,
    pub body: String,
    /// Extension of the template resource; generated letters reuse it.
    pub extension: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template for {requirement} not found at {}", path.display())]
    Missing {
        requirement: &'static str,
        path: PathBuf,
    },
    #[error("template at {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Filesystem locations of the two letter templates.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    higher_studies: PathBuf,
    professional: PathBuf,
}

impl TemplateCatalog {
    pub fn new(higher_studies: impl Into<PathBuf>, professional: impl Into<PathBuf>) -> Self {
        Self {
            higher_studies: higher_studies.into(),
            professional: professional.into(),
        }
    }

    pub fn path_for(&self, requirement: Requirement) -> &Path {
        match requirement {
            Requirement::HigherStudies => &self.higher_studies,
            Requirement::Professional => &self.professional,
        }
    }

    /// Read the template for `requirement` from disk. Templates are reread on
    /// every call so edits take effect without a restart.
    pub fn load(&self, requirement: Requirement) -> Result<LetterTemplate, TemplateError> {
        let path = self.path_for(requirement);
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => TemplateError::Missing {
                requirement: requirement.label(),
                path: path.to_path_buf(),
            },
            _ => TemplateError::Malformed {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;

        let body = String::from_utf8(bytes).map_err(|_| TemplateError::Malformed {
            path: path.to_path_buf(),
            reason: "content is not valid UTF-8 text".to_string(),
        })?;
        if body.trim().is_empty() {
            return Err(TemplateError::Malformed {
                path: path.to_path_buf(),
                reason: "template is empty".to_string(),
            });
        }

        Ok(LetterTemplate {
            requirement,
            body,
            extension: path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string),
        })
    }
}

/// Subject/object/possessive forms. Only two sets exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pronouns {
    pub subject: &'static str,
    pub possessive: &'static str,
    pub object: &'static str,
}

impl Pronouns {
    pub const MASCULINE: Self = Self {
        subject: "he",
        possessive: "his",
        object: "him",
    };
    pub const FEMININE: Self = Self {
        subject: "she",
        possessive: "her",
        object: "her",
    };

    /// `male` in any case selects the masculine set; every other value,
    /// including an absent one, selects the feminine set.
    pub fn for_gender(gender: Option<&str>) -> Self {
        match gender {
            Some(value) if value.trim().eq_ignore_ascii_case("male") => Self::MASCULINE,
            _ => Self::FEMININE,
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterFields {
    pub full_name: String,
    pub branch: String,
    pub specialization: String,
    pub phone: String,
    pub username: String,
    pub admin_username: String,
    pub gender: Option<String>,
}

impl LetterFields {
    /// `branch` is the applicant's own wording; the canonical bucket only picks
    /// the output folder.
    pub fn from_record(record: &ApplicantRecord, admin_username: Option<String>) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            full_name: text(&record.full_name),
            branch: text(&record.branch),
            specialization: text(&record.specialization),
            phone: text(&record.phone),
            username: record.username.0.clone(),
            admin_username: admin_username.unwrap_or_default(),
            gender: record.gender.clone(),
        }
    }

    fn value_of(&self, token: &str, pronouns: Pronouns) -> Option<&str> {
        let value = match token {
            "full_name" => self.full_name.as_str(),
            "branch" => self.branch.as_str(),
            "specialization" => self.specialization.as_str(),
            "phone" => self.phone.as_str(),
            "username" => self.username.as_str(),
            "admin_username" => self.admin_username.as_str(),
            "he_or_she" => pronouns.subject,
            "his_or_her" => pronouns.possessive,
            "him_or_her" => pronouns.object,
            _ => return None,
        };
        Some(value)
    }
}

/// Pure placeholder substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct LetterComposer;

impl LetterComposer {
    /// Single left-to-right pass: substituted values are never rescanned, so a
    /// field containing braces cannot expand into another field.
    pub fn compose(&self, template: &LetterTemplate, fields: &LetterFields) -> String {
        let pronouns = Pronouns::for_gender(fields.gender.as_deref());
        let mut out = String::with_capacity(template.body.len());
        let mut rest = template.body.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                rest = &rest[open..];
                break;
            };

            match fields.value_of(&after[..close], pronouns) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}
