use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of an applicant row; every review command is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Purpose the applicant requested the letter for. Selects the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    HigherStudies,
    Professional,
}

impl Requirement {
    /// Parse the stored column value. `Higher Studies` is the spelling older
    /// sign-up forms wrote.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "HigherStudies" | "Higher Studies" => Some(Self::HigherStudies),
            "Professional" => Some(Self::Professional),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HigherStudies => "HigherStudies",
            Self::Professional => "Professional",
        }
    }
}

/// Persisted applicant row. Profile columns are nullable because they are added
/// to the table after sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub username: Username,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub full_name: Option<String>,
    pub branch: Option<String>,
    pub specialization: Option<String>,
    pub requirement: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

impl ApplicantRecord {
    /// Pending record as written by sign-up, before any profile details exist.
    pub fn registered(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: Username::new(username),
            email: email.into(),
            password: password.into(),
            full_name: None,
            branch: None,
            specialization: None,
            requirement: None,
            gender: None,
            phone: None,
        }
    }

    pub fn details(&self) -> ProfileUpdate {
        ProfileUpdate {
            full_name: self.full_name.clone(),
            branch: self.branch.clone(),
            specialization: self.specialization.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Personal fields collected by the details form. `None` means "not supplied";
/// the repository keeps the stored value for those columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Column names of the personal fields, in form order.
    pub const FIELDS: [&'static str; 4] = ["full_name", "branch", "specialization", "phone"];

    /// Trim every field and treat blank input as not supplied.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        }

        Self {
            full_name: clean(self.full_name),
            branch: clean(self.branch),
            specialization: clean(self.specialization),
            phone: clean(self.phone),
        }
    }

    pub(crate) fn values(&self) -> [Option<&str>; 4] {
        [
            self.full_name.as_deref(),
            self.branch.as_deref(),
            self.specialization.as_deref(),
            self.phone.as_deref(),
        ]
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::FIELDS
            .iter()
            .zip(self.values())
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Every field supplied; returns the complete set for a full overwrite.
    pub fn complete(&self) -> Option<ProfileDetails> {
        Some(ProfileDetails {
            full_name: self.full_name.clone()?,
            branch: self.branch.clone()?,
            specialization: self.specialization.clone()?,
            phone: self.phone.clone()?,
        })
    }
}

/// Fully specified personal details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub full_name: String,
    pub branch: String,
    pub specialization: String,
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_accepts_legacy_spelling() {
        assert_eq!(
            Requirement::parse("Higher Studies"),
            Some(Requirement::HigherStudies)
        );
        assert_eq!(
            Requirement::parse(" Professional "),
            Some(Requirement::Professional)
        );
        assert_eq!(Requirement::parse("professional"), None);
        assert_eq!(Requirement::parse("Unknown"), None);
    }

    #[test]
    fn normalized_treats_blank_as_missing() {
        let update = ProfileUpdate {
            full_name: Some("  Alice Rao ".to_string()),
            branch: Some("   ".to_string()),
            specialization: None,
            phone: Some("555-0101".to_string()),
        }
        .normalized();

        assert_eq!(update.full_name.as_deref(), Some("Alice Rao"));
        assert_eq!(update.missing_fields(), vec!["branch", "specialization"]);
        assert!(update.complete().is_none());
    }

    #[test]
    fn password_is_not_serialized() {
        let record = ApplicantRecord::registered("alice23", "alice@example.edu", "hunter2");
        let json = serde_json::to_value(&record).expect("serializes");
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice23");
    }
}
