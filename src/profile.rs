use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    FirstName,
    LastName,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("{field:?}: can't be empty")]
    Empty { field: ProfileField },
    #[error("'{0}' is not a valid email")]
    InvalidEmail(String),
}

impl ProfileDetails {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Returns a normalised copy (trimmed fields, blank picture dropped).
    pub fn validated(&self) -> Result<ProfileDetails, ProfileError> {
        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(ProfileError::Empty {
                field: ProfileField::FirstName,
            });
        }
        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            return Err(ProfileError::Empty {
                field: ProfileField::LastName,
            });
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ProfileError::Empty {
                field: ProfileField::Email,
            });
        }
        if !EMAIL_PATTERN.is_match(email) {
            return Err(ProfileError::InvalidEmail(email.to_string()));
        }
        let picture_url = self
            .picture_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Ok(ProfileDetails {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            picture_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn details(first: &str, last: &str, email: &str) -> ProfileDetails {
        ProfileDetails {
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            picture_url: Some("  ".into()),
        }
    }

    #[test]
    fn validated_trims_and_drops_blank_picture() -> anyhow::Result<()> {
        let profile = details(" Ben ", "Wright ", "ben@example.com").validated()?;
        assert_eq!(profile.display_name(), "Ben Wright");
        assert!(profile.picture_url.is_none());
        Ok(())
    }

    #[test]
    fn empty_names_are_rejected() {
        assert_matches!(
            details("", "Wright", "ben@example.com").validated(),
            Err(ProfileError::Empty { field: ProfileField::FirstName })
        );
        assert_matches!(
            details("Ben", "  ", "ben@example.com").validated(),
            Err(ProfileError::Empty { field: ProfileField::LastName })
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        assert_matches!(
            details("Ben", "Wright", "ben.example.com").validated(),
            Err(ProfileError::InvalidEmail(_))
        );
    }

    #[test]
    fn picture_url_is_omitted_from_json_when_absent() -> anyhow::Result<()> {
        let profile = details("Ben", "Wright", "ben@example.com").validated()?;
        let json = serde_json::to_string(&profile)?;
        assert!(!json.contains("picture_url"));
        Ok(())
    }
}
