use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::links::{CatalogError, StoredLink};
use crate::profile::ProfileDetails;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("nothing to preview: {0}")]
    NotFound(&'static str),
    #[error("stored links are out of date with the platform catalog")]
    Integrity(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewLink {
    pub label: &'static str,
    pub color: String,
    pub url: String,
}

/// Read-only public page for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPage {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    pub links: Vec<PreviewLink>,
}

/// Builds the public page from persisted data, in stored order. A retired
/// platform identifier fails the whole page.
pub fn build(
    profile: Option<&ProfileDetails>,
    stored: &[StoredLink],
) -> Result<PublicPage, PreviewError> {
    let profile = profile.ok_or(PreviewError::NotFound("profile details missing"))?;
    if stored.is_empty() {
        return Err(PreviewError::NotFound("no links saved"));
    }
    let links = stored
        .iter()
        .map(|link| {
            let record = link.resolve()?;
            let info = record.platform.info();
            Ok(PreviewLink {
                label: info.label,
                color: info.background.to_hex(),
                url: record.link,
            })
        })
        .collect::<Result<Vec<_>, PreviewError>>()?;
    Ok(PublicPage {
        name: profile.display_name(),
        email: profile.email.clone(),
        picture_url: profile.picture_url.clone(),
        links,
    })
}

pub fn render(
    profile: Option<&ProfileDetails>,
    stored: &[StoredLink],
) -> Result<String, PreviewError> {
    Ok(build(profile, stored)?.to_string())
}

impl fmt::Display for PublicPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        write!(f, "{}", self.email)?;
        if let Some(picture) = &self.picture_url {
            write!(f, "\n{picture}")?;
        }
        writeln!(f)?;
        for (idx, link) in self.links.iter().enumerate() {
            write!(f, "\n{}. {:<15} {}", idx + 1, link.label, link.url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn profile() -> ProfileDetails {
        ProfileDetails {
            first_name: "Ben".into(),
            last_name: "Wright".into(),
            email: "ben@example.com".into(),
            picture_url: None,
        }
    }

    fn stored(platform: &str, link: &str) -> StoredLink {
        StoredLink {
            platform: platform.into(),
            link: link.into(),
        }
    }

    #[test]
    fn renders_links_in_stored_order() -> anyhow::Result<()> {
        let page = render(
            Some(&profile()),
            &[
                stored("github", "https://github.com/ben"),
                stored("youtube", "https://youtube.com/@ben"),
                stored("stack-overflow", "https://stackoverflow.com/u/1"),
            ],
        )?;
        insta::assert_snapshot!(page, @r###"
        Ben Wright
        ben@example.com

        1. GitHub          https://github.com/ben
        2. YouTube         https://youtube.com/@ben
        3. Stack Overflow  https://stackoverflow.com/u/1
        "###);
        Ok(())
    }

    #[test]
    fn json_view_carries_brand_colours() -> anyhow::Result<()> {
        let page = build(Some(&profile()), &[stored("gitlab", "https://gitlab.com/ben")])?;
        insta::assert_json_snapshot!(page, @r###"
        {
          "name": "Ben Wright",
          "email": "ben@example.com",
          "links": [
            {
              "label": "GitLab",
              "color": "#EB4925",
              "url": "https://gitlab.com/ben"
            }
          ]
        }
        "###);
        Ok(())
    }

    #[test]
    fn missing_profile_or_links_is_not_found() {
        assert_matches!(
            render(None, &[stored("github", "x")]),
            Err(PreviewError::NotFound(_))
        );
        assert_matches!(render(Some(&profile()), &[]), Err(PreviewError::NotFound(_)));
    }

    #[test]
    fn retired_platform_is_an_integrity_failure() {
        assert_matches!(
            render(Some(&profile()), &[stored("github", "x"), stored("orkut", "y")]),
            Err(PreviewError::Integrity(CatalogError::UnknownPlatform(id))) if id == "orkut"
        );
    }
}
