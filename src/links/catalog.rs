use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use thiserror::Error;

/// Bumped whenever an identifier is added to or retired from [`Platform`].
pub const CATALOG_VERSION: u32 = 1;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Platform {
    #[default]
    Github,
    FrontendMentor,
    Twitter,
    Linkedin,
    Youtube,
    Facebook,
    Twitch,
    Devto,
    Codewars,
    Codepen,
    Freecodecamp,
    Gitlab,
    Hashnode,
    StackOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub label: &'static str,
    pub icon: &'static str,
    pub background: Rgb,
    /// Only set for light backgrounds; everything else renders white text.
    pub foreground: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown platform identifier '{0}'")]
    UnknownPlatform(String),
}

// Declaration order must match `Platform`'s variant order.
static ENTRIES: [PlatformInfo; 14] = [
    PlatformInfo {
        platform: Platform::Github,
        label: "GitHub",
        icon: "icon-github",
        background: Rgb(0x1A, 0x1A, 0x1A),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::FrontendMentor,
        label: "Frontend Mentor",
        icon: "icon-frontend-mentor",
        background: Rgb(0xFF, 0xFF, 0xFF),
        foreground: Some(Rgb(0x33, 0x33, 0x33)),
    },
    PlatformInfo {
        platform: Platform::Twitter,
        label: "Twitter",
        icon: "icon-twitter",
        background: Rgb(0x43, 0xB7, 0xE9),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Linkedin,
        label: "LinkedIn",
        icon: "icon-linkedin",
        background: Rgb(0x2D, 0x68, 0xFF),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Youtube,
        label: "YouTube",
        icon: "icon-youtube",
        background: Rgb(0xEE, 0x39, 0x39),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Facebook,
        label: "Facebook",
        icon: "icon-facebook",
        background: Rgb(0x24, 0x42, 0xAC),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Twitch,
        label: "Twitch",
        icon: "icon-twitch",
        background: Rgb(0xEE, 0x3F, 0xC8),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Devto,
        label: "Dev.to",
        icon: "icon-devto",
        background: Rgb(0x33, 0x33, 0x33),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Codewars,
        label: "Codewars",
        icon: "icon-codewars",
        background: Rgb(0x8A, 0x1A, 0x50),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Codepen,
        label: "CodePen",
        icon: "icon-codepen",
        background: Rgb(0x00, 0x00, 0x00),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Freecodecamp,
        label: "freeCodeCamp",
        icon: "icon-freecodecamp",
        background: Rgb(0x30, 0x22, 0x67),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Gitlab,
        label: "GitLab",
        icon: "icon-gitlab",
        background: Rgb(0xEB, 0x49, 0x25),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::Hashnode,
        label: "Hashnode",
        icon: "icon-hashnode",
        background: Rgb(0x03, 0x30, 0xD1),
        foreground: None,
    },
    PlatformInfo {
        platform: Platform::StackOverflow,
        label: "Stack Overflow",
        icon: "icon-stack-overflow",
        background: Rgb(0xEC, 0x71, 0x00),
        foreground: None,
    },
];

static CATALOG: Lazy<IndexMap<&'static str, &'static PlatformInfo>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|info| (info.platform.into(), info))
        .collect()
});

impl Platform {
    pub fn id(self) -> &'static str {
        self.into()
    }

    pub fn info(self) -> &'static PlatformInfo {
        &ENTRIES[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Neighbouring catalog entry, wrapping at both ends. Used by the picker.
    pub fn cycle(self, delta: isize) -> Platform {
        let all = Platform::iter().collect::<Vec<_>>();
        let len = all.len() as isize;
        let next = (self as isize + delta).rem_euclid(len);
        all[next as usize]
    }
}

/// Resolves a stored identifier. Retired identifiers are an integrity fault,
/// never substituted with a default.
pub fn lookup(id: &str) -> Result<&'static PlatformInfo, CatalogError> {
    CATALOG
        .get(id)
        .copied()
        .ok_or_else(|| CatalogError::UnknownPlatform(id.to_string()))
}

pub fn all() -> impl Iterator<Item = &'static PlatformInfo> {
    CATALOG.values().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn entries_follow_variant_order() {
        for platform in Platform::iter() {
            assert_eq!(platform.info().platform, platform);
        }
        assert_eq!(Platform::iter().count(), ENTRIES.len());
    }

    #[test]
    fn lookup_round_trips_every_identifier() {
        for platform in Platform::iter() {
            let info = lookup(platform.id()).expect("known platform");
            assert_eq!(info.platform, platform);
            assert_eq!(Platform::from_str(platform.id()).ok(), Some(platform));
        }
        assert_eq!(Platform::StackOverflow.id(), "stack-overflow");
        assert_eq!(Platform::FrontendMentor.id(), "frontend-mentor");
    }

    #[test]
    fn lookup_rejects_retired_identifier() {
        assert_matches!(
            lookup("myspace"),
            Err(CatalogError::UnknownPlatform(id)) if id == "myspace"
        );
    }

    #[test]
    fn default_platform_is_first_entry() {
        assert_eq!(Platform::default(), ENTRIES[0].platform);
        assert_eq!(all().next().map(|info| info.platform), Some(Platform::Github));
    }

    #[test]
    fn cycle_wraps_in_both_directions() {
        assert_eq!(Platform::Github.cycle(-1), Platform::StackOverflow);
        assert_eq!(Platform::StackOverflow.cycle(1), Platform::Github);
        assert_eq!(Platform::Github.cycle(2), Platform::Twitter);
    }

    #[test]
    fn labels_are_unique() {
        let labels = all().map(|info| info.label).collect::<HashSet<_>>();
        assert_eq!(labels.len(), ENTRIES.len());
        assert_eq!(Rgb(0x1A, 0x1A, 0x1A).to_hex(), "#1A1A1A");
    }

    #[test]
    fn serde_uses_catalog_identifiers() {
        let json = serde_json::to_string(&Platform::StackOverflow).expect("serialize");
        assert_eq!(json, "\"stack-overflow\"");
        let parsed: Platform = serde_json::from_str("\"github\"").expect("deserialize");
        assert_eq!(parsed, Platform::Github);
    }
}
