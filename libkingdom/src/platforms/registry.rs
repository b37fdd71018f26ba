//! Static catalog of supported distribution channels

use serde::Serialize;

/// A distribution channel descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    /// Unique lowercase slug (e.g., "instagram")
    pub id: &'static str,
    pub name: &'static str,
    /// Icon name in the app's icon set
    pub icon: &'static str,
    /// Brand color as a hex string
    pub color: &'static str,
}

pub const BUILTIN_PLATFORMS: [Platform; 7] = [
    Platform {
        id: "instagram",
        name: "Instagram",
        icon: "logo-instagram",
        color: "#E4405F",
    },
    Platform {
        id: "facebook",
        name: "Facebook",
        icon: "logo-facebook",
        color: "#1877F2",
    },
    Platform {
        id: "twitter",
        name: "Twitter/X",
        icon: "logo-twitter",
        color: "#1DA1F2",
    },
    Platform {
        id: "linkedin",
        name: "LinkedIn",
        icon: "logo-linkedin",
        color: "#0A66C2",
    },
    Platform {
        id: "tiktok",
        name: "TikTok",
        icon: "logo-tiktok",
        color: "#000000",
    },
    Platform {
        id: "youtube",
        name: "YouTube",
        icon: "logo-youtube",
        color: "#FF0000",
    },
    Platform {
        id: "pinterest",
        name: "Pinterest",
        icon: "logo-pinterest",
        color: "#BD081C",
    },
];

/// Read-only catalog, fixed at construction
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: Vec<Platform>,
}

impl PlatformRegistry {
    /// The built-in catalog of seven platforms
    pub fn builtin() -> Self {
        Self {
            platforms: BUILTIN_PLATFORMS.to_vec(),
        }
    }

    /// A custom catalog; later duplicates of an id are ignored
    pub fn with_platforms(platforms: Vec<Platform>) -> Self {
        let mut unique: Vec<Platform> = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !unique.iter().any(|p| p.id == platform.id) {
                unique.push(platform);
            }
        }
        Self { platforms: unique }
    }

    pub fn list_supported(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn get(&self, id: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
