use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::error::CacheError;

/// Cache generation tag. Bump on every asset change.
pub const DEFAULT_CACHE_VERSION: &str = "glucose-logger-v1.2";

/// URL schemes the worker never intercepts.
pub const DEFAULT_EXCLUDED_SCHEMES: &[&str] = &["chrome-extension"];

/// Third-party origins fetched without CORS; their responses are opaque.
pub const DEFAULT_OPAQUE_ORIGINS: &[&str] = &["https://cdn.tailwindcss.com"];

/// Application shell: same-origin paths, CDN modules and the icon set.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/index.tsx",
    "/App.tsx",
    "/types.ts",
    "/hooks/useLocalStorage.ts",
    "/components/GlucoseForm.tsx",
    "/components/ReadingsList.tsx",
    "/components/NotificationBanner.tsx",
    "https://cdn.tailwindcss.com",
    "https://esm.sh/react@^19.1.0",
    "https://esm.sh/react@^19.1.0/jsx-runtime",
    "https://esm.sh/react-dom@^19.1.0/client",
    "https://esm.sh/react-dom@^19.1.0/",
    "https://esm.sh/react@^19.1.0/",
    "/icons/icon-72x72.png",
    "/icons/icon-96x96.png",
    "/icons/icon-128x128.png",
    "/icons/icon-144x144.png",
    "/icons/icon-152x152.png",
    "/icons/icon-192x192.png",
    "/icons/icon-384x384.png",
    "/icons/icon-512x512.png",
    "/icons/apple-touch-icon-180x180.png",
];

/// The fixed set of assets one cache generation pre-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: String,
    pub urls: Vec<String>,
}

impl CacheManifest {
    pub fn new(version: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            version: version.into(),
            urls,
        }
    }

    /// The built-in asset list under the default version tag.
    pub fn default_assets() -> Self {
        Self::new(
            DEFAULT_CACHE_VERSION,
            DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Resolves relative entries against `origin` so every entry is a full URL.
    pub fn resolve(&self, origin: &Url) -> Result<Self, CacheError> {
        let urls = self
            .urls
            .iter()
            .map(|entry| {
                origin
                    .join(entry)
                    .map(String::from)
                    .map_err(|e| CacheError::InvalidManifestEntry(entry.clone(), e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(self.version.clone(), urls))
    }
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self::default_assets()
    }
}
