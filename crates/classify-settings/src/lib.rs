//! # classify-settings
//!
//! Configuration management with layered sources for the classify framework.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ClassifySettings::default()`]
//! 2. **User file** — `~/.classify/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `CLASSIFY_*` overrides (highest priority)
//!
//! Recognized options cover the socket endpoint base, the offline/online
//! endpoint toggle, session expiry, the persistence debounce window, and the
//! client dispatch URL and open timeout.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{ClassifySettings, ClientSettings, ServerSettings};
