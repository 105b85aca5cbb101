//! Payload catalog: the fixed, ordered list of sendable payloads.
//!
//! The catalog is built once at startup and never mutated afterwards. Its
//! order is the canonical display order.

use std::collections::HashSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_IMAGES_DIR: &str = "images/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadDescriptor {
    pub name: String,
    pub description: String,
    pub size_kb: f64,
}

impl PayloadDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, size_kb: f64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            size_kb,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("payload name {0:?} must be a bare file name")]
    InvalidName(String),
    #[error("duplicate payload name: {0}")]
    DuplicateName(String),
    #[error("payload {name} has non-positive size {size_kb}")]
    InvalidSize { name: String, size_kb: f64 },
    #[error("catalog is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    payloads: Vec<PayloadDescriptor>,
    images_dir: String,
}

impl Catalog {
    /// Build a catalog, rejecting path-like or duplicate names and
    /// non-positive sizes.
    pub fn new(payloads: Vec<PayloadDescriptor>) -> Result<Self, CatalogError> {
        if payloads.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for p in &payloads {
            if !is_bare_name(&p.name) {
                return Err(CatalogError::InvalidName(p.name.clone()));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(CatalogError::DuplicateName(p.name.clone()));
            }
            if !(p.size_kb > 0.0) {
                return Err(CatalogError::InvalidSize {
                    name: p.name.clone(),
                    size_kb: p.size_kb,
                });
            }
        }
        Ok(Self {
            payloads,
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
        })
    }

    /// The stock payload list, in its fixed order.
    pub fn builtin() -> Self {
        let payloads = BUILTIN
            .iter()
            .map(|(name, desc, size)| PayloadDescriptor::new(*name, *desc, *size))
            .collect();
        Self {
            payloads,
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
        }
    }

    pub fn with_images_dir(mut self, images_dir: impl Into<String>) -> Self {
        self.images_dir = images_dir.into();
        self
    }

    pub fn list_all(&self) -> &[PayloadDescriptor] {
        &self.payloads
    }

    pub fn get(&self, name: &str) -> Option<&PayloadDescriptor> {
        self.payloads.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Background image for a payload: `<images_dir>` + the name with its
    /// first `.bin` swapped for `.jpg`. `None` for names outside the catalog.
    pub fn resolve_image(&self, name: &str) -> Option<String> {
        self.get(name).map(|p| {
            format!(
                "{}{}",
                self.images_dir,
                p.name.replacen(".bin", ".jpg", 1)
            )
        })
    }
}

/// True when `name` is a single plain file name: no separator of either
/// kind, no `.`/`..`, no root or drive prefix.
pub fn is_bare_name(name: &str) -> bool {
    if name.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

const BUILTIN: &[(&str, &str, f64)] = &[
    ("np-fake-signin-ps4.bin", "Enable Fake Sign In For PS4", 101.0),
    ("np-fake-signin-ps5.bin", "Enable Fake Sign In For PS5", 120.0),
    ("goldhen.bin", "New Beta GoldHenV2.4b18.8", 291.0),
    ("app2usb.bin", "Moves games to USB storage", 22.0),
    ("backup.bin", "Creates system backup", 13.2),
    ("disable-updates.bin", "Blocks system updates", 7.6),
    ("enable-browser.bin", "Enables PS4 browser", 9.3),
    ("enable-updates.bin", "Restores system updates", 7.6),
    ("fan-threshold.bin", "Controls fan temperature", 7.8),
    ("ftp.bin", "Starts FTP server", 25.1),
    ("history-blocker.bin", "Blocks browser history", 9.4),
    ("kernel-dumper.bin", "Dumps kernel memory", 15.5),
    ("restore.bin", "Restores system settings", 9.5),
    ("rif-renamer.bin", "Renames license files", 8.2),
    ("ftpsrv-ps4.bin", "High Speed FTP Server PS4", 147.0),
    ("ftpsrv-ps5.bin", "High Speed FTP Server PS5", 209.0),
    ("noPSN.elf", "Test LB Game", 1.0),
];

// ── TOML catalog loader ───────────────────────────────────────────────────────

/// Matches the `[[payload]]` tables of a catalog file. Kept apart from
/// `PayloadDescriptor` so the file schema can grow optional fields.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    payload: Vec<TomlPayload>,
}

#[derive(Debug, Deserialize)]
struct TomlPayload {
    name: String,
    #[serde(default)]
    description: String,
    size_kb: f64,
}

pub fn load_catalog_from_toml(path: &Path) -> Result<Catalog, CatalogError> {
    let content = std::fs::read_to_string(path)?;
    parse_catalog_from_toml_str(&content)
}

pub fn parse_catalog_from_toml_str(content: &str) -> Result<Catalog, CatalogError> {
    let file: TomlCatalogFile = toml::from_str(content)?;
    let payloads = file
        .payload
        .into_iter()
        .map(|p| PayloadDescriptor::new(p.name, p.description, p.size_kb))
        .collect();
    Catalog::new(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_stable() {
        let catalog = Catalog::builtin();
        let first: Vec<String> = catalog.list_all().iter().map(|p| p.name.clone()).collect();
        let second: Vec<String> = catalog.list_all().iter().map(|p| p.name.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.first().map(String::as_str), Some("np-fake-signin-ps4.bin"));
        assert_eq!(first.last().map(String::as_str), Some("noPSN.elf"));
        assert_eq!(catalog.len(), 17);
    }

    #[test]
    fn builtin_passes_validation() {
        let payloads = Catalog::builtin().list_all().to_vec();
        assert!(Catalog::new(payloads).is_ok());
    }

    #[test]
    fn resolve_image_swaps_first_bin_suffix() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.resolve_image("goldhen.bin").as_deref(),
            Some("images/goldhen.jpg")
        );
        // no .bin to replace: name passes through
        assert_eq!(
            catalog.resolve_image("noPSN.elf").as_deref(),
            Some("images/noPSN.elf")
        );
        assert_eq!(catalog.resolve_image("unknown.bin"), None);
    }

    #[test]
    fn resolve_image_honours_images_dir() {
        let catalog = Catalog::builtin().with_images_dir("/srv/art/");
        assert_eq!(
            catalog.resolve_image("ftp.bin").as_deref(),
            Some("/srv/art/ftp.jpg")
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Catalog::new(vec![
            PayloadDescriptor::new("a.bin", "one", 1.0),
            PayloadDescriptor::new("a.bin", "two", 2.0),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(n) if n == "a.bin"));
    }

    #[test]
    fn non_positive_size_rejected() {
        let err = Catalog::new(vec![PayloadDescriptor::new("a.bin", "", 0.0)]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSize { .. }));
    }

    #[test]
    fn path_like_names_rejected() {
        for name in ["/etc/hostname", "../outside.bin", "sub/a.bin", "sub\\a.bin", "..", ".", ""] {
            let err = Catalog::new(vec![PayloadDescriptor::new(name, "", 1.0)]).unwrap_err();
            assert!(
                matches!(&err, CatalogError::InvalidName(n) if n == name),
                "{name:?} accepted"
            );
        }
        assert!(is_bare_name("goldhen.bin"));
        assert!(is_bare_name("a..b.bin"));
    }

    #[test]
    fn toml_catalog_with_escaping_name_rejected() {
        let content = r#"
[[payload]]
name = "ftp.bin"
size_kb = 1.0

[[payload]]
name = "../outside.bin"
size_kb = 1.0
"#;
        assert!(matches!(
            parse_catalog_from_toml_str(content),
            Err(CatalogError::InvalidName(_))
        ));
    }

    #[test]
    fn toml_catalog_keeps_file_order() {
        let content = r#"
[[payload]]
name = "b.bin"
description = "second letter"
size_kb = 2.5

[[payload]]
name = "a.bin"
size_kb = 1.0
"#;
        let catalog = parse_catalog_from_toml_str(content).unwrap();
        let names: Vec<&str> = catalog.list_all().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b.bin", "a.bin"]);
        assert_eq!(catalog.get("a.bin").map(|p| p.description.as_str()), Some(""));
    }
}
