use loaderconfig::NamingConfig;

use crate::error::LoaderError;

/// Maps a manifest name onto the key of its paired image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNaming {
    manifest_suffix: String,
    image_suffix: String,
}

impl Default for ResourceNaming {
    fn default() -> Self {
        Self::from_config(&NamingConfig::default())
    }
}

impl ResourceNaming {
    pub fn new(manifest_suffix: impl Into<String>, image_suffix: impl Into<String>) -> Self {
        Self {
            manifest_suffix: manifest_suffix.into(),
            image_suffix: image_suffix.into(),
        }
    }

    pub fn from_config(config: &NamingConfig) -> Self {
        Self::new(config.manifest_suffix.clone(), config.image_suffix.clone())
    }

    pub fn manifest_suffix(&self) -> &str {
        &self.manifest_suffix
    }

    pub fn image_suffix(&self) -> &str {
        &self.image_suffix
    }

    /// True when the final path component carries the manifest suffix after a
    /// non-empty stem.
    pub fn is_manifest(&self, name: &str) -> bool {
        let file_name = file_name(name);
        file_name.len() > self.manifest_suffix.len() && file_name.ends_with(&self.manifest_suffix)
    }

    /// Derives the image key for `manifest`: the manifest suffix is replaced
    /// by the image suffix. Any other extension on the final path component is
    /// replaced the same way. Names with surrounding whitespace or an empty
    /// stem are rejected.
    pub fn image_key(&self, manifest: &str) -> Result<String, LoaderError> {
        if manifest.trim().is_empty() {
            return Err(invalid(manifest, "name must not be empty"));
        }
        if manifest.trim() != manifest {
            return Err(invalid(manifest, "name has surrounding whitespace"));
        }

        let file_name = file_name(manifest);
        let file_start = manifest.len() - file_name.len();
        if file_name.ends_with(&self.manifest_suffix) {
            if file_name.len() == self.manifest_suffix.len() {
                return Err(invalid(manifest, "name has an empty stem"));
            }
            let stem = &manifest[..manifest.len() - self.manifest_suffix.len()];
            return Ok(format!("{stem}{}", self.image_suffix));
        }

        match file_name.rfind('.') {
            Some(0) | None => Err(invalid(manifest, "name has no extension to replace")),
            Some(dot) if dot + 1 == file_name.len() => {
                Err(invalid(manifest, "name has an empty extension"))
            }
            Some(dot) => {
                let stem = &manifest[..file_start + dot];
                Ok(format!("{stem}{}", self.image_suffix))
            }
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rfind(&['/', '\\'][..]).map_or(path, |idx| &path[idx + 1..])
}

fn invalid(name: &str, reason: &'static str) -> LoaderError {
    LoaderError::InvalidResourceName {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_manifest_suffix() {
        let naming = ResourceNaming::default();
        assert_eq!(naming.image_key("sheet.plist").unwrap(), "sheet.png");
        assert_eq!(
            naming.image_key("ui/v1.2/buttons.plist").unwrap(),
            "ui/v1.2/buttons.png"
        );
    }

    #[test]
    fn replaces_foreign_extension_on_file_name_only() {
        let naming = ResourceNaming::default();
        assert_eq!(naming.image_key("sheet.json").unwrap(), "sheet.png");
        assert_eq!(
            naming.image_key("packs.v2/sheet.atlas").unwrap(),
            "packs.v2/sheet.png"
        );
    }

    #[test]
    fn rejects_malformed_names() {
        let naming = ResourceNaming::default();
        for name in [
            "",
            "   ",
            "sheet",
            "packs.v2/sheet",
            ".plist",
            "ui/.plist",
            "sheet.",
            " pad.plist ",
            "pad.plist\n",
        ] {
            assert!(
                matches!(
                    naming.image_key(name),
                    Err(LoaderError::InvalidResourceName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn honours_custom_suffixes() {
        let naming = ResourceNaming::new(".atlas", ".webp");
        assert!(naming.is_manifest("hud.atlas"));
        assert!(!naming.is_manifest("hud.plist"));
        assert!(!naming.is_manifest("ui/.atlas"));
        assert!(naming.is_manifest("ui.v2/hud.atlas"));
        assert_eq!(naming.image_key("hud.atlas").unwrap(), "hud.webp");
    }
}
