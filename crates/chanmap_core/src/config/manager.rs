//! Loading and saving the settings file.
//!
//! Writes go through a sibling temp file and a rename, so a crash never
//! leaves a half-written config behind. Section updates re-read the file and
//! replace a single table, keeping hand edits elsewhere.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on settings file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid settings: {0}")]
    Invalid(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Settings file is not valid TOML: {0}")]
    Document(#[from] toml_edit::TomlError),

    #[error("Settings file does not exist: {0}")]
    Missing(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file path and the in-memory [`Settings`].
pub struct ConfigManager {
    path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Nothing is read until [`load`](Self::load) or
    /// [`load_or_create`](Self::load_or_create).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Read the file; a missing file is an error.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.path.is_file() {
            return Err(ConfigError::Missing(self.path.clone()));
        }
        let text = fs::read_to_string(&self.path)?;
        self.settings = toml::from_str(&text)?;
        Ok(())
    }

    /// Read the file, writing defaults first when it does not exist.
    ///
    /// Files with unknown tables or absent keys are rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.path.is_file() {
            self.settings = Settings::default();
            return self.save();
        }

        let text = fs::read_to_string(&self.path)?;
        self.settings = toml::from_str(&text)?;
        if needs_rewrite(&text, &self.settings)? {
            tracing::debug!("Rewriting settings file {}", self.path.display());
            self.save()?;
        }
        Ok(())
    }

    pub fn save(&self) -> ConfigResult<()> {
        let text = self.render_annotated()?;
        self.replace_file(&text)?;
        Ok(())
    }

    /// Persist one table, leaving the rest of the file as it is on disk.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let on_disk = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut doc: DocumentMut = on_disk.parse()?;
        let table: DocumentMut = self.section_text(section)?.parse()?;
        doc[section.table_name()] = Item::Table(table.as_table().clone());

        self.replace_file(&doc.to_string())?;
        Ok(())
    }

    fn section_text(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        Ok(match section {
            ConfigSection::Tools => toml::to_string_pretty(&s.tools)?,
            ConfigSection::Detection => toml::to_string_pretty(&s.detection)?,
            ConfigSection::Repair => toml::to_string_pretty(&s.repair)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
        })
    }

    fn render_annotated(&self) -> ConfigResult<String> {
        let mut text = String::from("# chanmap configuration\n");

        for section in ConfigSection::all() {
            let heading = match section {
                ConfigSection::Tools => "External tool locations",
                ConfigSection::Detection => "Channel layout detection",
                ConfigSection::Repair => "Per-channel timing repair",
                ConfigSection::Logging => "Logging",
            };
            text.push_str(&format!("\n# {}\n[{}]\n", heading, section.table_name()));
            text.push_str(&self.section_text(section)?);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }

        Ok(text)
    }

    fn replace_file(&self, text: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let staging = staging_path(&self.path);
        let mut file = fs::File::create(&staging)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &self.path)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    path.with_file_name(name)
}

/// True when the file has tables we do not know, or lacks keys we do.
fn needs_rewrite(text: &str, settings: &Settings) -> ConfigResult<bool> {
    let doc: DocumentMut = text.parse()?;
    let known = ConfigSection::all().map(|s| s.table_name());
    if doc.iter().any(|(key, _)| !known.contains(&key)) {
        return Ok(true);
    }

    let complete: DocumentMut = toml::to_string(settings)?.parse()?;
    for name in known {
        let expected = complete.get(name).and_then(Item::as_table);
        let present = doc.get(name).and_then(Item::as_table);
        let missing = match (expected, present) {
            (Some(expected), Some(present)) => {
                expected.iter().any(|(key, _)| !present.contains_key(key))
            }
            (Some(expected), None) => !expected.is_empty(),
            (None, _) => false,
        };
        if missing {
            return Ok(true);
        }
    }
    Ok(false)
}
