//! INI file configuration adapter.

use crate::domain::error::VwaptraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VwaptraderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|reason| VwaptraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })
    }

    pub fn from_string(content: &str) -> Result<Self, VwaptraderError> {
        Self::parse(content).map_err(|reason| VwaptraderError::ConfigParse {
            file: "<string>".to_string(),
            reason,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
