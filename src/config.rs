use crate::error::{MediaError, Result};
use crate::metadata::MetadataFormat;
use crate::rules::{RuleSet, UNIVERSAL_RULE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rules of the form `archive:fileid.ext`.
    pub extract: Vec<String>,
    pub list_files: bool,
    pub terrain_archive: String,
    pub required_archives: Vec<String>,
    pub palette_archive: String,
    pub palette_id: u32,
    pub jobs: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Writes are enabled only when this is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub metadata_formats: Vec<MetadataFormat>,
    pub extrafiles: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub no_opus: bool,
    pub encoder: String,
    /// Seconds before a running encoder is killed.
    pub encoder_timeout: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extract: vec![UNIVERSAL_RULE.to_string()],
            list_files: false,
            terrain_archive: "terrain".to_string(),
            required_archives: vec!["interfac".to_string()],
            palette_archive: "interfac".to_string(),
            palette_id: 50500,
            jobs: num_cpus::get().max(1),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            metadata_formats: vec![MetadataFormat::Csv],
            extrafiles: false,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            no_opus: false,
            encoder: "opusenc".to_string(),
            encoder_timeout: 120,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MediaError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            MediaError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["mediaconvert.toml", ".mediaconvert.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref extract) = cli_args.extract {
            self.extraction.extract = extract.clone();
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.directory = Some(output_dir.clone());
        }

        if let Some(list_files) = cli_args.list_files {
            self.extraction.list_files = list_files;
        }

        if let Some(no_opus) = cli_args.no_opus {
            self.audio.no_opus = no_opus;
        }

        if let Some(extrafiles) = cli_args.extrafiles {
            self.output.extrafiles = extrafiles;
        }

        if let Some(ref formats) = cli_args.metadata_formats {
            self.output.metadata_formats = formats.clone();
        }

        if let Some(ref encoder) = cli_args.encoder {
            self.audio.encoder = encoder.clone();
        }

        if let Some(timeout) = cli_args.encoder_timeout {
            self.audio.encoder_timeout = timeout;
        }

        if let Some(jobs) = cli_args.jobs {
            self.extraction.jobs = jobs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.rule_set()?;

        if self.extraction.jobs == 0 {
            return Err(MediaError::config("Number of jobs must be greater than 0"));
        }

        if self.extraction.terrain_archive.trim().is_empty() {
            return Err(MediaError::config("Terrain archive name must not be empty"));
        }

        if !self.audio.no_opus {
            if self.audio.encoder.trim().is_empty() {
                return Err(MediaError::config(
                    "An encoder program is required unless no_opus is set",
                ));
            }

            if self.audio.encoder_timeout == 0 {
                return Err(MediaError::config("Encoder timeout must be greater than 0"));
            }
        }

        if let Some(ref dir) = self.output.directory {
            if self.output.metadata_formats.is_empty() {
                return Err(MediaError::config(
                    "At least one metadata format must be configured when writing output",
                ));
            }

            if dir.exists() && !dir.is_dir() {
                return Err(MediaError::config(format!(
                    "Output path exists and is not a directory: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn rule_set(&self) -> Result<RuleSet> {
        RuleSet::parse_all(&self.extraction.extract)
    }

    pub fn write_enabled(&self) -> bool {
        self.output.directory.is_some() && !self.extraction.list_files
    }

    pub fn encoder_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.audio.encoder_timeout)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub extract: Option<Vec<String>>,
    pub output_dir: Option<PathBuf>,
    pub list_files: Option<bool>,
    pub no_opus: Option<bool>,
    pub extrafiles: Option<bool>,
    pub metadata_formats: Option<Vec<MetadataFormat>>,
    pub encoder: Option<String>,
    pub encoder_timeout: Option<u64>,
    pub jobs: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extract(mut self, extract: Option<Vec<String>>) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_list_files(mut self, list_files: Option<bool>) -> Self {
        self.list_files = list_files;
        self
    }

    pub fn with_no_opus(mut self, no_opus: Option<bool>) -> Self {
        self.no_opus = no_opus;
        self
    }

    pub fn with_extrafiles(mut self, extrafiles: Option<bool>) -> Self {
        self.extrafiles = extrafiles;
        self
    }

    pub fn with_metadata_formats(mut self, formats: Option<Vec<MetadataFormat>>) -> Self {
        self.metadata_formats = formats;
        self
    }

    pub fn with_encoder(mut self, encoder: Option<String>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_encoder_timeout(mut self, timeout: Option<u64>) -> Self {
        self.encoder_timeout = timeout;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extraction.extract, vec!["*:*.*"]);
        assert_eq!(config.extraction.terrain_archive, "terrain");
        assert_eq!(config.extraction.palette_id, 50500);
        assert_eq!(config.audio.encoder, "opusenc");
        assert!(!config.write_enabled());
        assert!(config.rule_set().unwrap().selects_everything());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.extraction.extract = vec!["graphics-no-delimiters".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.jobs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.encoder = String::new();
        assert!(config.validate().is_err());
        config.audio.no_opus = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_directory_must_not_be_a_file() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.output.directory = Some(file.path().to_path_buf());
        assert!(config.validate().is_err());

        let dir = TempDir::new().unwrap();
        config.output.directory = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());

        config.output.metadata_formats.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.audio.encoder_timeout = 30;
        config.output.metadata_formats = vec![MetadataFormat::Csv, MetadataFormat::Json];
        let temp_file = NamedTempFile::new().unwrap();

        std::fs::write(temp_file.path(), toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.audio.encoder_timeout, 30);
        assert_eq!(loaded_config.output.metadata_formats.len(), 2);
        assert!(loaded_config.output.directory.is_none());
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[audio]\nno_opus = true\n\n[extraction]\nextract = [\"sounds:*.wav\"]").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(config.audio.no_opus);
        assert_eq!(config.audio.encoder, "opusenc");
        assert_eq!(config.extraction.extract, vec!["sounds:*.wav"]);
        assert_eq!(config.extraction.terrain_archive, "terrain");
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load_from_file("/no/such/mediaconvert.toml").unwrap_err();
        assert!(matches!(err, MediaError::Config { .. }));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_extract(Some(vec!["terrain:*.slp".to_string()]))
            .with_output_dir(Some(PathBuf::from("out")))
            .with_no_opus(Some(true))
            .with_encoder_timeout(Some(5))
            .with_jobs(Some(3));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.extraction.extract, vec!["terrain:*.slp"]);
        assert_eq!(config.output.directory, Some(PathBuf::from("out")));
        assert!(config.audio.no_opus);
        assert_eq!(config.encoder_timeout_duration(), Duration::from_secs(5));
        assert_eq!(config.extraction.jobs, 3);
        assert!(config.write_enabled());
        assert!(!config.extraction.list_files);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(!sample.is_empty());
        assert!(sample.contains("[extraction]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("[audio]"));
    }
}
