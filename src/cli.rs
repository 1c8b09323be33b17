use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::metadata::MetadataFormat;
use crate::rules::ExtractionRule;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediaconvert")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract and convert media from legacy game archives")]
#[command(
    long_about = "mediaconvert walks an unpacked game archive tree, selects entries with \
                  archive:fileid.ext rules and converts them: sprites become PNG atlases \
                  with frame tables, sounds are re-encoded to opus, everything else is \
                  copied verbatim. Palette and color tables are exported alongside."
)]
#[command(after_help = "EXAMPLES:\n  \
    mediaconvert ./data --list-files\n  \
    mediaconvert ./data --output assets\n  \
    mediaconvert ./data --output assets --extract 'graphics:*.slp' --extract 'terrain:*.*'\n  \
    mediaconvert ./data --output assets --extract 'sounds:*.wav' --no-opus\n  \
    mediaconvert --generate-config --config mediaconvert.toml\n\n\
    Rules have the form archive:fileid.ext where each part may be '*'.")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Directory holding the unpacked archives (<archive>/<fileid>.<ext>)
    #[arg(required_unless_present = "generate_config")]
    pub source: Option<PathBuf>,

    /// Extraction rule, may be repeated (default: *:*.*)
    #[arg(short = 'x', long = "extract", value_name = "RULE", value_parser = validate_rule)]
    pub extract: Vec<String>,

    /// Output directory; without it nothing is written
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// List selected entries grouped by file id instead of converting them
    #[arg(short, long)]
    pub list_files: bool,

    /// Keep sounds as wave files instead of re-encoding them to opus
    #[arg(long)]
    pub no_opus: bool,

    /// Also write palette swatch images under info/
    #[arg(long)]
    pub extrafiles: bool,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Metadata formats to export (comma-separated)
    #[arg(long = "metadata-format", value_enum, value_delimiter = ',')]
    pub metadata_formats: Vec<MetadataFormat>,

    /// Encoder program invoked as `<encoder> <input.wav> <output.opus>`
    #[arg(long, env = "MEDIACONVERT_ENCODER")]
    pub encoder: Option<String>,

    /// Seconds before a running encoder is killed
    #[arg(long, value_name = "SECONDS")]
    pub encoder_timeout: Option<u64>,

    /// Number of conversion threads (needs the `parallel` feature)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    /// Flags only override the config file when given.
    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_extract((!self.extract.is_empty()).then(|| self.extract.clone()))
            .with_output_dir(self.output.clone())
            .with_list_files(self.list_files.then_some(true))
            .with_no_opus(self.no_opus.then_some(true))
            .with_extrafiles(self.extrafiles.then_some(true))
            .with_metadata_formats(
                (!self.metadata_formats.is_empty()).then(|| self.metadata_formats.clone()),
            )
            .with_encoder(self.encoder.clone())
            .with_encoder_timeout(self.encoder_timeout)
            .with_jobs(self.jobs)
    }
}

pub fn validate_rule(s: &str) -> std::result::Result<String, String> {
    ExtractionRule::parse(s)
        .map(|_| s.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_validation() {
        assert!(validate_rule("*:*.*").is_ok());
        assert!(validate_rule("graphics:*.slp").is_ok());
        assert!(validate_rule("interfac:50500.bin").is_ok());
        assert!(validate_rule("graphics").is_err());
        assert!(validate_rule("graphics:abc.slp").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "mediaconvert",
            "data",
            "-o",
            "assets",
            "-x",
            "terrain:*.slp",
            "--extract",
            "sounds:*.wav",
            "--no-opus",
            "--metadata-format",
            "csv,json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.source, Some(PathBuf::from("data")));
        assert_eq!(cli.extract, vec!["terrain:*.slp", "sounds:*.wav"]);
        assert_eq!(cli.metadata_formats, vec![MetadataFormat::Csv, MetadataFormat::Json]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_invalid_rule_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["mediaconvert", "data", "--extract", "nonsense"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["mediaconvert", "data", "-q", "-v"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_only_for_given_flags() {
        let cli = Cli::try_parse_from(["mediaconvert", "data", "--list-files"]).unwrap();
        let overrides = cli.create_cli_overrides();

        assert_eq!(overrides.list_files, Some(true));
        assert!(overrides.extract.is_none());
        assert!(overrides.no_opus.is_none());
        assert!(overrides.output_dir.is_none());
        assert!(overrides.metadata_formats.is_none());
    }

    #[test]
    fn test_generate_config_needs_no_source() {
        let cli = Cli::try_parse_from(["mediaconvert", "--generate-config"]).unwrap();
        assert!(cli.generate_config);
        assert!(cli.source.is_none());
    }
}
