use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use mediaconvert::{
    Cli, DirectorySource, MediaConvert, MediaError, OutputFormatter, OutputMode, UserFriendlyError,
};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Malformed rules are configuration errors, not usage errors
            let code = match e.kind() {
                ErrorKind::ValueValidation => 3,
                _ => e.exit_code(),
            };
            if let Err(print_error) = e.print() {
                eprintln!("{}", print_error);
            }
            return code;
        }
    };

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let media = match MediaConvert::from_cli(&cli) {
        Ok(media) => media,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    let source = match cli.source.as_ref() {
        Some(path) => match DirectorySource::new(path) {
            Ok(source) => source,
            Err(e) => {
                media.handle_error(&e);
                return exit_code_for(&e);
            }
        },
        None => {
            media.handle_error(&MediaError::config("No archive source directory given"));
            return 3;
        }
    };

    // Encoders are driven from this thread, so keep it off the async workers
    match tokio::task::block_in_place(|| media.run(&source)) {
        Ok(summary) => {
            let formatter = media.output_formatter();
            match summary.listing {
                Some(ref listing) => formatter.print_listing(listing),
                None => formatter.print_run_summary(&summary),
            }
            summary.exit_code()
        }
        Err(e) => {
            media.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &MediaError) -> i32 {
    match error {
        MediaError::Cancelled => 130,
        MediaError::Config { .. } => 3,
        _ => 1,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let default_directive = if cli.quiet {
        "mediaconvert=error"
    } else {
        match cli.verbose {
            0 => "mediaconvert=warn",
            1 => "mediaconvert=info",
            _ => "mediaconvert=debug",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("a global subscriber is already installed")
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "mediaconvert.toml".to_string());

    match MediaConvert::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  mediaconvert <source-dir> --config {}", config_path);
            println!("\nEdit the file to customize settings for your needs.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(error: &MediaError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "mediaconvert",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        let exit_code = handle_generate_config(&cli);
        assert_eq!(exit_code, 0);

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[extraction]"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&MediaError::Cancelled), 130);
        assert_eq!(exit_code_for(&MediaError::config("bad rule")), 3);
        assert_eq!(
            exit_code_for(&MediaError::InvalidPath {
                path: "../x".to_string()
            }),
            1
        );
    }
}
