pub mod archive;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod rules;
pub mod sink;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{AudioConfig, CliOverrides, Config, ExtractionConfig, OutputConfig};
pub use error::{MediaError, Result, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveEntry, ArchiveEntrySource, DirectorySource, MemorySource};
pub use convert::{
    AudioConverter, BlobConverter, ConversionOutcome, ConversionRouter, Converter,
    ExternalEncoder, ImageConverter, SpriteDecoder,
};
pub use extractor::{ExtractionPipeline, ExtractionProgress, ExtractionReport, ListingIndex, RunMode};
pub use metadata::{
    AggregationReport, JascPaletteBuilder, MetadataAggregator, MetadataFormat, MetadataProducer,
    Palette, PaletteBuilder, ProducerContext,
};
pub use rules::{ExtractionRule, RuleSet};
pub use sink::OutputSink;
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Swatch images written with `extrafiles`, relative to the output root.
pub const COLORTABLE_SWATCHES: &str = "info/colortable.pal.png";
pub const PLAYER_COLORTABLE_SWATCHES: &str = "info/playercolortable.pal.png";

const SPRITE_EXTENSION: &str = "slp";

/// What a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub progress: ExtractionProgress,
    /// Present only in listing mode.
    pub listing: Option<ListingIndex>,
    pub metadata: Option<AggregationReport>,
    pub extra_files: Vec<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl RunSummary {
    pub fn files_extracted(&self) -> usize {
        self.progress.files_processed
    }

    pub fn is_clean(&self) -> bool {
        !self.progress.cancelled
            && !self.progress.has_failures()
            && self.metadata.as_ref().map_or(true, |m| m.is_clean())
    }

    pub fn exit_code(&self) -> i32 {
        if self.progress.cancelled {
            130
        } else if self.is_clean() {
            0
        } else {
            2
        }
    }
}

/// Main library interface: one configured conversion run over an archive source.
pub struct MediaConvert {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    sprite_decoder: Option<Arc<dyn SpriteDecoder>>,
    palette_builder: Arc<dyn PaletteBuilder>,
    producers: Vec<Arc<dyn MetadataProducer>>,
}

impl MediaConvert {
    /// Create an instance with terminal output and a Ctrl+C handler
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet)
            .with_status_on_stderr(config.extraction.list_files);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self::assemble(config, output_formatter, progress_manager, shutdown))
    }

    /// Create an instance for embedding: no terminal output, no signal handler.
    pub fn headless(config: Config) -> Self {
        Self::assemble(
            config,
            OutputFormatter::new(OutputMode::Plain, 0, true),
            ProgressManager::new(false),
            GracefulShutdown::detached(),
        )
    }

    fn assemble(
        config: Config,
        output_formatter: OutputFormatter,
        progress_manager: ProgressManager,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
            sprite_decoder: None,
            palette_builder: Arc::new(JascPaletteBuilder),
            producers: Vec::new(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)
    }

    pub fn with_sprite_decoder(mut self, decoder: Arc<dyn SpriteDecoder>) -> Self {
        self.sprite_decoder = Some(decoder);
        self
    }

    pub fn with_palette_builder(mut self, builder: Arc<dyn PaletteBuilder>) -> Self {
        self.palette_builder = builder;
        self
    }

    /// Adds a producer next to the built-in color tables, e.g. string
    /// resources or game data.
    pub fn with_metadata_producer(mut self, producer: Arc<dyn MetadataProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    /// Run selection and conversion over `source`.
    ///
    /// Only configuration problems fail the run. Per-entry and per-producer
    /// failures end up in the returned summary.
    pub fn run(&self, source: &dyn ArchiveEntrySource) -> Result<RunSummary> {
        self.config.validate()?;
        let rules = self.config.rule_set()?;
        self.shutdown.check_shutdown()?;

        let mode = RunMode::for_config(&self.config);
        self.output_formatter
            .start_operation(&format!("Reading {}", source.describe()));

        self.ensure_required_archives(source)?;
        let entries = source.entries()?;
        debug!("{} entries found in {}", entries.len(), source.describe());

        let palette = match mode {
            RunMode::Convert => Some(Arc::new(self.load_palette(source)?)),
            RunMode::Listing | RunMode::Inspect => None,
        };

        let sink = match mode {
            RunMode::Convert => OutputSink::from_root(self.config.output.directory.clone()),
            RunMode::Listing | RunMode::Inspect => OutputSink::disabled(),
        };
        sink.initialize()?;

        let router = self.build_router(palette.clone());

        let entry_progress = match mode {
            RunMode::Convert => self.progress_manager.create_entry_progress(0),
            RunMode::Listing | RunMode::Inspect => indicatif::ProgressBar::hidden(),
        };
        let progress_callback = {
            let pb = entry_progress.clone();
            move |progress: &ExtractionProgress| {
                ui::progress::update_entry_progress(&pb, progress);
            }
        };

        let pipeline = ExtractionPipeline::new(rules, &router, &sink)
            .with_listing(self.config.extraction.list_files)
            .with_shutdown(&self.shutdown)
            .with_jobs(self.config.extraction.jobs);
        let result = pipeline.run(entries, Some(&progress_callback));
        let mut progress = result.progress;

        if self.sprite_decoder.is_none() {
            if let Some(copied) = progress.processed_by_extension.get(SPRITE_EXTENSION) {
                let message = format!(
                    "No sprite decoder configured, {} {} entries copied verbatim",
                    copied, SPRITE_EXTENSION
                );
                debug!("{}", message);
                self.output_formatter.warning(&message);
            }
        }

        ui::progress::finish_progress_with_summary(
            &entry_progress,
            &format!("Converted {} entries", progress.files_processed),
            progress.elapsed(),
        );
        self.progress_manager.clear();

        let mut summary = RunSummary {
            mode,
            progress: ExtractionProgress::new(),
            listing: result.listing,
            metadata: None,
            extra_files: Vec::new(),
            report_path: None,
        };

        if let (Some(palette), RunMode::Convert) = (palette, mode) {
            if progress.cancelled {
                warn!("Run cancelled, skipping metadata export");
            } else {
                summary.metadata = Some(self.export_metadata(&palette, source, &sink));
                if self.config.output.extrafiles {
                    summary.extra_files = self.write_extra_files(&palette, &sink, &mut progress);
                }
            }

            info!("media files extracted: {}", progress.files_processed);
            if let Some(root) = sink.root() {
                self.output_formatter
                    .success(&format!("Output written to {}", root.display()));
            }

            let report = ExtractionReport::new(
                source.describe(),
                &self.config,
                &progress,
                summary.metadata.clone(),
            );
            match report.save(&sink) {
                Ok(path) => {
                    self.output_formatter
                        .info(&format!("Run report saved to {}", path.display()));
                    summary.report_path = Some(path);
                }
                Err(e) => {
                    warn!("Failed to write extraction report: {}", e);
                    progress.add_warning(format!("extraction report: {}", e.user_message()));
                }
            }
        }

        summary.progress = progress;
        Ok(summary)
    }

    fn ensure_required_archives(&self, source: &dyn ArchiveEntrySource) -> Result<()> {
        if self.config.extraction.required_archives.is_empty() {
            return Ok(());
        }

        let present = source.archive_names()?;
        let missing: Vec<&str> = self
            .config
            .extraction
            .required_archives
            .iter()
            .map(String::as_str)
            .filter(|name| !present.contains(*name))
            .collect();

        if !missing.is_empty() {
            return Err(MediaError::config(format!(
                "Required archives missing from {}: {}",
                source.describe(),
                missing.join(", ")
            )));
        }

        Ok(())
    }

    fn load_palette(&self, source: &dyn ArchiveEntrySource) -> Result<Palette> {
        let archive = &self.config.extraction.palette_archive;
        let palette_id = self.config.extraction.palette_id;

        let entry = source.find(archive, palette_id, "bin")?.ok_or_else(|| {
            MediaError::config(format!("Palette entry {}:{}.bin not found", archive, palette_id))
        })?;

        let data = entry.read().map_err(|e| {
            MediaError::config(format!("Palette entry {} unreadable: {}", entry.display_name(), e))
        })?;

        let palette = self.palette_builder.build(&data).map_err(|e| {
            MediaError::config(format!(
                "Palette entry {} unusable: {}",
                entry.display_name(),
                e.user_message()
            ))
        })?;

        debug!("Loaded {} palette colors from {}", palette.len(), entry.display_name());
        Ok(palette)
    }

    fn build_router(&self, palette: Option<Arc<Palette>>) -> ConversionRouter {
        let audio = if self.config.audio.no_opus {
            AudioConverter::without_encoder()
        } else {
            AudioConverter::new(
                ExternalEncoder::new(self.config.audio.encoder.as_str())
                    .with_timeout(self.config.encoder_timeout_duration()),
            )
        };
        let mut router = ConversionRouter::new().with_route("wav", Arc::new(audio));

        if let (Some(decoder), Some(palette)) = (&self.sprite_decoder, palette) {
            router.register(
                SPRITE_EXTENSION,
                Arc::new(ImageConverter::new(
                    decoder.clone(),
                    palette,
                    self.config.extraction.terrain_archive.as_str(),
                    &self.config.output.metadata_formats,
                )),
            );
        }

        router
    }

    fn export_metadata(
        &self,
        palette: &Palette,
        source: &dyn ArchiveEntrySource,
        sink: &OutputSink,
    ) -> AggregationReport {
        self.output_formatter.start_operation("Exporting metadata");

        let aggregator = self
            .producers
            .iter()
            .cloned()
            .fold(
                MetadataAggregator::new(&self.config.output.metadata_formats)
                    .with_builtin_producers(),
                |aggregator, producer| aggregator.with_producer(producer),
            );

        let ctx = ProducerContext {
            palette,
            palette_id: self.config.extraction.palette_id,
            source,
        };
        aggregator.run(&ctx, sink)
    }

    fn write_extra_files(
        &self,
        palette: &Palette,
        sink: &OutputSink,
        progress: &mut ExtractionProgress,
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();

        let color_table = palette.swatches_png(16, 16).and_then(|png| {
            sink.write(Path::new(COLORTABLE_SWATCHES), &png)
        });
        match color_table {
            Ok(path) => written.push(path),
            Err(e) => progress.add_warning(format!("{}: {}", COLORTABLE_SWATCHES, e.user_message())),
        }

        let player_table = palette
            .player_colors()
            .and_then(|players| players.swatches_png(metadata::colortable::PLAYER_SHADES as u32, 16))
            .and_then(|png| sink.write(Path::new(PLAYER_COLORTABLE_SWATCHES), &png));
        match player_table {
            Ok(path) => written.push(path),
            Err(e) => {
                progress.add_warning(format!("{}: {}", PLAYER_COLORTABLE_SWATCHES, e.user_message()))
            }
        }

        written
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// A handle sharing this run's stop flag.
    pub fn shutdown_handle(&self) -> GracefulShutdown {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &MediaError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
