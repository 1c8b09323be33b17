use crate::archive::ArchiveEntrySource;
use crate::error::{MediaError, Result, UserFriendlyError};
use crate::metadata::{DataFormatter, DumpBatch, MetadataFormat, Palette};
use crate::sink::OutputSink;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a producer may read while building its tables.
pub struct ProducerContext<'a> {
    pub palette: &'a Palette,
    pub palette_id: u32,
    pub source: &'a dyn ArchiveEntrySource,
}

/// A source of game-wide metadata tables.
pub trait MetadataProducer: Send + Sync {
    fn name(&self) -> String;
    fn produce(&self, ctx: &ProducerContext<'_>) -> Result<DumpBatch>;
}

/// Dumps the main palette as `palette_<id>`.
pub struct PaletteTableProducer;

impl MetadataProducer for PaletteTableProducer {
    fn name(&self) -> String {
        "palette".to_string()
    }

    fn produce(&self, ctx: &ProducerContext<'_>) -> Result<DumpBatch> {
        let table = ctx.palette.to_table(format!("palette_{}", ctx.palette_id));
        Ok(DumpBatch::new(vec![table]))
    }
}

/// Dumps the per-player color ramps as `player_palette_<id>`.
pub struct PlayerPaletteProducer;

impl MetadataProducer for PlayerPaletteProducer {
    fn name(&self) -> String {
        "player_palette".to_string()
    }

    fn produce(&self, ctx: &ProducerContext<'_>) -> Result<DumpBatch> {
        let players = ctx.palette.player_colors()?;
        let table = players.to_table(format!("player_palette_{}", ctx.palette_id));
        Ok(DumpBatch::new(vec![table]))
    }
}

/// Dumps the 256-color terminal table as `termcolors`.
pub struct TermColorProducer;

impl MetadataProducer for TermColorProducer {
    fn name(&self) -> String {
        "termcolors".to_string()
    }

    fn produce(&self, _ctx: &ProducerContext<'_>) -> Result<DumpBatch> {
        Ok(DumpBatch::new(vec![Palette::terminal().to_table("termcolors")]))
    }
}

/// Emits tables computed ahead of time, such as decoded string resources or
/// game data supplied by an embedding application.
pub struct PrecomputedProducer {
    name: String,
    batch: DumpBatch,
}

impl PrecomputedProducer {
    pub fn new<S: Into<String>>(name: S, batch: DumpBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }
}

impl MetadataProducer for PrecomputedProducer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn produce(&self, _ctx: &ProducerContext<'_>) -> Result<DumpBatch> {
        Ok(self.batch.clone())
    }
}

pub fn builtin_producers() -> Vec<Arc<dyn MetadataProducer>> {
    vec![
        Arc::new(PaletteTableProducer),
        Arc::new(PlayerPaletteProducer),
        Arc::new(TermColorProducer),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducerFailure {
    pub producer: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationReport {
    pub exported: Vec<PathBuf>,
    pub failures: Vec<ProducerFailure>,
}

impl AggregationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs producers one after another and exports their tables. A failing
/// producer is recorded and the remaining ones still run.
pub struct MetadataAggregator {
    producers: Vec<Arc<dyn MetadataProducer>>,
    formatter: DataFormatter,
}

impl MetadataAggregator {
    pub fn new(formats: &[MetadataFormat]) -> Self {
        Self {
            producers: Vec::new(),
            formatter: DataFormatter::new(formats),
        }
    }

    pub fn with_builtin_producers(mut self) -> Self {
        self.producers.extend(builtin_producers());
        self
    }

    pub fn with_producer(mut self, producer: Arc<dyn MetadataProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn run(&self, ctx: &ProducerContext<'_>, sink: &OutputSink) -> AggregationReport {
        let mut report = AggregationReport::default();

        for producer in &self.producers {
            let name = producer.name();
            debug!("Running metadata producer {}", name);

            match self.export_one(producer.as_ref(), ctx, sink) {
                Ok(mut written) => {
                    info!("Metadata producer {} wrote {} files", name, written.len());
                    report.exported.append(&mut written);
                }
                Err(e) => {
                    let error = MediaError::Aggregation {
                        producer: name.clone(),
                        message: e.user_message(),
                    };
                    warn!("{}", error);
                    report.failures.push(ProducerFailure {
                        producer: name,
                        message: e.user_message(),
                    });
                }
            }
        }

        report
    }

    fn export_one(
        &self,
        producer: &dyn MetadataProducer,
        ctx: &ProducerContext<'_>,
        sink: &OutputSink,
    ) -> Result<Vec<PathBuf>> {
        let batch = producer.produce(ctx)?;
        let files = self.formatter.export(&batch)?;

        let mut written = Vec::with_capacity(files.len());
        for file in files {
            sink.write(&file.relative_path, file.content.as_bytes())?;
            written.push(file.relative_path);
        }

        Ok(written)
    }
}
