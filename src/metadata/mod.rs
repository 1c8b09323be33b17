pub mod aggregator;
pub mod colortable;
pub mod formatter;

pub use aggregator::{
    builtin_producers, AggregationReport, MetadataAggregator, MetadataProducer,
    PaletteTableProducer, PlayerPaletteProducer, PrecomputedProducer, ProducerContext,
    ProducerFailure, TermColorProducer,
};
pub use colortable::{JascPaletteBuilder, Palette, PaletteBuilder, Rgb};
pub use formatter::{DataFormatter, DumpBatch, DumpTable, ExportFile, MetadataFormat};
