//! Extraction pipeline: match, load, merge, trim/pad and persist per channel.

mod assemble;
mod extract;

pub use assemble::{
    AssembledTrace, AssemblySpec, ChannelOutcome, SkippedSegment, assemble_segments,
    assemble_series, prepare_output_dir, whole_secs,
};
pub use extract::{
    ExtractOptions, ExtractionPipeline, ExtractionReport, ExtractionRequest, group_by_channel,
};
