pub mod analyzer;
pub mod filter;
pub mod histogram;
pub mod hotspot;
pub mod report;

pub use analyzer::ErrorAnalyzer;
pub use filter::EntryFilter;
pub use histogram::{TimeSeries, TimeWindow, WindowCounts};
pub use hotspot::{Dimension, HotspotGroup, HotspotGrouper, HotspotTable};
pub use report::{AnalysisReport, Summary};
