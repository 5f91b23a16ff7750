pub mod table;

pub use table::{SymbolSeries, TimeSeriesTable};
