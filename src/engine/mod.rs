pub mod bar_aggregator;
pub mod series_buffer;
pub mod stream;
pub mod tick_source;

// Re-export the engine surface for convenient access (e.g. `use crate::engine::Stream`).
pub use bar_aggregator::BarAggregator;
pub use series_buffer::SeriesBuffer;
pub use stream::{Stream, StreamOptions};
pub use tick_source::RandomWalk;
