//! Learning-curve figures.

pub mod display;
pub mod figure;
pub mod layout;
pub mod render;

pub use figure::{AxisRange, DatasetSizes, Figure, Panel, PlotSeries, SecondaryAxis};
pub use layout::{Marker, PercentAxis, PlotLayout, PlotSpec, SeriesStyle};
pub use render::PlotRenderer;
