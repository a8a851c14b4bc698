//! Plot layout and style settings.

use serde::{Deserialize, Serialize};

use crate::error::LensError;

/// How series are arranged in the output figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotLayout {
    /// One axis with every accuracy series (or every cost series when no
    /// accuracy was collected).
    #[default]
    Single,
    /// Four fixed panels: accuracy and cost comparisons, then training-only
    /// and evaluation-only accuracy.
    Grid,
}

impl PlotLayout {
    /// Pixel size of the figure, matching a 10×6 or 14×10 inch canvas at 150 dpi.
    pub fn default_size(self) -> (u32, u32) {
        match self {
            PlotLayout::Single => (1500, 900),
            PlotLayout::Grid => (2100, 1500),
        }
    }
}

/// Right-hand percentage axis over an accuracy count axis.
///
/// The axis is a fixed rescaling: the primary count axis spans
/// `lower..upper` percent of `dataset_size`, and the secondary axis is
/// labelled `lower..upper`. Neither range looks at the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentAxis {
    pub dataset_size: usize,
    pub lower: f64,
    pub upper: f64,
}

impl PercentAxis {
    pub fn new(dataset_size: usize, lower: f64, upper: f64) -> Self {
        Self {
            dataset_size,
            lower,
            upper,
        }
    }

    pub fn validate(&self) -> Result<(), LensError> {
        if self.dataset_size == 0 {
            return Err(LensError::config("percent axis dataset_size must be positive"));
        }
        if !(self.lower.is_finite() && self.upper.is_finite() && self.lower < self.upper) {
            return Err(LensError::config(format!(
                "percent axis bounds must satisfy lower < upper, got {}..{}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Count range matching the percent bounds.
    pub fn count_range(&self) -> (f64, f64) {
        let scale = self.dataset_size as f64 / 100.0;
        (self.lower * scale, self.upper * scale)
    }

    pub fn percent_range(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

/// Everything the renderer needs besides the data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotSpec {
    #[serde(default)]
    pub layout: PlotLayout,
    /// Only applied to the single layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_axis: Option<PercentAxis>,
    /// Overrides the layout's default pixel size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<(u32, u32)>,
}

impl PlotSpec {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn grid() -> Self {
        Self {
            layout: PlotLayout::Grid,
            ..Self::default()
        }
    }

    pub fn with_percent_axis(mut self, axis: PercentAxis) -> Self {
        self.percent_axis = Some(axis);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        self.size.unwrap_or_else(|| self.layout.default_size())
    }

    pub fn validate(&self) -> Result<(), LensError> {
        if let Some(axis) = &self.percent_axis {
            if self.layout == PlotLayout::Grid {
                return Err(LensError::config(
                    "percent_axis only applies to the single layout",
                ));
            }
            axis.validate()?;
        }
        let (w, h) = self.size();
        if w < 200 || h < 150 {
            return Err(LensError::config(format!(
                "figure size {w}x{h} is too small to lay out"
            )));
        }
        Ok(())
    }
}

/// Point marker shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
}

/// Line and marker style of one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesStyle {
    pub rgb: (u8, u8, u8),
    pub marker: Marker,
    pub marker_size: u32,
    pub line_width: u32,
}

impl SeriesStyle {
    /// Training series: blue line, circle markers.
    pub fn training() -> Self {
        Self {
            rgb: (31, 119, 180),
            marker: Marker::Circle,
            marker_size: 4,
            line_width: 1,
        }
    }

    /// Evaluation series: red line, square markers.
    pub fn evaluation() -> Self {
        Self {
            rgb: (214, 39, 40),
            marker: Marker::Square,
            marker_size: 4,
            line_width: 1,
        }
    }

    /// Heavier variant for panels that show a single series.
    pub fn emphasized(mut self) -> Self {
        self.marker_size += 1;
        self.line_width = 2;
        self
    }
}
