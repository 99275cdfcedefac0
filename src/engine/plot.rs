//! Volcano plot of one comparison

use std::fs;
use std::path::Path;

use plotly::common::color::NamedColor;
use plotly::common::{DashType, Line, Marker, Mode};
use plotly::layout::Axis;
use plotly::{Layout, Plot, Scatter};

use crate::error::Result;
use crate::io::{ContrastResult, FeatureRecord};

/// Highlighting thresholds; they do not change which rows are written
#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// Adjusted p-value cutoff
    pub alpha: f64,
    /// Absolute effect size (log2) cutoff
    pub lfc: f64,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self { alpha: 0.05, lfc: 1.0 }
    }
}

/// Point coordinates for one group of features
#[derive(Debug, Default)]
struct PointGroup {
    x: Vec<f64>,
    y: Vec<f64>,
    text: Vec<String>,
}

impl PointGroup {
    fn push(&mut self, row: &FeatureRecord, y: f64) {
        self.x.push(row.effect_size);
        self.y.push(y);
        self.text.push(row.name.clone().unwrap_or_else(|| row.feature_id.clone()));
    }

    fn trace(self, name: &str, color: NamedColor) -> Box<Scatter<f64, f64>> {
        Scatter::new(self.x, self.y)
            .mode(Mode::Markers)
            .name(name)
            .text_array(self.text)
            .marker(Marker::new().color(color))
    }
}

fn neg_log10(p: f64) -> f64 {
    -p.max(f64::MIN_POSITIVE).log10()
}

/// Effect size against -log10 adjusted p-value; rows without an adjusted p-value are left out
pub fn volcano_plot(result: &ContrastResult, options: &PlotOptions) -> Plot {
    let mut up = PointGroup::default();
    let mut down = PointGroup::default();
    let mut other = PointGroup::default();

    for row in result.rows.iter().filter(|r| r.adjusted_p_value.is_finite()) {
        let y = neg_log10(row.adjusted_p_value);
        if row.is_significant(options.alpha, options.lfc) {
            if row.effect_size > 0.0 {
                up.push(row, y);
            } else {
                down.push(row, y);
            }
        } else {
            other.push(row, y);
        }
    }

    let x_extent = up
        .x
        .iter()
        .chain(&down.x)
        .chain(&other.x)
        .fold(options.lfc * 2.0, |acc, x| acc.max(x.abs()));
    let y_max = up
        .y
        .iter()
        .chain(&down.y)
        .chain(&other.y)
        .fold(neg_log10(options.alpha) * 2.0, |acc, &y| acc.max(y));

    let mut plot = Plot::new();
    plot.add_trace(other.trace("Not significant", NamedColor::Gray));
    plot.add_trace(down.trace(&format!("Lower in {}", result.contrast.level_a), NamedColor::Blue));
    plot.add_trace(up.trace(&format!("Higher in {}", result.contrast.level_a), NamedColor::Red));

    let dashed = || Line::default().color(NamedColor::DarkGray).dash(DashType::Dash);
    for x in [-options.lfc, options.lfc] {
        plot.add_trace(
            Scatter::new(vec![x, x], vec![0.0, y_max])
                .mode(Mode::Lines)
                .line(dashed())
                .show_legend(false),
        );
    }
    let y_cut = neg_log10(options.alpha);
    plot.add_trace(
        Scatter::new(vec![-x_extent, x_extent], vec![y_cut, y_cut])
            .mode(Mode::Lines)
            .line(dashed())
            .show_legend(false),
    );

    let layout = Layout::new()
        .title(format!("{} ({})", result.comparison_id, result.contrast))
        .x_axis(Axis::new().title(format!(
            "log2 fold change ({} vs {})",
            result.contrast.level_a, result.contrast.level_b
        )))
        .y_axis(Axis::new().title("-log10 adjusted p-value".to_string()));
    plot.set_layout(layout);
    plot
}

/// Render the volcano plot to a standalone HTML file
pub fn write_volcano<P: AsRef<Path>>(path: P, result: &ContrastResult, options: &PlotOptions) -> Result<()> {
    let plot = volcano_plot(result, options);
    fs::write(path, plot.to_html())?;
    Ok(())
}
