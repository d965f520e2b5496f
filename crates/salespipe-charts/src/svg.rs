//! SVG rendering
//!
//! Geometry is computed here; the templates under `templates/` only lay out
//! the precomputed shapes, axes, and labels.

use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use crate::data::Histogram;
use crate::error::{Error, Result};

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 90.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_LEFT_LABELS: f64 = 170.0;
const MAX_X_LABELS: usize = 12;
const TARGET_TICKS: usize = 6;

/// Titles and axis labels of a chart
#[derive(Debug, Clone)]
pub struct ChartText {
    /// Chart name, used in errors
    pub name: &'static str,
    /// Title shown above the plot
    pub title: String,
    /// Horizontal axis label
    pub x_label: String,
    /// Vertical axis label
    pub y_label: String,
}

/// A "nice" numeric axis: bounds on multiples of a 1/2/5 step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Distance between ticks
    pub step: f64,
}

impl Axis {
    /// Smallest nice axis covering `[lo, hi]` with about `target` ticks
    pub fn nice(lo: f64, hi: f64, target: usize) -> Self {
        let (lo, hi) = if hi > lo {
            (lo, hi)
        } else {
            (lo - 1.0, lo + 1.0)
        };
        let raw = (hi - lo) / target.max(1) as f64;
        let magnitude = 10f64.powf(raw.log10().floor());
        let step = match raw / magnitude {
            n if n < 1.5 => 1.0,
            n if n < 3.0 => 2.0,
            n if n < 7.0 => 5.0,
            _ => 10.0,
        } * magnitude;
        Self {
            min: (lo / step).floor() * step,
            max: (hi / step).ceil() * step,
            step,
        }
    }

    /// Tick values from `min` to `max`
    pub fn ticks(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step).round() as usize;
        (0..=count)
            .map(|i| self.min + self.step * i as f64)
            .collect()
    }

    /// Tick label with as many decimals as the step needs
    pub fn label(&self, value: f64) -> String {
        let decimals = if self.step >= 1.0 {
            0
        } else {
            (-self.step.log10().floor()) as usize
        };
        let value = if value.abs() < self.step * 1e-9 {
            0.0
        } else {
            value
        };
        format!("{value:.decimals$}")
    }
}

/// Linear map from a data range to a pixel range
#[derive(Debug, Clone, Copy)]
struct Scale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl Scale {
    fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }
}

fn px(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn polyline(points: impl IntoIterator<Item = (f64, f64)>) -> String {
    points
        .into_iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Serialize)]
struct Tick {
    pos: f64,
    label: String,
}

#[derive(Debug, Serialize)]
struct Frame {
    width: f64,
    height: f64,
    title: String,
    x_label: String,
    y_label: String,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    rotate_x: bool,
    x_ticks: Vec<Tick>,
    y_ticks: Vec<Tick>,
}

impl Frame {
    fn new(text: &ChartText, left: f64) -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            title: text.title.clone(),
            x_label: text.x_label.clone(),
            y_label: text.y_label.clone(),
            left,
            right: WIDTH - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: HEIGHT - MARGIN_BOTTOM,
            rotate_x: false,
            x_ticks: Vec::new(),
            y_ticks: Vec::new(),
        }
    }

    fn numeric_ticks(axis: &Axis, scale: &Scale) -> Vec<Tick> {
        axis.ticks()
            .into_iter()
            .map(|t| Tick {
                pos: px(scale.map(t)),
                label: axis.label(t),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct Marker {
    x: f64,
    y: f64,
    label: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    label: String,
}

#[derive(Serialize)]
struct LineContext {
    #[serde(flatten)]
    frame: Frame,
    points: String,
    markers: Vec<Marker>,
}

#[derive(Serialize)]
struct HistogramContext {
    #[serde(flatten)]
    frame: Frame,
    bars: Vec<Rect>,
    curve: String,
}

#[derive(Serialize)]
struct BarsContext {
    #[serde(flatten)]
    frame: Frame,
    bars: Vec<Rect>,
}

/// Renders charts from the bundled SVG templates
pub struct SvgRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for SvgRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgRenderer").finish_non_exhaustive()
    }
}

impl SvgRenderer {
    /// Load the templates
    pub fn new() -> std::result::Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_template("frame.svg", include_str!("../templates/frame.svg"))?;
        env.add_template("line.svg", include_str!("../templates/line.svg"))?;
        env.add_template("histogram.svg", include_str!("../templates/histogram.svg"))?;
        env.add_template("bars.svg", include_str!("../templates/bars.svg"))?;
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, chart: &'static str, template: &str, ctx: S) -> Result<String> {
        self.env
            .get_template(template)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|source| Error::Template { chart, source })
    }

    /// Line chart over categorical x values, in the order given
    pub fn line(&self, text: &ChartText, points: &[(String, f64)]) -> Result<String> {
        let mut frame = Frame::new(text, MARGIN_LEFT);
        frame.rotate_x = true;

        let n = points.len();
        let x_of = |i: usize| {
            if n <= 1 {
                (frame.left + frame.right) / 2.0
            } else {
                frame.left + 10.0 + (frame.right - frame.left - 20.0) * i as f64 / (n - 1) as f64
            }
        };

        let lo = points.iter().map(|p| p.1).fold(0.0_f64, f64::min);
        let hi = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let axis = Axis::nice(lo, hi, TARGET_TICKS);
        let y = Scale::new((axis.min, axis.max), (frame.bottom, frame.top));

        let every = n.div_ceil(MAX_X_LABELS).max(1);
        let x_ticks = points
            .iter()
            .enumerate()
            .filter(|(i, _)| i % every == 0)
            .map(|(i, (label, _))| Tick {
                pos: px(x_of(i)),
                label: label.clone(),
            })
            .collect();
        let markers = points
            .iter()
            .enumerate()
            .map(|(i, (label, value))| Marker {
                x: px(x_of(i)),
                y: px(y.map(*value)),
                label: label.clone(),
                value: format!("{value:.2}"),
            })
            .collect();
        let line = polyline(points.iter().enumerate().map(|(i, p)| (x_of(i), y.map(p.1))));

        frame.x_ticks = x_ticks;
        frame.y_ticks = Frame::numeric_ticks(&axis, &y);
        self.render(
            text.name,
            "line.svg",
            LineContext {
                frame,
                points: line,
                markers,
            },
        )
    }

    /// Histogram with an optional density curve in count units
    pub fn histogram(
        &self,
        text: &ChartText,
        histogram: &Histogram,
        curve: &[(f64, f64)],
    ) -> Result<String> {
        let mut frame = Frame::new(text, MARGIN_LEFT);

        let lo = histogram.edges.first().copied().unwrap_or(0.0);
        let hi = histogram.edges.last().copied().unwrap_or(1.0);
        let x_axis = Axis::nice(lo, hi, TARGET_TICKS);
        let x = Scale::new((x_axis.min, x_axis.max), (frame.left, frame.right));

        let curve_max = curve.iter().map(|p| p.1).fold(0.0_f64, f64::max);
        let y_axis = Axis::nice(0.0, (histogram.max_count() as f64).max(curve_max), TARGET_TICKS);
        let y = Scale::new((y_axis.min, y_axis.max), (frame.bottom, frame.top));

        let bars = histogram
            .counts
            .iter()
            .zip(histogram.edges.windows(2))
            .map(|(count, edge)| {
                let top = y.map(*count as f64);
                Rect {
                    x: px(x.map(edge[0])),
                    y: px(top),
                    width: px(x.map(edge[1]) - x.map(edge[0])),
                    height: px(frame.bottom - top),
                    label: format!("{:.2} to {:.2}: {}", edge[0], edge[1], count),
                }
            })
            .collect();

        frame.x_ticks = Frame::numeric_ticks(&x_axis, &x);
        frame.y_ticks = Frame::numeric_ticks(&y_axis, &y);
        self.render(
            text.name,
            "histogram.svg",
            HistogramContext {
                frame,
                bars,
                curve: polyline(curve.iter().map(|(cx, cy)| (x.map(*cx), y.map(*cy)))),
            },
        )
    }

    /// Horizontal bar chart, first entry at the top
    pub fn bars(&self, text: &ChartText, bars: &[(String, f64)]) -> Result<String> {
        let mut frame = Frame::new(text, MARGIN_LEFT_LABELS);

        let hi = bars.iter().map(|b| b.1).fold(0.0_f64, f64::max);
        let axis = Axis::nice(0.0, hi, TARGET_TICKS);
        let x = Scale::new((axis.min, axis.max), (frame.left, frame.right));

        let band = (frame.bottom - frame.top) / bars.len().max(1) as f64;
        let rects = bars
            .iter()
            .enumerate()
            .map(|(i, (label, value))| Rect {
                x: frame.left,
                y: px(frame.top + band * i as f64 + band * 0.15),
                width: px(x.map(*value) - frame.left),
                height: px(band * 0.7),
                label: format!("{label}: {value:.2}"),
            })
            .collect();
        let y_ticks = bars
            .iter()
            .enumerate()
            .map(|(i, (label, _))| Tick {
                pos: px(frame.top + band * (i as f64 + 0.5)),
                label: label.clone(),
            })
            .collect();

        frame.x_ticks = Frame::numeric_ticks(&axis, &x);
        frame.y_ticks = y_ticks;
        self.render(text.name, "bars.svg", BarsContext { frame, bars: rects })
    }
}
