// 🎨 Charts - SVG rendering with plotters
// Every function returns a complete <svg> document as a String

use crate::analysis::benchmark::BenchmarkView;
use crate::analysis::impact::ImpactView;
use crate::analysis::quintiles::QuintileBucket;
use crate::analysis::timeseries::{SectorTrend, SeriesPoint, TimeSeriesView};
use crate::error::{DashboardError, Result};
use crate::stats::histogram;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Number of bins in distribution charts
pub const HISTOGRAM_BINS: usize = 40;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

fn color(index: usize) -> RGBAColor {
    Palette99::pick(index).to_rgba()
}

fn padded(min: f64, max: f64, fraction: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max - min < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * fraction;
    (min - pad, max + pad)
}

fn render(size: ChartSize, draw: impl FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult) -> Result<String> {
    let mut buffer = String::new();
    {
        let root = SVGBackend::with_string(&mut buffer, (size.width, size.height)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| DashboardError::Chart(e.to_string()))?;
        draw(&root).map_err(|e| DashboardError::Chart(e.to_string()))?;
        root.present()
            .map_err(|e| DashboardError::Chart(e.to_string()))?;
    }
    Ok(buffer)
}

/// Placeholder drawn instead of a chart when there is nothing to plot
fn draw_placeholder(root: &DrawingArea<SVGBackend<'_>, Shift>, message: &str) -> DrawResult {
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2 - 150, h as i32 / 2),
        ("sans-serif", 20).into_font().color(&BLACK.mix(0.6)),
    ))?;
    Ok(())
}

pub fn placeholder_svg(message: &str, size: ChartSize) -> Result<String> {
    render(size, |root| draw_placeholder(root, message))
}

fn zero_line<DB: DrawingBackend>(x_min: f64, x_max: f64) -> LineSeries<DB, (f64, f64)> {
    LineSeries::new(vec![(x_min, 0.0), (x_max, 0.0)], BLACK.mix(0.4).stroke_width(1))
}

// ============================================================================
// SCATTER
// ============================================================================

/// Governance score vs. return, with regression line(s)
pub fn scatter_svg(view: &ImpactView, size: ChartSize) -> Result<String> {
    if view.points.is_empty() {
        return placeholder_svg("No data for the current selection", size);
    }

    let x_min = view.points.iter().map(|p| p.governance_score).fold(f64::INFINITY, f64::min);
    let x_max = view.points.iter().map(|p| p.governance_score).fold(f64::NEG_INFINITY, f64::max);
    let (x_lo, x_hi) = padded(x_min, x_max, 0.05);
    let (y_lo, y_hi) = view.y_range;

    let caption = match &view.regression {
        Some(reg) => format!(
            "Governance score vs. annual return (r = {:.2}, slope {:.3} pp/point, p = {:.3})",
            reg.r, reg.slope, reg.p
        ),
        None => "Governance score vs. annual return".to_string(),
    };

    // Stable colour per group
    let mut group_index: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &view.points {
        if let Some(g) = &p.group {
            let next = group_index.len();
            group_index.entry(g.as_str()).or_insert(next);
        }
    }

    render(size, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(caption, ("sans-serif", 18))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        chart
            .configure_mesh()
            .x_desc("Governance score")
            .y_desc("Return (%)")
            .y_label_formatter(&|y| format!("{y:.0} %"))
            .draw()?;

        if y_lo <= 0.0 && y_hi >= 0.0 {
            chart.draw_series(zero_line(x_lo, x_hi))?;
        }

        let visible = |y: f64| y >= y_lo && y <= y_hi;

        if group_index.is_empty() {
            let c = color(0);
            chart.draw_series(
                view.points
                    .iter()
                    .filter(|p| visible(p.annual_return_pct))
                    .map(|p| Circle::new((p.governance_score, p.annual_return_pct), 3, c.mix(0.6).filled())),
            )?;
        } else {
            for (group, &i) in &group_index {
                let c = color(i);
                chart
                    .draw_series(
                        view.points
                            .iter()
                            .filter(|p| p.group.as_deref() == Some(*group) && visible(p.annual_return_pct))
                            .map(|p| Circle::new((p.governance_score, p.annual_return_pct), 3, c.mix(0.6).filled())),
                    )?
                    .label(group.to_string())
                    .legend(move |(x, y)| Circle::new((x, y), 4, c.filled()));
            }
            for g in &view.groups {
                let c = color(group_index.get(g.group.as_str()).copied().unwrap_or(0));
                chart.draw_series(LineSeries::new(g.regression.fit_line(x_lo, x_hi), c.stroke_width(2)))?;
            }
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        if let Some(reg) = &view.regression {
            chart.draw_series(LineSeries::new(reg.fit_line(x_lo, x_hi), BLACK.stroke_width(2)))?;
        }
        Ok(())
    })
}

// ============================================================================
// QUINTILE BARS
// ============================================================================

/// Mean return per governance quintile
pub fn quintile_svg(buckets: &[QuintileBucket], title: &str, size: ChartSize) -> Result<String> {
    let bars: Vec<(u32, &QuintileBucket, f64)> = buckets
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.mean_return.map(|m| (i as u32, b, m)))
        .collect();
    if bars.is_empty() {
        return placeholder_svg("Not enough data points to form quintiles", size);
    }

    let (y_lo, y_hi) = padded(
        bars.iter().map(|b| b.2).fold(0.0, f64::min),
        bars.iter().map(|b| b.2).fold(0.0, f64::max),
        0.15,
    );
    let last = (buckets.len() as u32).saturating_sub(1);
    let labels: Vec<String> = buckets.iter().map(|b| b.label.clone()).collect();

    render(size, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 18))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..last).into_segmented(), y_lo..y_hi)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Governance score (quintile)")
            .y_desc("Mean return (%)")
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(bars.iter().map(|(i, _, mean)| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(*i), 0.0), (SegmentValue::Exact(*i + 1), *mean)],
                color(*i as usize).mix(0.8).filled(),
            );
            bar.set_margin(0, 0, 12, 12);
            bar
        }))?;

        chart.draw_series(bars.iter().map(|(i, _, mean)| {
            Text::new(
                format!("{mean:.2}"),
                (SegmentValue::CenterOf(*i), *mean),
                ("sans-serif", 14).into_font(),
            )
        }))?;
        Ok(())
    })
}

// ============================================================================
// SECTOR BOX PLOT
// ============================================================================

/// Governance score distribution per sector for the benchmark year
pub fn benchmark_svg(view: &BenchmarkView, size: ChartSize) -> Result<String> {
    if view.sectors.is_empty() {
        return placeholder_svg("No data for the selected year", size);
    }

    let min = view.sectors.iter().map(|s| s.summary.min).fold(f64::INFINITY, f64::min);
    let max = view.sectors.iter().map(|s| s.summary.max).fold(f64::NEG_INFINITY, f64::max);
    let (y_lo, y_hi) = padded(min, max, 0.1);
    let last = (view.sectors.len() as u32).saturating_sub(1);
    let labels: Vec<String> = view.sectors.iter().map(|s| s.sector.clone()).collect();
    let caption = match view.year {
        Some(year) => format!("Governance score distribution by sector ({year})"),
        None => "Governance score distribution by sector".to_string(),
    };

    render(size, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(caption, ("sans-serif", 18))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..last).into_segmented(), (y_lo as f32)..(y_hi as f32))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc("Governance score")
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        for (i, sector) in view.sectors.iter().enumerate() {
            let c = color(i);
            let quartiles = Quartiles::new(&sector.scores);
            chart.draw_series(std::iter::once(
                Boxplot::new_vertical(SegmentValue::CenterOf(i as u32), &quartiles)
                    .width(24)
                    .whisker_width(0.5)
                    .style(c),
            ))?;
            chart.draw_series(
                sector
                    .scores
                    .iter()
                    .map(|s| Circle::new((SegmentValue::CenterOf(i as u32), *s as f32), 2, c.mix(0.5).filled())),
            )?;
        }
        Ok(())
    })
}

// ============================================================================
// TIME SERIES
// ============================================================================

fn year_axis(years: Option<(i32, i32)>) -> (f64, f64) {
    match years {
        Some((lo, hi)) => (lo as f64 - 0.5, hi as f64 + 0.5),
        None => (0.0, 1.0),
    }
}

fn year_label(x: &f64) -> String {
    if x.fract().abs() < 1e-9 {
        format!("{x:.0}")
    } else {
        String::new()
    }
}

/// Governance score (left axis) and annual return (right axis) per company
pub fn timeseries_svg(view: &TimeSeriesView, size: ChartSize) -> Result<String> {
    if view.series.is_empty() {
        return placeholder_svg("Select at least one company", size);
    }

    let (x_lo, x_hi) = year_axis(view.years);
    let score_min = view.series.iter().flat_map(|s| s.points.iter().map(|p| p.governance_score)).fold(f64::INFINITY, f64::min);
    let score_max = view.series.iter().flat_map(|s| s.points.iter().map(|p| p.governance_score)).fold(f64::NEG_INFINITY, f64::max);
    let (s_lo, s_hi) = padded(score_min, score_max, 0.1);
    let (r_lo, r_hi) = view.return_axis;

    render(size, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Governance score and annual return over time", ("sans-serif", 18))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .right_y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, s_lo..s_hi)?
            .set_secondary_coord(x_lo..x_hi, r_lo..r_hi);

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc("Governance score")
            .x_label_formatter(&year_label)
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_desc("Return (%)")
            .y_label_formatter(&|y| format!("{y:.0} %"))
            .draw()?;

        chart.draw_secondary_series(zero_line(x_lo, x_hi))?;

        for (i, series) in view.series.iter().enumerate() {
            let score_color = color(2 * i);
            let return_color = color(2 * i + 1);

            chart
                .draw_series(LineSeries::new(
                    series.points.iter().map(|p| (p.year as f64, p.governance_score)),
                    score_color.stroke_width(2),
                ))?
                .label(format!("{} - governance score", series.company))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], score_color.stroke_width(2)));
            chart.draw_series(
                series
                    .points
                    .iter()
                    .map(|p| Circle::new((p.year as f64, p.governance_score), 3, score_color.filled())),
            )?;

            chart
                .draw_secondary_series(LineSeries::new(
                    series.points.iter().map(|p| (p.year as f64, p.annual_return_pct)),
                    return_color.stroke_width(2),
                ))?
                .label(format!("{} - annual return (%)", series.company))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], return_color.stroke_width(2)));
            chart.draw_secondary_series(
                series
                    .points
                    .iter()
                    .map(|p| Circle::new((p.year as f64, p.annual_return_pct), 3, return_color.filled())),
            )?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    })
}

/// Two stacked panels: mean governance score and mean return per sector
pub fn sector_trends_svg(trends: &[SectorTrend], size: ChartSize) -> Result<String> {
    let points = trends.iter().flat_map(|t| t.points.iter());
    let years = points.clone().map(|p| p.year).fold(None, |acc: Option<(i32, i32)>, y| match acc {
        Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        None => Some((y, y)),
    });
    if years.is_none() {
        return placeholder_svg("Select at least one sector", size);
    }

    let (x_lo, x_hi) = year_axis(years);
    let (s_lo, s_hi) = padded(
        points.clone().map(|p| p.governance_score).fold(f64::INFINITY, f64::min),
        points.clone().map(|p| p.governance_score).fold(f64::NEG_INFINITY, f64::max),
        0.1,
    );
    let (r_lo, r_hi) = padded(
        points.clone().map(|p| p.annual_return_pct).fold(0.0, f64::min),
        points.map(|p| p.annual_return_pct).fold(0.0, f64::max),
        0.1,
    );

    let panel_size = ChartSize {
        width: size.width,
        height: size.height * 2,
    };

    render(panel_size, |root| {
        let panels = root.split_evenly((2, 1));
        let specs = [
            ("Sector trend: governance score", "Governance score", (s_lo, s_hi), true),
            ("Sector trend: annual return", "Return (%)", (r_lo, r_hi), false),
        ];

        for (panel, (caption, y_desc, (lo, hi), is_score)) in panels.iter().zip(specs) {
            let mut chart = ChartBuilder::on(panel)
                .caption(caption, ("sans-serif", 18))
                .margin(15)
                .x_label_area_size(45)
                .y_label_area_size(60)
                .build_cartesian_2d(x_lo..x_hi, lo..hi)?;

            chart
                .configure_mesh()
                .x_desc("Year")
                .y_desc(y_desc)
                .x_label_formatter(&year_label)
                .draw()?;

            if !is_score {
                chart.draw_series(zero_line(x_lo, x_hi))?;
            }

            for (i, trend) in trends.iter().enumerate() {
                let c = color(i);
                let value = |p: &SeriesPoint| {
                    if is_score {
                        p.governance_score
                    } else {
                        p.annual_return_pct
                    }
                };
                chart
                    .draw_series(LineSeries::new(
                        trend.points.iter().map(|p| (p.year as f64, value(p))),
                        c.stroke_width(2),
                    ))?
                    .label(trend.sector.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(2)));
            }

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    })
}

// ============================================================================
// HISTOGRAM
// ============================================================================

pub fn histogram_svg(values: &[f64], title: &str, x_desc: &str, size: ChartSize) -> Result<String> {
    let bins = histogram(values, HISTOGRAM_BINS);
    if bins.is_empty() {
        return placeholder_svg("No data for the histogram", size);
    }

    let x_lo = bins[0].0;
    let x_hi = bins[bins.len() - 1].1;
    let max_count = bins.iter().map(|b| b.2).max().unwrap_or(1).max(1) as f64;

    render(size, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 18))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, 0.0..max_count * 1.1)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(x_desc)
            .y_desc("Frequency")
            .y_label_formatter(&|y| format!("{y:.0}"))
            .draw()?;

        let c = color(0);
        chart.draw_series(bins.iter().map(|&(lo, hi, count)| {
            Rectangle::new([(lo, 0.0), (hi, count as f64)], c.mix(0.7).filled())
        }))?;
        Ok(())
    })
}
