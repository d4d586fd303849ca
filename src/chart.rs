//! SVG pie chart of the progress counts, plus optional PNG conversion.
//!
//! The output is deterministic for a given input: fixed geometry, fixed slice
//! order, coordinates rounded to integers before formatting.

use crate::heuristics::Status;
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

const WIDTH: i64 = 1200;
const HEIGHT: i64 = 780;
const CENTER_Y: i64 = 210;
const RADIUS: i64 = 150;
const LEGEND_Y: i64 = 420;
const LEGEND_GAP: i64 = 70;
const LEGEND_FONT_SIZE: i64 = 52;
const TEXT_STROKE: &str = "#000000";
const TEXT_STROKE_WIDTH: i64 = 4;

const SLICE_ORDER: [Status; 5] = [
    Status::Implemented,
    Status::Partial,
    Status::Stub,
    Status::Panic,
    Status::Missing,
];

fn color(status: Status) -> &'static str {
    match status {
        Status::Implemented => "#00c853",
        Status::Partial => "#ffeb3b",
        Status::Stub => "#8e8e8e",
        Status::Panic => "#ff1744",
        Status::Missing => "#424242",
    }
}

pub fn build_svg(counts: &BTreeMap<Status, i64>, total: i64, font_family: &str) -> String {
    let center_x = WIDTH / 2;
    let safe_font = font_family.replace('"', "'");
    let count_of = |status: Status| counts.get(&status).copied().unwrap_or(0);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">"
    );

    if total > 0 {
        let mut start_angle = -90.0;
        for status in SLICE_ORDER {
            let count = count_of(status);
            if count == 0 {
                continue;
            }
            let sweep = count as f64 / total as f64 * 360.0;
            let end_angle = start_angle + sweep;
            let path = pie_slice_path(center_x, CENTER_Y, RADIUS, start_angle, end_angle);
            let _ = write!(svg, "<path d=\"{path}\" fill=\"{}\"/>", color(status));
            start_angle = end_angle;
        }
    } else {
        let _ = write!(
            svg,
            "<circle cx=\"{center_x}\" cy=\"{CENTER_Y}\" r=\"{RADIUS}\" fill=\"#2b2b2b\"/>"
        );
    }

    let legend_x = center_x - 300;
    let mut legend_y = LEGEND_Y;
    for status in SLICE_ORDER {
        let count = count_of(status);
        let percentage = if total > 0 {
            (count as f64 / total as f64 * 100.0).round() as i64
        } else {
            0
        };
        let _ = write!(
            svg,
            "<rect x=\"{legend_x}\" y=\"{}\" width=\"32\" height=\"32\" fill=\"{}\"/>",
            legend_y - 32,
            color(status)
        );
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{legend_y}\" fill=\"#ffffff\" font-family=\"{safe_font}\" font-size=\"{LEGEND_FONT_SIZE}\" stroke=\"{TEXT_STROKE}\" stroke-width=\"{TEXT_STROKE_WIDTH}\" paint-order=\"stroke fill\">{} {count} ({percentage}%)</text>",
            legend_x + 48,
            status.label()
        );
        legend_y += LEGEND_GAP;
    }

    let _ = write!(
        svg,
        "<title>implemented {}, partial {}, stub {}, panic {}, missing {}</title>",
        count_of(Status::Implemented),
        count_of(Status::Partial),
        count_of(Status::Stub),
        count_of(Status::Panic),
        count_of(Status::Missing)
    );
    svg.push_str("</svg>");
    svg
}

fn pie_slice_path(cx: i64, cy: i64, radius: i64, start_angle: f64, end_angle: f64) -> String {
    let (start_x, start_y) = polar_to_cartesian(cx, cy, radius, end_angle);
    let (end_x, end_y) = polar_to_cartesian(cx, cy, radius, start_angle);
    let large_arc = if end_angle - start_angle > 180.0 { 1 } else { 0 };
    format!("M {cx} {cy} L {start_x} {start_y} A {radius} {radius} 0 {large_arc} 0 {end_x} {end_y} Z")
}

fn polar_to_cartesian(cx: i64, cy: i64, radius: i64, angle_deg: f64) -> (i64, i64) {
    let angle_rad = (angle_deg - 90.0).to_radians();
    let x = cx as f64 + radius as f64 * angle_rad.cos();
    let y = cy as f64 + radius as f64 * angle_rad.sin();
    (x.round() as i64, y.round() as i64)
}

pub fn write_svg(
    path: &Path,
    counts: &BTreeMap<Status, i64>,
    total: i64,
    font_family: &str,
) -> Result<()> {
    crate::util::ensure_parent_dir(path)?;
    std::fs::write(path, build_svg(counts, total, font_family))
        .with_context(|| format!("write {}", path.display()))
}

pub fn write_png(svg_path: &Path, png_path: &Path, scale: f64) -> Result<()> {
    let scale = if scale <= 0.0 { 1.0 } else { scale };
    crate::util::ensure_parent_dir(png_path)?;
    let status = Command::new("rsvg-convert")
        .arg("--zoom")
        .arg(format!("{scale:.2}"))
        .arg("-o")
        .arg(png_path)
        .arg(svg_path)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("rsvg-convert not found; install librsvg")
            } else {
                anyhow::Error::from(err).context("run rsvg-convert")
            }
        })?;
    if !status.success() {
        bail!("rsvg-convert exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(
        implemented: i64,
        partial: i64,
        stub: i64,
        panic: i64,
        missing: i64,
    ) -> BTreeMap<Status, i64> {
        BTreeMap::from([
            (Status::Implemented, implemented),
            (Status::Partial, partial),
            (Status::Stub, stub),
            (Status::Panic, panic),
            (Status::Missing, missing),
        ])
    }

    #[test]
    fn slices_skip_zero_counts_and_follow_fixed_order() {
        let svg = build_svg(&counts(5, 0, 3, 0, 2), 10, "Verdana");
        assert_eq!(svg.matches("<path ").count(), 3);
        // Slice colors appear in implemented, stub, missing order.
        let implemented = svg.find("#00c853").unwrap();
        let stub = svg.find("#8e8e8e").unwrap();
        let missing = svg.find("#424242").unwrap();
        assert!(implemented < stub && stub < missing);
        assert!(svg.contains(
            "<title>implemented 5, partial 0, stub 3, panic 0, missing 2</title>"
        ));
    }

    #[test]
    fn half_circle_slice_geometry() {
        // 5 of 10 sweeps 180 degrees from the top of the circle.
        let svg = build_svg(&counts(5, 0, 3, 0, 2), 10, "Verdana");
        assert!(svg.contains("M 600 210 L 750 210 A 150 150 0 0 0 450 210 Z"));
    }

    #[test]
    fn majority_slice_uses_large_arc_flag() {
        let path = pie_slice_path(600, 210, 150, -90.0, 126.0);
        assert!(path.contains(" A 150 150 0 1 0 "));
    }

    #[test]
    fn empty_total_renders_placeholder_circle() {
        let svg = build_svg(&counts(0, 0, 0, 0, 0), 0, "Verdana");
        assert!(svg.contains("<circle cx=\"600\" cy=\"210\" r=\"150\" fill=\"#2b2b2b\"/>"));
        assert_eq!(svg.matches("<path ").count(), 0);
        // Legend still lists all five statuses at 0%.
        assert_eq!(svg.matches("<text ").count(), 5);
        assert!(svg.contains("Implemented 0 (0%)"));
    }

    #[test]
    fn output_is_deterministic_and_escapes_font_quotes() {
        let a = build_svg(&counts(1, 2, 3, 4, 5), 15, "\"Noto Sans\", sans-serif");
        let b = build_svg(&counts(1, 2, 3, 4, 5), 15, "\"Noto Sans\", sans-serif");
        assert_eq!(a, b);
        assert!(a.contains("font-family=\"'Noto Sans', sans-serif\""));
    }

    #[test]
    fn legend_rows_are_spaced_by_fixed_gap() {
        let svg = build_svg(&counts(1, 0, 0, 0, 0), 1, "Verdana");
        for row in 0..5 {
            let y = LEGEND_Y + row * LEGEND_GAP;
            assert!(svg.contains(&format!("y=\"{y}\"")), "missing legend row at {y}");
        }
    }
}
