use clap::Parser;
use std::path::PathBuf;

use crate::report::ReportOptions;

#[derive(Parser, Debug)]
#[command(
    name = "packet-progress",
    version,
    about = "Static progress report for registered packet handlers"
)]
pub struct Args {
    /// Path to a file in the analyzed repo, used to locate go.mod.
    #[arg(long, default_value = "cmd/server/main.go")]
    pub main: PathBuf,

    /// Output path of the JSON report.
    #[arg(long, default_value = "docs/packet-progress.json")]
    pub out_json: PathBuf,

    /// Output path of the SVG progress chart.
    #[arg(long, default_value = "docs/packet-progress.svg")]
    pub out_svg: PathBuf,

    /// Optional PNG output, rendered from the SVG via rsvg-convert.
    #[arg(long)]
    pub out_png: Option<PathBuf>,

    /// Zoom factor passed to rsvg-convert.
    #[arg(long, default_value_t = 1.0)]
    pub png_scale: f64,

    /// Font family embedded in the SVG legend.
    #[arg(long, default_value = "Verdana, Arial, sans-serif")]
    pub font_family: String,

    /// Status override map, keyed by decimal packet ID.
    #[arg(long, default_value = "packet-progress/overrides.json")]
    pub overrides: PathBuf,

    /// Heuristic weight and threshold config.
    #[arg(long, default_value = "packet-progress/heuristics.json")]
    pub heuristics: PathBuf,

    /// Track client-to-server command types only.
    #[arg(long)]
    pub cs: bool,

    /// Track server-to-client response types only.
    #[arg(long)]
    pub sc: bool,

    /// Track both directions (also the default when neither flag is given).
    #[arg(long)]
    pub both: bool,
}

impl Args {
    /// `png` as the first positional argument is a shorthand that enables PNG
    /// output next to the SVG without spelling out --out-png.
    pub fn apply_png_mode(&mut self, png_mode: bool) {
        if png_mode && self.out_png.is_none() {
            self.out_png = Some(crate::util::replace_ext(&self.out_svg, "png"));
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        if self.both || (!self.cs && !self.sc) {
            return ReportOptions {
                include_cs: true,
                include_sc: true,
            };
        }
        ReportOptions {
            include_cs: self.cs,
            include_sc: self.sc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_track_both_directions() {
        let args = Args::parse_from(["packet-progress"]);
        let options = args.report_options();
        assert!(options.include_cs);
        assert!(options.include_sc);
    }

    #[test]
    fn direction_flags_narrow_tracking() {
        let args = Args::parse_from(["packet-progress", "--cs"]);
        let options = args.report_options();
        assert!(options.include_cs);
        assert!(!options.include_sc);

        let args = Args::parse_from(["packet-progress", "--sc", "--both"]);
        let options = args.report_options();
        assert!(options.include_cs);
        assert!(options.include_sc);
    }

    #[test]
    fn png_mode_derives_output_from_svg_path() {
        let mut args = Args::parse_from(["packet-progress", "--out-svg", "docs/chart.svg"]);
        args.apply_png_mode(true);
        assert_eq!(args.out_png, Some(PathBuf::from("docs/chart.png")));

        let mut args =
            Args::parse_from(["packet-progress", "--out-png", "custom.png"]);
        args.apply_png_mode(true);
        assert_eq!(args.out_png, Some(PathBuf::from("custom.png")));
    }
}
