//! Source analysis: parsing the target repo and driving the report pipeline.

pub mod classify;
pub mod goast;
pub mod handlers;
pub mod imports;
pub mod registrations;
pub mod responses;
pub mod scan;

use crate::catalog::{ProtoDirCatalog, SC_PREFIX, name_map};
use crate::cli::Args;
use crate::heuristics::{load_heuristics, load_overrides};
use crate::{chart, report};
use anyhow::{Context, Result};
use goast::GoParser;
use handlers::HandlerIndex;
use imports::{CollaboratorPaths, ImportAliases};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tree_sitter::Tree;

/// One parsed Go source file with its per-file import tables. The tree stays
/// alive for the whole run; everything downstream borrows nodes from it.
#[derive(Debug)]
pub struct ParsedFile {
    pub rel_path: String,
    pub source: String,
    pub tree: Tree,
    pub aliases: ImportAliases,
    pub import_map: HashMap<String, String>,
    /// Import path of the package this file belongs to.
    pub import_path: String,
}

#[derive(Debug)]
pub struct SourceForest {
    pub repo_root: PathBuf,
    pub module_path: String,
    pub files: Vec<ParsedFile>,
}

impl SourceForest {
    /// Parse every analyzable Go file under the module root. A file that does
    /// not parse fails the whole run; a partial forest would silently
    /// under-report registrations.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let module_path = scan::load_module_path(repo_root)?;
        let paths = CollaboratorPaths::for_module(&module_path);
        let mut parser = GoParser::new()?;
        let mut files = Vec::new();
        for file in scan::scan_go_files(repo_root)? {
            let tree = parser.parse(&file.source, &file.rel_path)?;
            let root = tree.root_node();
            let aliases = imports::collect_aliases(root, &file.source, &paths);
            let import_map = imports::collect_import_map(root, &file.source);
            let import_path = scan::package_import_path(&module_path, &file.rel_path);
            files.push(ParsedFile {
                rel_path: file.rel_path,
                source: file.source,
                tree,
                aliases,
                import_map,
                import_path,
            });
        }
        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            module_path,
            files,
        })
    }
}

/// Full pipeline: parse, extract, classify, reconcile, write outputs.
/// Returns the paths written, in output order.
pub fn run(args: &Args) -> Result<Vec<PathBuf>> {
    let cfg = load_heuristics(&args.heuristics)
        .with_context(|| format!("load heuristics from {}", args.heuristics.display()))?;
    let overrides = load_overrides(&args.overrides)
        .with_context(|| format!("load overrides from {}", args.overrides.display()))?;

    let main_dir = args.main.parent().filter(|dir| !dir.as_os_str().is_empty());
    let repo_root = scan::find_repo_root(main_dir.unwrap_or(Path::new(".")))?;
    let forest = SourceForest::load(&repo_root)?;

    let registrations = registrations::extract_registrations(&forest.files)?;
    let index = HandlerIndex::build(&forest.files);

    let const_values = responses::collect_const_values(&forest.files);
    let usage = responses::collect_response_usage(&forest.files, &const_values);

    let catalog = ProtoDirCatalog::load(&repo_root.join(scan::PROTO_DIR))?;
    let response_reports =
        report::build_response_reports(&usage, &name_map(&catalog, SC_PREFIX));
    let packets = report::build_packet_reports(&registrations, &index, &cfg, &overrides);
    let generated = report::build_report(
        packets,
        response_reports,
        overrides,
        index.duplicates,
        &catalog,
        args.report_options(),
    );

    report::write_json(&args.out_json, &generated)?;
    chart::write_svg(
        &args.out_svg,
        &generated.counts,
        generated.total_known,
        &args.font_family,
    )?;

    let mut outputs = vec![args.out_json.clone(), args.out_svg.clone()];
    if let Some(out_png) = &args.out_png {
        chart::write_png(&args.out_svg, out_png, args.png_scale)?;
        outputs.push(out_png.clone());
    }
    Ok(outputs)
}
