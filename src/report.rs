//! Report Assembler: merges handler classifications into per-packet reports,
//! reconciles against the catalog, and writes the JSON output.

use crate::analysis::classify::{self, AnalysisResult};
use crate::analysis::goast::line_of;
use crate::analysis::handlers::HandlerIndex;
use crate::analysis::registrations::PacketRegistration;
use crate::catalog::{CS_PREFIX, Catalog, SC_PREFIX, known_ids};
use crate::heuristics::{HeuristicsConfig, Status};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerReport {
    pub name: String,
    pub status: Status,
    pub score: i64,
    pub signals: Vec<String>,
    pub file: String,
    pub line: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketReport {
    pub id: i64,
    pub status: Status,
    pub computed_status: Status,
    pub score: i64,
    pub signals: Vec<String>,
    pub handlers: Vec<HandlerReport>,
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub override_status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseReport {
    pub id: i64,
    pub name: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: String,
    #[serde(rename = "total_registered")]
    pub total: i64,
    pub total_known: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total_known_cs: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total_known_sc: i64,
    pub missing: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub missing_cs: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub missing_sc: i64,
    pub missing_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_cs_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_sc_ids: Vec<i64>,
    pub counts: BTreeMap<Status, i64>,
    pub packets: Vec<PacketReport>,
    pub responses: Vec<ResponseReport>,
    pub overrides: BTreeMap<String, Status>,
    /// Handler declarations dropped by first-wins dedup; diagnostic only.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duplicate_handlers: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub include_cs: bool,
    pub include_sc: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_cs: true,
            include_sc: true,
        }
    }
}

/// Worst-case combination of handler statuses. Panic is absorbing; a packet
/// with both implemented and unimplemented handlers degrades to partial.
pub fn combine_statuses(statuses: &[Status]) -> Status {
    let mut has_implemented = false;
    let mut has_partial = false;
    let mut has_stub = false;
    for status in statuses {
        match status {
            Status::Panic => return Status::Panic,
            Status::Implemented => has_implemented = true,
            Status::Partial => has_partial = true,
            Status::Stub => has_stub = true,
            Status::Missing => {}
        }
    }
    if has_implemented && (has_partial || has_stub) {
        return Status::Partial;
    }
    if has_partial {
        return Status::Partial;
    }
    if has_implemented {
        return Status::Implemented;
    }
    Status::Stub
}

fn combine_handler_reports(handlers: &[HandlerReport]) -> AnalysisResult {
    if handlers.is_empty() {
        return AnalysisResult {
            status: Status::Stub,
            score: 0,
            signals: BTreeSet::from([classify::SIG_NO_HANDLERS.to_string()]),
        };
    }
    let statuses: Vec<Status> = handlers.iter().map(|handler| handler.status).collect();
    let score = handlers
        .iter()
        .map(|handler| handler.score)
        .max()
        .unwrap_or(0);
    let mut signals = BTreeSet::new();
    for handler in handlers {
        signals.extend(handler.signals.iter().cloned());
    }
    AnalysisResult {
        status: combine_statuses(&statuses),
        score,
        signals,
    }
}

/// Analyze every handler of every registration and assemble packet reports,
/// sorted ascending by ID. Overrides replace the displayed status only.
pub fn build_packet_reports(
    registrations: &[PacketRegistration<'_>],
    index: &HandlerIndex<'_>,
    cfg: &HeuristicsConfig,
    overrides: &BTreeMap<String, Status>,
) -> Vec<PacketReport> {
    let mut packets = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let mut handlers = Vec::with_capacity(registration.handlers.len());
        for handler in &registration.handlers {
            let report = if let Some(inline) = handler.inline {
                let file = registration.source_file;
                let result = classify::analyze_function(
                    inline.child_by_field_name("parameters"),
                    inline.child_by_field_name("body"),
                    &file.source,
                    &file.aliases,
                    cfg,
                );
                handler_report(&handler.name, handler.file, handler.line, result)
            } else if let Some(source) = index.lookup(&handler.name) {
                let file = source.source_file;
                let result = classify::analyze_function(
                    source.decl.child_by_field_name("parameters"),
                    source.decl.child_by_field_name("body"),
                    &file.source,
                    &file.aliases,
                    cfg,
                );
                handler_report(&handler.name, source.file, line_of(source.decl), result)
            } else {
                handler_report(
                    &handler.name,
                    handler.file,
                    handler.line,
                    AnalysisResult::missing_handler(),
                )
            };
            handlers.push(report);
        }

        let combined = combine_handler_reports(&handlers);
        let override_status = overrides.get(&registration.id.to_string()).copied();
        packets.push(PacketReport {
            id: registration.id,
            status: override_status.unwrap_or(combined.status),
            computed_status: combined.status,
            score: combined.score,
            signals: combined.signals.into_iter().collect(),
            handlers,
            override_status,
        });
    }
    packets.sort_by_key(|packet| packet.id);
    packets
}

fn handler_report(name: &str, file: &str, line: i64, result: AnalysisResult) -> HandlerReport {
    HandlerReport {
        name: name.to_string(),
        status: result.status,
        score: result.score,
        signals: result.signals.into_iter().collect(),
        file: file.to_string(),
        line,
    }
}

pub fn build_response_reports(
    usage: &BTreeMap<i64, BTreeSet<String>>,
    names: &BTreeMap<i64, String>,
) -> Vec<ResponseReport> {
    usage
        .iter()
        .map(|(id, files)| ResponseReport {
            id: *id,
            name: names
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("{SC_PREFIX}{id}")),
            files: files.iter().cloned().collect(),
        })
        .collect()
}

/// known − covered, ascending.
pub fn missing_ids(known: &BTreeSet<i64>, covered: &BTreeSet<i64>) -> Vec<i64> {
    known.difference(covered).copied().collect()
}

/// Sorted deduplicated union of two ID lists.
pub fn union_sorted(a: &[i64], b: &[i64]) -> Vec<i64> {
    let set: BTreeSet<i64> = a.iter().chain(b.iter()).copied().collect();
    set.into_iter().collect()
}

/// Displayed status per distinct packet ID; duplicate-ID registrations are
/// combined with the same worst-case rule as handlers within a packet.
fn combine_packet_statuses(packets: &[PacketReport]) -> BTreeMap<i64, Status> {
    let mut by_id: BTreeMap<i64, Vec<Status>> = BTreeMap::new();
    for packet in packets {
        by_id.entry(packet.id).or_default().push(packet.status);
    }
    by_id
        .into_iter()
        .map(|(id, statuses)| (id, combine_statuses(&statuses)))
        .collect()
}

pub fn build_report(
    packets: Vec<PacketReport>,
    responses: Vec<ResponseReport>,
    overrides: BTreeMap<String, Status>,
    duplicate_handlers: i64,
    catalog: &dyn Catalog,
    options: ReportOptions,
) -> Report {
    let registered_ids: BTreeSet<i64> = packets.iter().map(|packet| packet.id).collect();
    let covered_response_ids: BTreeSet<i64> =
        responses.iter().map(|response| response.id).collect();

    let mut total_known_cs = 0;
    let mut total_known_sc = 0;
    let mut missing_cs_ids = Vec::new();
    let mut missing_sc_ids = Vec::new();
    let mut covered_sc_count = 0;

    if options.include_cs {
        let known_cs = known_ids(catalog, CS_PREFIX);
        total_known_cs = known_cs.len() as i64;
        missing_cs_ids = missing_ids(&known_cs, &registered_ids);
    }
    if options.include_sc {
        let known_sc = known_ids(catalog, SC_PREFIX);
        total_known_sc = known_sc.len() as i64;
        missing_sc_ids = missing_ids(&known_sc, &covered_response_ids);
        covered_sc_count = (total_known_sc - missing_sc_ids.len() as i64).max(0);
    }

    let missing = missing_cs_ids.len() as i64 + missing_sc_ids.len() as i64;
    let missing_union = union_sorted(&missing_cs_ids, &missing_sc_ids);

    let mut counts: BTreeMap<Status, i64> = BTreeMap::from([
        (Status::Implemented, 0),
        (Status::Partial, 0),
        (Status::Stub, 0),
        (Status::Panic, 0),
        (Status::Missing, missing),
    ]);
    if options.include_cs {
        // Count only packets the catalog knows; stray registrations do not
        // shift the progress buckets.
        let known_cs = known_ids(catalog, CS_PREFIX);
        for (id, status) in combine_packet_statuses(&packets) {
            if !known_cs.contains(&id) {
                continue;
            }
            *counts.entry(status).or_insert(0) += 1;
        }
    }
    if options.include_sc {
        // Observed response sends count as implemented; responses have no
        // partial/stub distinction in this tool.
        *counts.entry(Status::Implemented).or_insert(0) += covered_sc_count;
    }

    Report {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        total: packets.len() as i64,
        total_known: total_known_cs + total_known_sc,
        total_known_cs,
        total_known_sc,
        missing,
        missing_cs: missing_cs_ids.len() as i64,
        missing_sc: missing_sc_ids.len() as i64,
        missing_ids: missing_union,
        missing_cs_ids,
        missing_sc_ids,
        counts,
        packets,
        responses,
        overrides,
        duplicate_handlers,
    }
}

pub fn write_json(path: &Path, report: &Report) -> Result<()> {
    crate::util::ensure_parent_dir(path)?;
    let mut payload = serde_json::to_string_pretty(report).context("serialize report")?;
    payload.push('\n');
    std::fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}
