//! Reconciler: the two end-to-end flows
//!
//! Fragment mode: fragments → identity resolver → provenance → timeline.
//! Dual-source mode: text + vision (+ optional proposal) → enforcer →
//! provenance → timeline.

use crate::config::ReconcileConfig;
use crate::enforce::{union_proposal, EnforcementReport, UnionSubsetEnforcer};
use crate::normalize::{parse_record, SourceIndex};
use crate::provenance::{attribute_fragments, attribute_sources, ProvenanceRecord, SourceTag};
use crate::record::{ReconcileError, ReconcileResult, RecordEnvelope, SoaRecord};
use crate::resolve::{IdMapping, IdentityResolver, MergeReport};
use crate::storage::RunMode;
use crate::timeline::attach_timeline;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// One raw fragment and the pass that produced it
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Where the fragment came from, for log messages
    pub label: String,
    pub tag: SourceTag,
    pub raw: Value,
}

impl Fragment {
    /// A text-pass fragment
    pub fn new(label: impl Into<String>, raw: Value) -> Self {
        Self {
            label: label.into(),
            tag: SourceTag::TextOnly,
            raw,
        }
    }

    pub fn with_tag(mut self, tag: SourceTag) -> Self {
        self.tag = tag;
        self
    }
}

/// Everything a run reports besides the record itself
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<EnforcementReport>,
    pub schedule_instances: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// The reconciled record with its provenance and report
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub mode: RunMode,
    pub record: RecordEnvelope,
    pub provenance: ProvenanceRecord,
    pub report: RunReport,
    /// Fragment mode only: local → global id assignments
    pub mapping: Option<IdMapping>,
}

/// Runs reconciliation with one configuration
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Merge locally-scoped fragments into one globally-keyed record.
    ///
    /// Malformed fragments are skipped and reported. Fails only when no
    /// fragment is usable.
    pub fn merge_fragments(&self, fragments: &[Fragment]) -> ReconcileResult<ReconcileOutput> {
        if fragments.is_empty() {
            return Err(ReconcileError::EmptyInputSet("no fragments supplied".into()));
        }

        let raws: Vec<Value> = fragments.iter().map(|f| f.raw.clone()).collect();
        let resolver = IdentityResolver::new()
            .with_name_matching(self.config.match_by_name)
            .with_parallel_ingest(self.config.parallel_ingest);
        let mut resolution = resolver.resolve_raw(&raws);

        let mut report = RunReport::default();
        for skipped in &resolution.report.skipped_fragments {
            let label = &fragments[skipped.index].label;
            report
                .warnings
                .push(format!("fragment {} skipped: {}", label, skipped.reason));
        }
        if resolution.report.fragments_merged == 0 {
            return Err(ReconcileError::EmptyInputSet(format!(
                "all {} fragments were malformed",
                fragments.len()
            )));
        }

        let mut record = std::mem::take(&mut resolution.record);
        let tags: Vec<SourceTag> = fragments.iter().map(|f| f.tag).collect();
        let provenance = attribute_fragments(&record, &resolution, &tags);
        attach_timeline(&mut record);

        report.schedule_instances = timeline_len(&record);
        report.merge = Some(resolution.report);
        info!(
            instances = report.schedule_instances,
            cells = provenance.cell_count(),
            "fragment merge complete"
        );

        Ok(ReconcileOutput {
            mode: RunMode::Merge,
            record: RecordEnvelope::new(self.config.schema_version.clone(), record),
            provenance,
            report,
            mapping: Some(resolution.mapping),
        })
    }

    /// Reconcile a text and a vision source, filtering `proposal` (or the
    /// union of the two sources when absent or unreadable) so that nothing
    /// outside the sources survives.
    pub fn reconcile_sources(
        &self,
        text: &Value,
        vision: &Value,
        proposal: Option<&Value>,
    ) -> ReconcileResult<ReconcileOutput> {
        let mut report = RunReport::default();
        let text = read_source("text", text, &mut report.warnings);
        let vision = read_source("vision", vision, &mut report.warnings);
        if text.is_structureless() && vision.is_structureless() {
            return Err(ReconcileError::EmptyInputSet(
                "neither source has timeline content".into(),
            ));
        }

        let parsed_proposal = match proposal.map(parse_record) {
            Some(Ok(normalized)) => Some(normalized.record),
            Some(Err(reason)) => {
                warn!(%reason, "proposal unreadable; using the union of both sources");
                report
                    .warnings
                    .push(format!("proposal ignored: {}", reason));
                None
            }
            None => None,
        };
        let union_used = parsed_proposal.is_none();
        let candidate = parsed_proposal.unwrap_or_else(|| union_proposal(&text, &vision));

        let text_index = SourceIndex::build(&text);
        let vision_index = SourceIndex::build(&vision);
        let enforcer = UnionSubsetEnforcer::new(self.config.enforcement_policy());
        let mut enforcement = enforcer.enforce(&candidate, &text_index, &vision_index);
        enforcement.report.union_proposal = union_used;

        let mut record = enforcement.record;
        let provenance = attribute_sources(&record, &text_index, &vision_index);
        attach_timeline(&mut record);

        report.schedule_instances = timeline_len(&record);
        report.enforcement = Some(enforcement.report);
        info!(
            instances = report.schedule_instances,
            cells = provenance.cell_count(),
            union_proposal = union_used,
            "dual-source reconciliation complete"
        );

        Ok(ReconcileOutput {
            mode: RunMode::Reconcile,
            record: RecordEnvelope::new(self.config.schema_version.clone(), record),
            provenance,
            report,
            mapping: None,
        })
    }
}

/// A malformed source constrains nothing; it is read as an empty record.
fn read_source(label: &str, raw: &Value, warnings: &mut Vec<String>) -> SoaRecord {
    match parse_record(raw) {
        Ok(normalized) => normalized.record,
        Err(reason) => {
            warn!(source = label, %reason, "source unreadable; treated as empty");
            warnings.push(format!("{} source unreadable: {}", label, reason));
            SoaRecord::new()
        }
    }
}

fn timeline_len(record: &SoaRecord) -> usize {
    record.schedule_timeline.as_ref().map_or(0, |t| t.len())
}
