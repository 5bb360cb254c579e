use crate::parsers::report::{parse_report_line, ReportRecord};
use color_eyre::eyre::{bail, Context, Result};
use fxhash::FxHashMap;
use log::debug;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const ROOT_TAXID: &str = "1";
pub const UNCLASSIFIED_TAXID: &str = "0";

/// Taxonomic level identifier of a node.
///
/// Taxa whose rank is unresolved in the source report (`-`, or an already
/// multi-character code) get a synthetic code derived from their parent, so
/// that unresolved ranks nest predictably beneath the nearest resolved
/// ancestor: a child of `G` becomes `G1`, a child of `G1` becomes `G2`.
/// The legacy string form is only produced at serialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankCode {
    Resolved(String),
    Synthetic { base: String, level: u32 },
}

impl RankCode {
    pub fn render(&self) -> String {
        match self {
            RankCode::Resolved(code) => code.clone(),
            RankCode::Synthetic { base, level } => format!("{base}{level}"),
        }
    }

    fn child_of(parent: &RankCode) -> RankCode {
        match parent {
            RankCode::Resolved(code) => RankCode::Synthetic {
                base: code.clone(),
                level: 1,
            },
            RankCode::Synthetic { base, level } => RankCode::Synthetic {
                base: base.clone(),
                level: level + 1,
            },
        }
    }
}

/// One taxon in the merged tree. Nodes are stored in an arena and refer to
/// each other by index.
#[derive(Debug, Clone)]
pub struct TaxonNode {
    pub name: String,
    pub taxon_id: String,
    pub depth: usize,
    /// Assigned when the taxon is first seen, in any report, and never
    /// changed by later merges.
    pub rank: RankCode,
    pub total_cumulative: u64,
    pub total_exclusive: u64,
    pub sample_cumulative: FxHashMap<usize, u64>,
    pub sample_exclusive: FxHashMap<usize, u64>,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

impl TaxonNode {
    fn new(
        name: String,
        taxon_id: String,
        depth: usize,
        rank: RankCode,
        parent: Option<usize>,
    ) -> TaxonNode {
        TaxonNode {
            name,
            taxon_id,
            depth,
            rank,
            total_cumulative: 0,
            total_exclusive: 0,
            sample_cumulative: FxHashMap::default(),
            sample_exclusive: FxHashMap::default(),
            children: Vec::new(),
            parent,
        }
    }

    fn add_counts(&mut self, sample: usize, cumulative: u64, exclusive: u64) {
        *self.sample_cumulative.entry(sample).or_insert(0) += cumulative;
        *self.sample_exclusive.entry(sample).or_insert(0) += exclusive;
        self.total_cumulative += cumulative;
        self.total_exclusive += exclusive;
    }
}

/// Unclassified reads have no taxon id or parent and are kept outside the
/// tree entirely.
#[derive(Debug, Default)]
pub struct UnclassifiedPool {
    pub total: u64,
    pub per_sample: FxHashMap<usize, u64>,
}

impl UnclassifiedPool {
    fn add(&mut self, sample: usize, count: u64) {
        self.total += count;
        *self.per_sample.entry(sample).or_insert(0) += count;
    }
}

/// The union taxonomy tree across all merged reports.
///
/// Taxon identity is keyed purely by taxon id: a taxon appearing in several
/// reports (even at different positions in their trees) is one node whose
/// per-sample maps carry each report's counts. `depth_stack[d]` holds the
/// node most recently visited at depth `d`, so the parent of an incoming
/// record at depth `d` is `depth_stack[d - 1]`; reports emit their rows in
/// pre-order, which keeps that lookup valid row by row.
#[derive(Debug, Default)]
pub struct CombinedTree {
    pub nodes: Vec<TaxonNode>,
    taxon_index: FxHashMap<String, usize>,
    depth_stack: Vec<usize>,
    pub unclassified: UnclassifiedPool,
    num_samples: usize,
}

impl CombinedTree {
    pub fn new() -> CombinedTree {
        CombinedTree::default()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Arena index of the root node, once any report has contributed one.
    pub fn root(&self) -> Option<usize> {
        self.taxon_index.get(ROOT_TAXID).copied()
    }

    /// Merges one report file into the tree as the next sample.
    ///
    /// Reports are consumed fully sequentially; the sample index is the
    /// 1-based position of this call among all `merge_report` calls.
    pub fn merge_report(&mut self, path: &Path) -> Result<()> {
        self.num_samples += 1;
        let sample = self.num_samples;

        let (reader, format) = niffler::from_path(path)
            .wrap_err_with(|| format!("Failed to open report file: {}", path.display()))?;
        debug!(
            "Detected compression type for file {} as: {format:?}",
            path.display()
        );
        let reader = BufReader::new(reader);

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line
                .wrap_err_with(|| format!("Error reading report line from {}", path.display()))?;
            let Some(record) = parse_report_line(&line) else {
                continue;
            };
            self.merge_record(&record, sample)
                .wrap_err_with(|| format!("{}:{}", path.display(), line_idx + 1))?;
        }

        debug!(
            "Merged sample {} - tree now holds {} taxa",
            sample,
            self.nodes.len()
        );
        Ok(())
    }

    fn merge_record(&mut self, record: &ReportRecord, sample: usize) -> Result<()> {
        if record.rank == "U" || record.taxon_id == UNCLASSIFIED_TAXID {
            self.unclassified.add(sample, record.cumulative);
            return Ok(());
        }

        // Every report opens its own root row, which re-anchors the
        // traversal; the stack otherwise carries over between reports.
        if record.taxon_id == ROOT_TAXID {
            let root = match self.taxon_index.get(ROOT_TAXID) {
                Some(&index) => index,
                None => self.push_node(TaxonNode::new(
                    record.name.clone(),
                    record.taxon_id.clone(),
                    0,
                    RankCode::Resolved("R".to_string()),
                    None,
                )),
            };
            self.nodes[root].add_counts(sample, record.cumulative, record.exclusive);
            self.depth_stack.clear();
            self.depth_stack.push(root);
            return Ok(());
        }

        let parent = match record
            .depth
            .checked_sub(1)
            .and_then(|d| self.depth_stack.get(d))
        {
            Some(&index) => index,
            None => bail!(
                "Taxon '{}' (taxid {}) at depth {} has no current ancestor one level up; \
                 report rows are out of order or missing a root line",
                record.name,
                record.taxon_id,
                record.depth
            ),
        };
        self.depth_stack.truncate(record.depth);

        let index = match self.taxon_index.get(&record.taxon_id) {
            Some(&index) => index,
            None => {
                let rank = if record.rank == "-" || record.rank.len() > 1 {
                    RankCode::child_of(&self.nodes[parent].rank)
                } else {
                    RankCode::Resolved(record.rank.clone())
                };
                let depth = self.nodes[parent].depth + 1;
                let index = self.push_node(TaxonNode::new(
                    record.name.clone(),
                    record.taxon_id.clone(),
                    depth,
                    rank,
                    Some(parent),
                ));
                self.nodes[parent].children.push(index);
                index
            }
        };
        self.nodes[index].add_counts(sample, record.cumulative, record.exclusive);
        self.depth_stack.push(index);
        Ok(())
    }

    fn push_node(&mut self, node: TaxonNode) -> usize {
        let index = self.nodes.len();
        self.taxon_index.insert(node.taxon_id.clone(), index);
        self.nodes.push(node);
        index
    }

    pub fn get(&self, taxon_id: &str) -> Option<&TaxonNode> {
        self.taxon_index.get(taxon_id).map(|&index| &self.nodes[index])
    }
}
