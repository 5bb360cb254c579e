use crate::kombine::Sample;
use crate::tree::CombinedTree;
use color_eyre::eyre::{Context, Result};
use log::debug;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Rank codes of a standard kraken report, in report order.
pub const MAJOR_RANKS: &[&str] = &["U", "R", "D", "K", "P", "C", "O", "F", "G", "S"];

/// Writes the combined report: header block, optional unclassified row, then
/// one row per taxon of the merged tree with one cumulative-count column per
/// sample.
pub fn write_combined_report(
    tree: &CombinedTree,
    samples: &[Sample],
    out_file: &Path,
    suppress_unclassified: bool,
) -> Result<()> {
    debug!("Creating output file: {}", out_file.display());
    let file = fs::File::create(out_file)
        .wrap_err_with(|| format!("Failed to create output file: {}", out_file.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "#Number of Samples: {}", samples.len())?;
    for sample in samples {
        writeln!(writer, "#{}\t{}", sample.name, sample.path.display())?;
    }
    write_column_header(&mut writer, samples)?;

    if !suppress_unclassified {
        write_unclassified_row(&mut writer, tree, samples.len())?;
    }
    write_tree_rows(&mut writer, tree, samples.len(), None)?;

    writer
        .flush()
        .wrap_err_with(|| format!("Failed to write output file: {}", out_file.display()))
}

/// Writes one report per major rank (unclassified and root excluded), named
/// `<out_file>-<rank>`, each holding only the rows at that rank. Split files
/// carry the column header but not the `#` sample block.
pub fn write_rank_reports(
    tree: &CombinedTree,
    samples: &[Sample],
    out_file: &Path,
    suppress_unclassified: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for rank in MAJOR_RANKS.iter().copied().filter(|&rank| rank != "U" && rank != "R") {
        let path = PathBuf::from(format!("{}-{}", out_file.display(), rank));
        debug!("Creating per-rank output file: {}", path.display());
        let file = fs::File::create(&path)
            .wrap_err_with(|| format!("Failed to create output file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        write_column_header(&mut writer, samples)?;
        if !suppress_unclassified {
            write_unclassified_row(&mut writer, tree, samples.len())?;
        }
        write_tree_rows(&mut writer, tree, samples.len(), Some(rank))?;

        writer
            .flush()
            .wrap_err_with(|| format!("Failed to write output file: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn write_column_header<W: Write>(writer: &mut W, samples: &[Sample]) -> Result<()> {
    for sample in samples {
        write!(writer, "{}\t", sample.name)?;
    }
    writeln!(writer, "lvl_type\ttaxid\tname")?;
    Ok(())
}

fn write_unclassified_row<W: Write>(
    writer: &mut W,
    tree: &CombinedTree,
    num_samples: usize,
) -> Result<()> {
    for sample in 1..=num_samples {
        let count = tree.unclassified.per_sample.get(&sample).copied().unwrap_or(0);
        write!(writer, "{count}\t")?;
    }
    writeln!(writer, "U\t0\tunclassified")?;
    Ok(())
}

/// Depth-first emission, largest combined subtree first. A rank filter drops
/// rows but never prunes: filtered-out nodes are still descended into.
fn write_tree_rows<W: Write>(
    writer: &mut W,
    tree: &CombinedTree,
    num_samples: usize,
    rank_filter: Option<&str>,
) -> Result<()> {
    let Some(root) = tree.root() else {
        return Ok(());
    };
    let mut pending = vec![root];
    while let Some(index) = pending.pop() {
        let node = &tree.nodes[index];

        // Sorted ascending so the highest-count child pops first. The sort
        // is stable, keeping ties in a fixed order across runs.
        let mut children = node.children.clone();
        children.sort_by_key(|&child| tree.nodes[child].total_cumulative);
        pending.extend(children);

        let rank = node.rank.render();
        if rank_filter.is_some_and(|filter| filter != rank) {
            continue;
        }

        for sample in 1..=num_samples {
            let count = node.sample_cumulative.get(&sample).copied().unwrap_or(0);
            write!(writer, "{count}\t")?;
        }
        writeln!(
            writer,
            "{}\t{}\t{}{}",
            rank,
            node.taxon_id,
            " ".repeat(node.depth * 2),
            node.name
        )?;
    }
    Ok(())
}
