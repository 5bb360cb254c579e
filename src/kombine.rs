use crate::tree::CombinedTree;
use crate::writer::{write_combined_report, write_rank_reports};
use crate::Cli;
use color_eyre::eyre::{ensure, Result};
use fxhash::FxHashMap;
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;

/// One input report and the display name heading its output column.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Serialize)]
struct Summary {
    num_samples: usize,
    num_taxa: usize,
    classified_reads_per_sample: FxHashMap<String, u64>,
    unclassified_reads_per_sample: FxHashMap<String, u64>,
    kombine_version: String,
}

pub struct Kombine {
    args: Cli,
    samples: Vec<Sample>,
    tree: CombinedTree,
    summary: Option<Summary>,
}

impl Kombine {
    pub fn new(args: Cli) -> Self {
        Self {
            args,
            samples: Vec::new(),
            tree: CombinedTree::new(),
            summary: None,
        }
    }

    /// Pairs each report with its display name. Explicit names must match the
    /// report count exactly; without them samples are named S1..SN.
    fn resolve_samples(&mut self) -> Result<()> {
        let num_reports = self.args.reports.len();
        if !self.args.sample_names.is_empty() {
            ensure!(
                self.args.sample_names.len() == num_reports,
                "Number of sample names ({}) does not match number of reports ({})",
                self.args.sample_names.len(),
                num_reports
            );
        }
        self.samples = self
            .args
            .reports
            .iter()
            .enumerate()
            .map(|(i, path)| Sample {
                name: self
                    .args
                    .sample_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("S{}", i + 1)),
                path: path.clone(),
            })
            .collect();
        Ok(())
    }

    fn merge_reports(&mut self) -> Result<()> {
        let num_samples = self.samples.len();
        for (i, sample) in self.samples.iter().enumerate() {
            info!(
                "Processing report {}/{}: {}",
                i + 1,
                num_samples,
                sample.path.display()
            );
            self.tree.merge_report(&sample.path)?;
        }
        debug!("Merged tree holds {} taxa", self.tree.node_count());
        Ok(())
    }

    fn write_outputs(&self) -> Result<()> {
        if self.args.bracken {
            info!("Bracken input - omitting unclassified row");
        }
        info!("Writing combined report to {}", self.args.output.display());
        write_combined_report(&self.tree, &self.samples, &self.args.output, self.args.bracken)?;

        if self.args.split_ranks {
            info!("Writing per-rank reports");
            let written =
                write_rank_reports(&self.tree, &self.samples, &self.args.output, self.args.bracken)?;
            debug!("Wrote {} per-rank reports", written.len());
        }
        Ok(())
    }

    fn build_summary(&mut self) {
        let mut classified = FxHashMap::default();
        let mut unclassified = FxHashMap::default();
        for (i, sample) in self.samples.iter().enumerate() {
            let sample_index = i + 1;
            let root_reads = self
                .tree
                .root()
                .and_then(|root| self.tree.nodes[root].sample_cumulative.get(&sample_index))
                .copied()
                .unwrap_or(0);
            classified.insert(sample.name.clone(), root_reads);
            unclassified.insert(
                sample.name.clone(),
                self.tree
                    .unclassified
                    .per_sample
                    .get(&sample_index)
                    .copied()
                    .unwrap_or(0),
            );
        }
        self.summary = Some(Summary {
            num_samples: self.samples.len(),
            num_taxa: self.tree.node_count(),
            classified_reads_per_sample: classified,
            unclassified_reads_per_sample: unclassified,
            kombine_version: env!("CARGO_PKG_VERSION").to_string(),
        });
    }

    fn output_summary(&self) -> Result<()> {
        if let Some(summary) = &self.summary {
            if self.args.summary {
                let json = serde_json::to_string_pretty(summary)?;
                println!("{}", json);
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        info!(
            "Starting kombine at {}",
            chrono::Local::now().format("%H:%M:%S")
        );
        self.resolve_samples()?;
        info!("{} reports to combine", self.samples.len());
        self.merge_reports()?;
        self.write_outputs()?;
        self.build_summary();
        self.output_summary()?;
        info!("Complete at {}", chrono::Local::now().format("%H:%M:%S"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn cli(reports: Vec<PathBuf>, output: PathBuf, sample_names: Vec<String>) -> Cli {
        Cli {
            reports,
            output,
            sample_names,
            bracken: false,
            split_ranks: false,
            summary: false,
            verbose: false,
        }
    }

    #[test]
    fn test_default_sample_names() {
        let args = cli(
            vec![PathBuf::from("a.kreport"), PathBuf::from("b.kreport")],
            PathBuf::from("out.kreport"),
            Vec::new(),
        );
        let mut app = Kombine::new(args);
        app.resolve_samples().unwrap();
        let names: Vec<&str> = app.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["S1", "S2"]);
        assert_eq!(app.samples[1].path, PathBuf::from("b.kreport"));
    }

    #[test]
    fn test_explicit_sample_names() {
        let args = cli(
            vec![PathBuf::from("a.kreport"), PathBuf::from("b.kreport")],
            PathBuf::from("out.kreport"),
            vec!["gut".to_string(), "soil".to_string()],
        );
        let mut app = Kombine::new(args);
        app.resolve_samples().unwrap();
        let names: Vec<&str> = app.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["gut", "soil"]);
    }

    #[test]
    fn test_sample_name_count_mismatch_is_fatal() {
        let args = cli(
            vec![PathBuf::from("a.kreport"), PathBuf::from("b.kreport")],
            PathBuf::from("out.kreport"),
            vec!["gut".to_string()],
        );
        let mut app = Kombine::new(args);
        assert!(app.resolve_samples().is_err());
    }

    #[test]
    fn test_run_end_to_end() {
        let report = "\
10.00\t10\t10\tU\t0\tunclassified
90.00\t90\t2\tR\t1\troot
80.00\t80\t80\tD\t2\t  Bacteria";
        let dir = tempdir().unwrap();
        let report_path = dir.path().join("a.kreport");
        let mut file = std::fs::File::create(&report_path).unwrap();
        file.write_all(report.as_bytes()).unwrap();

        let out = dir.path().join("combined.kreport");
        let mut args = cli(
            vec![report_path.clone(), report_path],
            out.clone(),
            Vec::new(),
        );
        args.split_ranks = true;
        let mut app = Kombine::new(args);
        app.run().unwrap();

        let contents = std::fs::read_to_string(&out).unwrap();
        assert!(contents.starts_with("#Number of Samples: 2\n"));
        assert!(contents.contains("10\t10\tU\t0\tunclassified"));
        assert!(contents.contains("90\t90\tR\t1\troot"));
        assert!(dir.path().join("combined.kreport-D").exists());
        assert!(dir.path().join("combined.kreport-S").exists());

        let summary = app.summary.as_ref().unwrap();
        assert_eq!(summary.num_samples, 2);
        assert_eq!(summary.num_taxa, 2);
        assert_eq!(summary.classified_reads_per_sample["S1"], 90);
        assert_eq!(summary.unclassified_reads_per_sample["S2"], 10);
    }
}
