use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    // Bracken and some Kraken builds spell ranks out in full; the combined
    // format always uses the single-letter codes.
    static ref RANK_ABBREVIATIONS: HashMap<&'static str, &'static str> = HashMap::from([
        ("superkingdom", "D"),
        ("kingdom", "K"),
        ("phylum", "P"),
        ("class", "C"),
        ("order", "O"),
        ("family", "F"),
        ("genus", "G"),
        ("species", "S"),
    ]);
}

#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub name: String,
    pub taxon_id: String,
    pub depth: usize,
    pub rank: String,
    pub cumulative: u64,
    pub exclusive: u64,
}

/// Parses a single line of a kraken-style report.
///
/// Returns `None` for lines that are not taxon rows: too few tab-separated
/// fields, or count fields that do not parse as integers (header and comment
/// lines fail exactly this way). The tree depth is encoded as two spaces of
/// indentation per level in front of the taxon name.
pub fn parse_report_line(line: &str) -> Option<ReportRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 5 {
        return None;
    }

    let cumulative = fields[1].trim().parse::<u64>().ok()?;
    let exclusive = fields[2].trim().parse::<u64>().ok()?;
    let raw_rank = fields[3].trim();
    let taxon_id = fields[4].trim();

    let name_field = fields[fields.len() - 1];
    let name = name_field.trim_start_matches(' ');
    let depth = (name_field.len() - name.len()) / 2;

    let rank = RANK_ABBREVIATIONS
        .get(raw_rank)
        .copied()
        .unwrap_or(raw_rank);

    Some(ReportRecord {
        name: name.to_string(),
        taxon_id: taxon_id.to_string(),
        depth,
        rank: rank.to_string(),
        cumulative,
        exclusive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_line_valid() {
        let line = "10.77\t100\t50\tS\t1337\t    Homo sapiens";
        let record = parse_report_line(line).unwrap();
        assert_eq!(record.name, "Homo sapiens");
        assert_eq!(record.taxon_id, "1337");
        assert_eq!(record.depth, 2);
        assert_eq!(record.rank, "S");
        assert_eq!(record.cumulative, 100);
        assert_eq!(record.exclusive, 50);
    }

    #[test]
    fn test_parse_report_line_depth() {
        let line = "5.2\t80\t30\tG\t1234\t      Escherichia";
        let record = parse_report_line(line).unwrap();
        assert_eq!(record.depth, 3);
        assert_eq!(record.name, "Escherichia");

        let line = "90.0\t1000\t900\tD\t2\tBacteria";
        let record = parse_report_line(line).unwrap();
        assert_eq!(record.depth, 0);
        assert_eq!(record.name, "Bacteria");
    }

    #[test]
    fn test_parse_report_line_normalizes_long_rank_names() {
        let line = "90.0\t1000\t900\tsuperkingdom\t2\t  Bacteria";
        assert_eq!(parse_report_line(line).unwrap().rank, "D");

        let line = "16.5\t576\t22\tgenus\t1386\t    Bacillus";
        assert_eq!(parse_report_line(line).unwrap().rank, "G");

        let line = "2.0\t20\t1\tkingdom\t33090\t    Viridiplantae";
        assert_eq!(parse_report_line(line).unwrap().rank, "K");
    }

    #[test]
    fn test_parse_report_line_passes_other_ranks_through() {
        for rank in ["U", "-", "R1", "G12"] {
            let line = format!("1.0\t10\t0\t{rank}\t77\t  something");
            assert_eq!(parse_report_line(&line).unwrap().rank, rank);
        }
    }

    #[test]
    fn test_parse_report_line_skips_short_lines() {
        assert!(parse_report_line("").is_none());
        assert!(parse_report_line("unclassified").is_none());
        assert!(parse_report_line("10.0\t100\t50\tS").is_none());
    }

    #[test]
    fn test_parse_report_line_skips_headers() {
        // Column header of an already-combined report: second field is text.
        assert!(parse_report_line("S1\tS2\tlvl_type\ttaxid\tname").is_none());
        assert!(parse_report_line("#perc\treads\treads\trank\ttaxid\tname").is_none());
    }

    #[test]
    fn test_parse_report_line_skips_non_integer_counts() {
        assert!(parse_report_line("10.0\tmany\t50\tS\t1337\t  Homo sapiens").is_none());
        assert!(parse_report_line("10.0\t100\tsome\tS\t1337\t  Homo sapiens").is_none());
    }
}
