/// Parser for LCOV `.info` snapshots, reduced to per-file line totals.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records that matter here:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// `LF`/`LH` win when a record carries them; otherwise the totals are
/// derived from the `DA` lines.
use std::io::BufRead;

use crate::error::{MonocovError, Result};
use crate::model::LineCoverageRecord;

#[derive(Default)]
struct RecordBuilder {
    source_file: String,
    da_found: u64,
    da_hit: u64,
    lf: Option<u64>,
    lh: Option<u64>,
}

impl RecordBuilder {
    fn new(source_file: &str) -> Self {
        Self {
            source_file: source_file.to_string(),
            ..Default::default()
        }
    }

    fn finish(self, source_name: &str) -> Result<LineCoverageRecord> {
        let lines_found = self.lf.unwrap_or(self.da_found);
        let lines_hit = self.lh.unwrap_or(self.da_hit);
        if lines_hit > lines_found {
            return Err(MonocovError::parse(
                source_name,
                format!(
                    "{}: {lines_hit} lines hit but only {lines_found} found",
                    self.source_file
                ),
            ));
        }
        Ok(LineCoverageRecord {
            source_file: self.source_file,
            lines_found,
            lines_hit,
        })
    }
}

/// Parse LCOV data into one record per source file.
///
/// `source_name` only labels errors. Input without any `SF` record,
/// including empty input, is rejected, as are records hitting more lines
/// than they found and totals that do not fit in a `u64`.
pub fn parse(source_name: &str, input: &[u8]) -> Result<Vec<LineCoverageRecord>> {
    let mut records = Vec::new();
    parse_reader(source_name, &mut &*input, &mut |record| records.push(record))?;
    if records.is_empty() {
        return Err(MonocovError::parse(
            source_name,
            "no source file records (empty or not LCOV)",
        ));
    }
    records
        .iter()
        .try_fold(0u64, |total, r| total.checked_add(r.lines_found))
        .ok_or_else(|| MonocovError::parse(source_name, "line totals overflow"))?;
    Ok(records)
}

fn parse_reader(
    source_name: &str,
    reader: &mut dyn BufRead,
    emit: &mut dyn FnMut(LineCoverageRecord),
) -> Result<()> {
    let mut current: Option<RecordBuilder> = None;

    let mut raw_line = String::new();
    loop {
        raw_line.clear();
        let n = reader
            .read_line(&mut raw_line)
            .map_err(|e| MonocovError::parse(source_name, format!("invalid UTF-8: {e}")))?;
        if n == 0 {
            break;
        }

        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(builder) = current.take() {
                emit(builder.finish(source_name)?);
            }
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        match tag {
            "SF" => {
                if let Some(builder) = current.take() {
                    emit(builder.finish(source_name)?);
                }
                current = Some(RecordBuilder::new(value));
            }
            "DA" => {
                // Negative counts mark non-instrumentable lines.
                if let Some(builder) = current.as_mut() {
                    let mut parts = value.splitn(3, ',');
                    let line_ok = parts.next().is_some_and(|l| l.parse::<u32>().is_ok());
                    let count = parts.next().and_then(|c| c.parse::<i64>().ok());
                    if let (true, Some(count)) = (line_ok, count) {
                        if count >= 0 {
                            builder.da_found += 1;
                            if count > 0 {
                                builder.da_hit += 1;
                            }
                        }
                    }
                }
            }
            "LF" => {
                if let Some(builder) = current.as_mut() {
                    builder.lf = Some(parse_total(source_name, tag, value)?);
                }
            }
            "LH" => {
                if let Some(builder) = current.as_mut() {
                    builder.lh = Some(parse_total(source_name, tag, value)?);
                }
            }
            // TN, FN, FNDA, BRDA and the other summaries carry nothing we aggregate.
            _ => {}
        }
    }

    if let Some(builder) = current.take() {
        emit(builder.finish(source_name)?);
    }

    Ok(())
}

fn parse_total(source_name: &str, tag: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| MonocovError::parse(source_name, format!("bad {tag} value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"\
TN:test
SF:/src/lib.ts
FN:1,main
FNDA:5,main
DA:1,5
DA:2,5
DA:3,0
DA:4,-1
LF:3
LH:2
end_of_record
SF:/src/util.ts
DA:1,1
DA:2,0
end_of_record
";

    #[test]
    fn test_parse_lcov() {
        let records = parse("sample", SAMPLE).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].source_file, "/src/lib.ts");
        assert_eq!(records[0].lines_found, 3);
        assert_eq!(records[0].lines_hit, 2);

        assert_eq!(records[1].source_file, "/src/util.ts");
        assert_eq!(records[1].lines_found, 2);
        assert_eq!(records[1].lines_hit, 1);
    }

    #[test]
    fn test_summary_lines_win_over_da() {
        let input = b"SF:a.ts\nDA:1,1\nDA:2,1\nLF:10\nLH:4\nend_of_record\n";
        let records = parse("summary", input).unwrap();
        assert_eq!(records[0].lines_found, 10);
        assert_eq!(records[0].lines_hit, 4);
    }

    #[test]
    fn test_parse_lcov_no_end_of_record() {
        let input = b"SF:a.ts\nDA:1,1\nDA:2,0\n";
        let records = parse("trailing", input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lines_found, 2);
        assert_eq!(records[0].lines_hit, 1);
    }

    #[test]
    fn test_parse_empty_fails() {
        let err = parse("empty.lcov.info", b"").unwrap_err();
        assert!(matches!(err, MonocovError::Parse { .. }));

        let err = parse("tn-only", b"TN:test\n").unwrap_err();
        assert!(err.to_string().contains("tn-only"));
    }

    #[test]
    fn test_parse_more_hit_than_found_fails() {
        let err = parse("inverted", b"SF:a.ts\nLF:10\nLH:50\nend_of_record\n").unwrap_err();
        assert!(matches!(err, MonocovError::Parse { .. }));
        assert!(err.to_string().contains("a.ts"));

        // LF given, hits derived from DA.
        let input = b"SF:a.ts\nDA:1,1\nDA:2,1\nLF:1\nend_of_record\n";
        assert!(parse("mixed", input).is_err());
    }

    #[test]
    fn test_parse_overflowing_totals_fails() {
        let input = b"SF:a.ts\nLF:18446744073709551615\nLH:1\nend_of_record\n\
SF:b.ts\nLF:5\nLH:1\nend_of_record\n";
        let err = parse("huge", input).unwrap_err();
        assert!(err.to_string().contains("overflow"));

        let single = b"SF:a.ts\nLF:18446744073709551615\nLH:1\nend_of_record\n";
        assert_eq!(parse("one", single).unwrap()[0].lines_found, u64::MAX);
    }

    #[test]
    fn test_parse_bad_summary_fails() {
        let err = parse("bad", b"SF:a.ts\nLF:many\nend_of_record\n").unwrap_err();
        assert!(err.to_string().contains("LF"));
    }
}
