use crate::error::EcompError;
use crate::prelude::*;

/// Render rows as `>id\nsequence\n` records. Only used to build the gzip
/// fallback payload; general FASTA I/O lives outside the codec.
pub(crate) fn render(ids: &[String], rows: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for (id, row) in ids.iter().zip(rows.iter()) {
        out.push(b'>');
        out.extend_from_slice(id.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(row);
        out.push(b'\n');
    }
    out
}

pub(crate) fn parse(data: &[u8]) -> Result<(Vec<String>, Vec<Vec<u8>>)> {
    let mut ids = Vec::new();
    let mut rows: Vec<Vec<u8>> = Vec::new();
    for line in data.split(|&byte| byte == b'\n') {
        if line.is_empty() {
            continue;
        }
        if line[0] == b'>' {
            ids.push(String::from_utf8(line[1..].to_vec())?);
            rows.push(Vec::new());
        } else {
            match rows.last_mut() {
                Some(row) => row.extend_from_slice(line),
                None => {
                    return Err(EcompError::CorruptPayload {
                        encoding: "fasta",
                        detail: "sequence data before the first header".into(),
                    })
                }
            }
        }
    }
    Ok((ids, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_parse_round_trip() {
        let ids = vec!["s1".to_string(), "s2".to_string()];
        let rows = vec![b"ACGT".to_vec(), b"AC-T".to_vec()];
        let bytes = render(&ids, &rows);
        assert_eq!(bytes, b">s1\nACGT\n>s2\nAC-T\n");
        assert_eq!(parse(&bytes).unwrap(), (ids, rows));
    }

    #[test]
    fn parse_joins_wrapped_lines() {
        let (ids, rows) = parse(b">s1\nACGT\nACGT\n").unwrap();
        assert_eq!(ids, vec!["s1"]);
        assert_eq!(rows, vec![b"ACGTACGT".to_vec()]);
    }

    #[test]
    fn parse_rejects_headerless_data() {
        assert!(parse(b"ACGT\n").is_err());
    }
}
