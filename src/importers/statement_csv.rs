//! CSV statement reader with encoding and delimiter sniffing
//!
//! Bank exports arrive in whatever encoding and delimiter the bank's portal
//! felt like using that day. The reader tries an ordered list of encodings,
//! then an ordered list of delimiters per successful decode, and accepts the
//! first combination that yields more than one column.

use anyhow::Result;
use calamine::Data;
use csv::ReaderBuilder;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use super::{normalize_cell, RawTable};
use crate::error::ConciliaError;

// windows-1252 terminates the ladder: it maps all 256 byte values and can
// never fail, so any non-UTF-8 input lands there. Latin-1 and ISO-8859-1
// labels resolve to windows-1252 in the Encoding Standard anyway.
const ENCODINGS: &[(&str, &Encoding)] =
    &[("utf-8", UTF_8), ("windows-1252", WINDOWS_1252)];

const DELIMITERS: &[u8] = b";,\t";

pub(crate) fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    for (name, encoding) in ENCODINGS {
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            debug!("Decoding as {} produced errors, trying next encoding", name);
            continue;
        }

        for &delimiter in DELIMITERS {
            if let Some(table) = try_delimiter(&text, delimiter) {
                debug!(
                    "Accepted CSV as {} with delimiter {:?}",
                    name, delimiter as char
                );
                return Ok(table);
            }
        }
    }

    Err(ConciliaError::Parse(
        "could not read CSV file with any known encoding/delimiter combination".to_string(),
    )
    .into())
}

/// Parse with one delimiter; accepted only if it yields more than one column.
/// Unreadable records (wrong field count, runaway quoted field) are warned
/// about and counted, and reading continues with the next record.
fn try_delimiter(text: &str, delimiter: u8) -> Option<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.len() <= 1 {
        return None;
    }

    let mut rows = Vec::new();
    let mut skipped_records = 0;
    for (idx, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row: Vec<Data> = record
                    .iter()
                    .map(|field| normalize_cell(Data::String(field.trim().to_string())))
                    .collect();
                rows.push(row);
            }
            Err(e) => {
                // idx 0 is the first data record, line 2 of the file
                warn!("Skipping unreadable record at line {}: {}", idx + 2, e);
                skipped_records += 1;
            }
        }
    }

    Some(RawTable {
        headers,
        rows,
        skipped_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_delimiter_detected() {
        let table = read_csv("Data;Histórico;Valor (R$)\n10/03/2025;PIX;100,00\n".as_bytes())
            .unwrap();
        assert_eq!(table.headers, vec!["Data", "Histórico", "Valor (R$)"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped_records, 0);
    }

    #[test]
    fn test_comma_delimiter_detected() {
        let table =
            read_csv("Data,Histórico,Valor (R$)\n10/03/2025,PIX,\"100,00\"\n".as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 3);
    }

    #[test]
    fn test_tab_delimiter_detected() {
        let table =
            read_csv("Data\tHistórico\tValor (R$)\n10/03/2025\tPIX\t100,00\n".as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 3);
    }

    #[test]
    fn test_latin1_bytes_decoded() {
        // "Histórico" in Latin-1: ó is 0xF3, invalid as UTF-8
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Data;Hist\xF3rico;Valor (R$)\n");
        bytes.extend_from_slice(b"10/03/2025;DEP\xD3SITO;50,00\n");
        let table = read_csv(&bytes).unwrap();
        assert_eq!(table.headers[1], "Histórico");
    }

    #[test]
    fn test_headers_trimmed() {
        let table =
            read_csv("  Data ; Histórico ; Valor (R$) \n10/03/2025;PIX;1,00\n".as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Data", "Histórico", "Valor (R$)"]);
    }

    #[test]
    fn test_single_column_rejected() {
        let err = read_csv(b"just one long line of text\nanother line\n").unwrap_err();
        assert!(err.to_string().contains("encoding/delimiter"));
    }

    #[test]
    fn test_unclosed_quote_is_counted_as_lost() {
        // The runaway quoted field swallows every following line into one
        // short record; that loss must be accounted for, not silent
        let table = read_csv(
            "Data;Histórico;Valor (R$)\n\
             10/03/2025;\"PIX QUEBRADO;100,00\n\
             11/03/2025;TED RECEBIDA;200,00\n\
             12/03/2025;BOLETO PAGO;-50,00\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(table.rows.len(), 0);
        assert_eq!(table.skipped_records, 1);
    }

    #[test]
    fn test_short_record_skipped_without_poisoning_the_rest() {
        let table = read_csv(
            "Data;Histórico;Valor (R$)\n\
             10/03/2025;SO DUAS COLUNAS\n\
             11/03/2025;TED RECEBIDA;200,00\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped_records, 1);
        assert!(matches!(&table.rows[0][1], Data::String(s) if s == "TED RECEBIDA"));
    }

    #[test]
    fn test_sentinels_become_empty_cells() {
        let table = read_csv(
            "Data;Histórico;Valor (R$)\n10/03/2025;nan;NULL\n".as_bytes(),
        )
        .unwrap();
        assert!(matches!(table.rows[0][1], Data::Empty));
        assert!(matches!(table.rows[0][2], Data::Empty));
    }
}
