//! Counterparty extraction from statement narrations
//!
//! Three-stage fallback ladder:
//! 1. known-institution keyword table (first match wins, specific entries
//!    before generic ones)
//! 2. CPF/CNPJ regex extraction
//! 3. truncation of the narration to its first three tokens
//!
//! Best-effort auto-fill only; the operator can edit the result downstream.

use once_cell::sync::Lazy;
use regex::Regex;

pub const UNIDENTIFIED: &str = "Not identified";

/// Ordered (keyword, canonical label) table scanned against the uppercased
/// narration. A specific biller must precede the generic "BANCO" catch-all.
const KNOWN_COUNTERPARTIES: &[(&str, &str)] = &[
    // Streaming / subscriptions
    ("NETFLIX", "Netflix"),
    ("SPOTIFY", "Spotify"),
    ("AMAZON PRIME", "Amazon Prime"),
    ("DISNEY", "Disney+"),
    ("GLOBOPLAY", "Globoplay"),
    // Marketplaces and delivery
    ("MERCADO LIVRE", "Mercado Livre"),
    ("MERCADOLIVRE", "Mercado Livre"),
    ("MERCADO PAGO", "Mercado Pago"),
    ("AMAZON", "Amazon"),
    ("SHOPEE", "Shopee"),
    ("MAGAZINE LUIZA", "Magazine Luiza"),
    ("MAGALU", "Magazine Luiza"),
    ("AMERICANAS", "Americanas"),
    ("IFOOD", "iFood"),
    ("UBER", "Uber"),
    ("99APP", "99"),
    // Utilities and telecom
    ("CEMIG", "Cemig"),
    ("COPASA", "Copasa"),
    ("SABESP", "Sabesp"),
    ("ENERGISA", "Energisa"),
    ("VIVO", "Vivo"),
    ("CLARO", "Claro"),
    ("TIM ", "TIM"),
    ("OI S.A", "Oi"),
    // Government and taxes
    ("RECEITA FEDERAL", "Receita Federal"),
    ("DARF", "Receita Federal"),
    ("INSS", "INSS"),
    ("FGTS", "FGTS"),
    ("DETRAN", "Detran"),
    ("PREFEITURA", "Prefeitura"),
    ("IPTU", "Prefeitura"),
    ("IPVA", "Detran"),
    // Transfer-method phrases that identify the counterparty by themselves
    ("DEPOSITO EM DINHEIRO", "Depósito em dinheiro"),
    ("DEPÓSITO EM DINHEIRO", "Depósito em dinheiro"),
    ("APLICACAO POUPANCA", "Poupança"),
    ("RESGATE POUPANCA", "Poupança"),
    // Banks - specific institutions before the generic catch-all
    ("NUBANK", "Nubank"),
    ("BANCO INTER", "Banco Inter"),
    ("ITAU", "Itaú"),
    ("ITAÚ", "Itaú"),
    ("BRADESCO", "Bradesco"),
    ("SANTANDER", "Santander"),
    ("BANCO DO BRASIL", "Banco do Brasil"),
    ("CAIXA ECONOMICA", "Caixa Econômica"),
    ("SICOOB", "Sicoob"),
    ("SICREDI", "Sicredi"),
    ("C6 BANK", "C6 Bank"),
    ("BANCO", "Banco"),
];

// CNPJ is tried before CPF: the CPF pattern is a substring of an
// unpunctuated 14-digit CNPJ and would mis-truncate it.
static CPF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}").expect("valid CPF regex"));
static CNPJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}").expect("valid CNPJ regex"));

/// Extract a human-readable counterparty label from a narration.
pub fn detect_counterparty(narration: &str) -> String {
    let trimmed = narration.trim();
    if trimmed.is_empty() {
        return UNIDENTIFIED.to_string();
    }

    // Stage 1: known-institution keyword table
    let upper = trimmed.to_uppercase();
    for (keyword, label) in KNOWN_COUNTERPARTIES {
        if upper.contains(keyword) {
            return label.to_string();
        }
    }

    // Stage 2: CPF/CNPJ document number, returned verbatim
    if let Some(m) = CNPJ_RE.find(trimmed).or_else(|| CPF_RE.find(trimmed)) {
        return format!("CPF/CNPJ: {}", m.as_str());
    }

    // Stage 3: truncate long narrations to their first three tokens
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > 3 {
        format!("{}...", tokens[..3].join(" "))
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keyword_hit() {
        assert_eq!(detect_counterparty("PAGAMENTO NETFLIX REF 123"), "Netflix");
        assert_eq!(detect_counterparty("debito automatico cemig mar/25"), "Cemig");
        assert_eq!(detect_counterparty("PIX UBER TRIP 8812"), "Uber");
    }

    #[test]
    fn test_specific_bank_beats_generic_banco() {
        assert_eq!(detect_counterparty("TED BANCO INTER S.A."), "Banco Inter");
        assert_eq!(detect_counterparty("DOC BANCO BRADESCO"), "Bradesco");
        // Only the generic word left
        assert_eq!(detect_counterparty("TRANSF BANCO 748 AG 0001"), "Banco");
    }

    #[test]
    fn test_cpf_fallback_verbatim() {
        assert_eq!(
            detect_counterparty("PIX ENVIADO 123.456.789-01"),
            "CPF/CNPJ: 123.456.789-01"
        );
        // Unpunctuated digits are matched and returned as-is
        assert_eq!(
            detect_counterparty("PGTO 12345678901"),
            "CPF/CNPJ: 12345678901"
        );
    }

    #[test]
    fn test_cnpj_fallback_verbatim() {
        assert_eq!(
            detect_counterparty("PGTO FORNECEDOR 12.345.678/0001-90"),
            "CPF/CNPJ: 12.345.678/0001-90"
        );
    }

    #[test]
    fn test_truncation_of_long_narrations() {
        assert_eq!(detect_counterparty("ABC DEF GHI JKL MNO"), "ABC DEF GHI...");
    }

    #[test]
    fn test_short_narration_unchanged() {
        assert_eq!(detect_counterparty("LOJA DA ESQUINA"), "LOJA DA ESQUINA");
    }

    #[test]
    fn test_empty_is_unidentified() {
        assert_eq!(detect_counterparty(""), UNIDENTIFIED);
        assert_eq!(detect_counterparty("   "), UNIDENTIFIED);
    }

    #[test]
    fn test_keyword_wins_over_document_number() {
        // Stage 1 runs before stage 2
        assert_eq!(
            detect_counterparty("NETFLIX 12.345.678/0001-90"),
            "Netflix"
        );
    }
}
