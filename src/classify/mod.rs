//! Heuristic narration classifiers
//!
//! Each classifier is an ordered decision table evaluated first-match-wins
//! over the uppercased narration, so precedence lives in data rather than
//! control flow. A narration containing both "PIX" and "TRANSFERÊNCIA"
//! classifies as PIX because PIX is tested first.

pub mod counterparty;

pub use counterparty::detect_counterparty;

use crate::db::models::{PaymentMethod, TransactionKind};

/// Ordered (keywords, method) ladder for payment-method inference.
/// First entry whose keyword appears as a substring wins.
const PAYMENT_METHOD_LADDER: &[(&[&str], PaymentMethod)] = &[
    (&["PIX"], PaymentMethod::Pix),
    (&["TED"], PaymentMethod::Ted),
    (&["DOC"], PaymentMethod::Doc),
    (
        &[
            "DÉBITO AUTOMÁTICO",
            "DEBITO AUTOMATICO",
            "DEB AUTOM",
            "DEB. AUTOR",
        ],
        PaymentMethod::AutomaticDebit,
    ),
    (&["CARTÃO", "CARTAO", "CARD"], PaymentMethod::Card),
    (&["BOLETO"], PaymentMethod::Boleto),
    (
        &["TRANSFERÊNCIA", "TRANSFERENCIA", "TRANSF"],
        PaymentMethod::Transfer,
    ),
    (&["DEPÓSITO", "DEPOSITO"], PaymentMethod::Deposit),
    (&["SAQUE"], PaymentMethod::Withdrawal),
    (&["TARIFA", "TAXA"], PaymentMethod::Fee),
];

/// Ordered (keywords, kind) ladder for the coarse transaction-type tag.
/// Independent of the payment-method ladder, with its own vocabulary.
const TRANSACTION_KIND_LADDER: &[(&[&str], TransactionKind)] = &[
    (&["PIX"], TransactionKind::Pix),
    (&["TED"], TransactionKind::Ted),
    (&["PAGAMENTO", "PAGTO"], TransactionKind::Payment),
    (&["TARIFA", "TAXA"], TransactionKind::Fee),
    (&["DÉBITO", "DEBITO"], TransactionKind::Debit),
    (&["CRÉDITO", "CREDITO"], TransactionKind::Credit),
];

/// Infer the payment method from the narration text. Never blank:
/// unmatched narrations fall through to Other.
pub fn detect_payment_method(narration: &str) -> PaymentMethod {
    let upper = narration.to_uppercase();
    for (keywords, method) in PAYMENT_METHOD_LADDER {
        if keywords.iter().any(|kw| upper.contains(kw)) {
            return *method;
        }
    }
    PaymentMethod::Other
}

/// Derive the coarse transaction kind from the narration text.
pub fn detect_transaction_kind(narration: &str) -> TransactionKind {
    let upper = narration.to_uppercase();
    for (keywords, kind) in TRANSACTION_KIND_LADDER {
        if keywords.iter().any(|kw| upper.contains(kw)) {
            return *kind;
        }
    }
    TransactionKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pix_beats_transfer() {
        // Precedence: PIX is tested before the transfer keywords
        assert_eq!(
            detect_payment_method("TRANSFERÊNCIA PIX RECEBIDA"),
            PaymentMethod::Pix
        );
        assert_eq!(
            detect_payment_method("PIX TRANSF ENVIADA"),
            PaymentMethod::Pix
        );
    }

    #[test]
    fn test_each_rung_matches() {
        assert_eq!(detect_payment_method("PIX ENVIADO"), PaymentMethod::Pix);
        assert_eq!(detect_payment_method("TED RECEBIDA"), PaymentMethod::Ted);
        assert_eq!(detect_payment_method("DOC EMITIDO"), PaymentMethod::Doc);
        assert_eq!(
            detect_payment_method("DEBITO AUTOMATICO ENERGIA"),
            PaymentMethod::AutomaticDebit
        );
        assert_eq!(
            detect_payment_method("COMPRA CARTAO VISA"),
            PaymentMethod::Card
        );
        assert_eq!(
            detect_payment_method("PAGAMENTO BOLETO"),
            PaymentMethod::Boleto
        );
        assert_eq!(
            detect_payment_method("TRANSFERENCIA ENTRE CONTAS"),
            PaymentMethod::Transfer
        );
        assert_eq!(
            detect_payment_method("DEPOSITO EM DINHEIRO"),
            PaymentMethod::Deposit
        );
        assert_eq!(
            detect_payment_method("SAQUE 24H"),
            PaymentMethod::Withdrawal
        );
        assert_eq!(detect_payment_method("TARIFA MENSAL"), PaymentMethod::Fee);
    }

    #[test]
    fn test_no_match_is_other() {
        assert_eq!(
            detect_payment_method("RENDIMENTO POUPANCA"),
            PaymentMethod::Other
        );
        assert_eq!(detect_payment_method(""), PaymentMethod::Other);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(detect_payment_method("pix recebido"), PaymentMethod::Pix);
        assert_eq!(detect_payment_method("Boleto pago"), PaymentMethod::Boleto);
    }

    #[test]
    fn test_kind_ladder_precedence() {
        // PIX wins over the payment keyword
        assert_eq!(
            detect_transaction_kind("PAGAMENTO PIX NETFLIX"),
            TransactionKind::Pix
        );
        assert_eq!(
            detect_transaction_kind("PAGAMENTO DE BOLETO"),
            TransactionKind::Payment
        );
        assert_eq!(detect_transaction_kind("TED ENVIADA"), TransactionKind::Ted);
        assert_eq!(
            detect_transaction_kind("TARIFA PACOTE SERVICOS"),
            TransactionKind::Fee
        );
        assert_eq!(
            detect_transaction_kind("DEBITO CONVENIO"),
            TransactionKind::Debit
        );
        assert_eq!(
            detect_transaction_kind("CREDITO SALARIO"),
            TransactionKind::Credit
        );
        assert_eq!(
            detect_transaction_kind("RENDIMENTO"),
            TransactionKind::Other
        );
    }

    #[test]
    fn test_kind_and_method_are_independent() {
        // Same narration, different ladders, different vocabularies
        let narration = "PAGAMENTO DE BOLETO BANCARIO";
        assert_eq!(detect_payment_method(narration), PaymentMethod::Boleto);
        assert_eq!(detect_transaction_kind(narration), TransactionKind::Payment);
    }
}
