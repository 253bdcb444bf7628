//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::coinbase("Alice", "").unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs.len(), 1);
        assert!(tx.inputs[0].ref_tx_id.is_empty());
        assert_eq!(tx.inputs[0].ref_out_index, -1);
        assert_eq!(tx.inputs[0].auth_tag, "Coins to Alice");
        assert_eq!(tx.outputs, vec![TxOutput::new(COINBASE_REWARD, "Alice")]);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_coinbase_keeps_explicit_memo() {
        let tx = Transaction::coinbase("Alice", GENESIS_MEMO).unwrap();
        assert_eq!(tx.inputs[0].auth_tag, GENESIS_MEMO);
    }

    #[test]
    fn test_id_is_deterministic_and_content_bound() {
        let a = Transaction::coinbase("Alice", "memo").unwrap();
        let b = Transaction::coinbase("Alice", "memo").unwrap();
        let c = Transaction::coinbase("Bob", "memo").unwrap();

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.compute_id().unwrap(), a.id);
    }

    #[test]
    fn test_id_ignores_current_id_field() {
        let mut tx = Transaction::coinbase("Alice", "memo").unwrap();
        let sealed = tx.id;
        tx.id = [0xAB; 32];
        assert_eq!(tx.compute_id().unwrap(), sealed);
    }

    #[test]
    fn test_regular_transaction_is_not_coinbase() {
        let input = TxInput {
            ref_tx_id: vec![7u8; 32],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(vec![input], vec![TxOutput::new(10, "Bob")]).unwrap();
        assert!(!tx.is_coinbase());
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_unlock_is_plaintext_equality() {
        let input = TxInput {
            ref_tx_id: vec![1u8; 32],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let output = TxOutput::new(5, "Alice");

        assert!(input.can_unlock("Alice"));
        assert!(!input.can_unlock("alice"));
        assert!(output.can_be_unlocked("Alice"));
        assert!(!output.can_be_unlocked("Bob"));
    }

    #[test]
    fn test_tampered_id_fails_validation() {
        let mut tx = Transaction::coinbase("Alice", "").unwrap();
        tx.outputs[0].value = 1_000_000;

        let result = tx.validate();
        if let Err(ChainError::InvalidTransaction(msg)) = result {
            assert!(msg.contains("id mismatch"));
        } else {
            panic!("Expected InvalidTransaction error");
        }
    }

    #[test]
    fn test_empty_outputs_rejected() {
        let input = TxInput {
            ref_tx_id: vec![1u8; 32],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(vec![input], vec![]).unwrap();
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let input = TxInput {
            ref_tx_id: vec![1u8; 5],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(vec![input], vec![TxOutput::new(1, "Bob")]).unwrap();
        assert!(tx.validate().is_err());

        let input = TxInput {
            ref_tx_id: Vec::new(),
            ref_out_index: 3,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(vec![input], vec![TxOutput::new(1, "Bob")]).unwrap();
        assert!(!tx.is_coinbase());
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_total_output() {
        let input = TxInput {
            ref_tx_id: vec![1u8; 32],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(
            vec![input],
            vec![TxOutput::new(60, "Bob"), TxOutput::new(40, "Alice")],
        )
        .unwrap();
        assert_eq!(tx.total_output(), Some(100));

        let input = TxInput {
            ref_tx_id: vec![1u8; 32],
            ref_out_index: 0,
            auth_tag: "Alice".to_string(),
        };
        let tx = Transaction::new(
            vec![input],
            vec![TxOutput::new(u64::MAX, "Bob"), TxOutput::new(5, "Bob")],
        )
        .unwrap();
        assert_eq!(tx.total_output(), None);
    }

    #[test]
    fn test_coinbase_must_pay_fixed_reward() {
        let memo = TxInput {
            ref_tx_id: Vec::new(),
            ref_out_index: COINBASE_OUT_INDEX,
            auth_tag: "Coins to Mallory".to_string(),
        };

        let inflated =
            Transaction::new(vec![memo.clone()], vec![TxOutput::new(1_000_000, "Mallory")]).unwrap();
        assert!(inflated.is_coinbase());
        assert!(matches!(inflated.validate(), Err(ChainError::InvalidTransaction(_))));

        let split = Transaction::new(
            vec![memo],
            vec![TxOutput::new(u64::MAX, "Mallory"), TxOutput::new(5, "Mallory")],
        )
        .unwrap();
        assert!(matches!(split.validate(), Err(ChainError::InvalidTransaction(_))));
    }
}
