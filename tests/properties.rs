//! Property tests for the codec and for random sequences of transfers

use proptest::prelude::*;
use utxochain::blockchain::{Block, Ledger};
use utxochain::codec;
use utxochain::error::ChainError;
use utxochain::miner::ProofOfWork;
use utxochain::persistence::InMemoryStore;
use utxochain::transaction::{Transaction, TxInput, TxOutput, COINBASE_REWARD};

const ADDRESSES: [&str; 3] = ["Alice", "Bob", "Carol"];

fn arb_input() -> impl Strategy<Value = TxInput> {
    (
        prop::collection::vec(any::<u8>(), 0..40),
        any::<i64>(),
        "[a-zA-Z0-9 ]{0,24}",
    )
        .prop_map(|(ref_tx_id, ref_out_index, auth_tag)| TxInput {
            ref_tx_id,
            ref_out_index,
            auth_tag,
        })
}

fn arb_output() -> impl Strategy<Value = TxOutput> {
    (any::<u64>(), "[a-zA-Z0-9]{0,24}").prop_map(|(value, lock_key)| TxOutput { value, lock_key })
}

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        prop::collection::vec(arb_input(), 0..4),
        prop::collection::vec(arb_output(), 0..4),
    )
        .prop_map(|(inputs, outputs)| Transaction::new(inputs, outputs).unwrap())
}

fn arb_block() -> impl Strategy<Value = Block> {
    (
        any::<[u8; 32]>(),
        prop::collection::vec(arb_transaction(), 0..4),
        proptest::option::of(any::<[u8; 32]>()),
        any::<u64>(),
    )
        .prop_map(|(hash, transactions, prev_hash, nonce)| Block {
            hash,
            transactions,
            prev_hash,
            nonce,
        })
}

proptest! {
    #[test]
    fn prop_transaction_codec_round_trip(tx in arb_transaction()) {
        let bytes = codec::encode_transaction(&tx).unwrap();
        prop_assert_eq!(codec::encode_transaction(&tx).unwrap(), bytes.clone());

        let decoded = codec::decode_transaction(&bytes).unwrap();
        prop_assert_eq!(decoded.compute_id().unwrap(), tx.id);
        prop_assert_eq!(decoded, tx);
    }

    #[test]
    fn prop_block_codec_round_trip(block in arb_block()) {
        let bytes = codec::encode_block(&block).unwrap();
        let decoded = codec::decode_block(&bytes).unwrap();
        prop_assert_eq!(decoded, block);
    }

    #[test]
    fn prop_truncated_block_is_corrupt(block in arb_block(), cut in 1usize..16) {
        let bytes = codec::encode_block(&block).unwrap();
        let end = bytes.len().saturating_sub(cut);
        let result = codec::decode_block(&bytes[..end]);
        prop_assert!(matches!(result, Err(ChainError::CorruptRecord(_))));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_random_transfers_keep_chain_consistent(
        steps in prop::collection::vec((0usize..3, 0usize..3, 1u64..80), 1..6)
    ) {
        let pow = ProofOfWork::new(6).unwrap();
        let mut ledger = Ledger::init(Box::new(InMemoryStore::new()), ADDRESSES[0], pow).unwrap();
        let mut appended = 1u64;

        for (from, to, amount) in steps {
            let (from, to) = (ADDRESSES[from], ADDRESSES[to]);
            let before = ledger.balance(from).unwrap();
            match ledger.send(from, to, amount) {
                Ok(_) => appended += 1,
                Err(ChainError::InsufficientFunds { needed, available }) => {
                    prop_assert_eq!(needed, amount);
                    prop_assert_eq!(available, before);
                    prop_assert!(before < amount);
                }
                Err(e) => return Err(TestCaseError::fail(e.to_string())),
            }
        }

        let blocks: Vec<Block> = ledger.iter().collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(blocks.len() as u64, appended);
        prop_assert!(blocks.last().unwrap().is_genesis());
        for block in &blocks {
            prop_assert!(ledger.proof_of_work().validate(block));
        }

        let utxo = ledger.utxo_set().unwrap();
        let mut total = 0u64;
        for address in ADDRESSES {
            let balance = ledger.balance(address).unwrap();
            prop_assert_eq!(balance, utxo.get_balance(address));
            total += balance;
        }
        prop_assert_eq!(total, COINBASE_REWARD);
        prop_assert_eq!(ledger.verify().unwrap().blocks, appended);
    }
}
