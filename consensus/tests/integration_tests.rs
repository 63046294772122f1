//!
//! Integration tests driving full consensus scenarios
//!

use kyanite_consensus::consensus::test_consensus::TestConsensus;
use kyanite_consensus::model::stores::ghostdag::GhostdagStoreReader;
use kyanite_consensus_core::{
    api::ConsensusApi,
    blockstatus::BlockStatus,
    config::params::{simnet_params, Params},
    errors::block::RuleError,
    subnets::SUBNETWORK_ID_NATIVE,
    tx::{ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput},
};
use kyanite_hashes::Hash;

fn test_params() -> Params {
    let mut params = simnet_params();
    params.ghostdag_k = 10;
    params.coinbase_maturity = 0;
    params.merge_depth = 5;
    params.finality_depth = 10;
    params.pruning_depth = 30;
    // Anchor genesis at the local clock so that block timestamps derived
    // from it respect the far-future bound
    params.genesis.timestamp =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_millis() as u64;
    params
}

fn spend_tx(outpoint: TransactionOutpoint, amount: u64, to_value: u64, tag: u8) -> Transaction {
    Transaction::new(
        0,
        vec![TransactionInput::new(outpoint, vec![], 0)],
        vec![TransactionOutput::new(to_value.min(amount), ScriptPublicKey::new(0, vec![tag]))],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    )
}

#[test]
fn test_genesis_only() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();

    assert_eq!(tc.get_virtual_selected_parent(), genesis);
    assert_eq!(tc.storage.ghostdag_store.get_compact_data(genesis).unwrap().blue_score, 0);
    assert_eq!(tc.get_tips(), vec![genesis]);
    assert_eq!(tc.get_block_status(genesis), Some(BlockStatus::StatusUTXOValid));
    assert_eq!(tc.pruning_point(), genesis);
}

#[test]
fn test_linear_chain_of_three() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();

    let a = tc.add_block_with_parents(vec![genesis]).unwrap();
    let b = tc.add_block_with_parents(vec![a]).unwrap();
    let c = tc.add_block_with_parents(vec![b]).unwrap();

    for (block, expected_blue_score) in [(a, 1), (b, 2), (c, 3)] {
        assert_eq!(tc.storage.ghostdag_store.get_compact_data(block).unwrap().blue_score, expected_blue_score);
        assert_eq!(tc.get_block_status(block), Some(BlockStatus::StatusUTXOValid));
    }

    assert_eq!(tc.get_virtual_selected_parent(), c);
    assert!(tc.is_ancestor_of(a, c).unwrap());
    assert!(!tc.is_ancestor_of(c, a).unwrap());
}

#[test]
fn test_diamond() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();

    let a = tc.add_block_with_parents(vec![genesis]).unwrap();
    let b = tc.add_block_with_parents(vec![genesis]).unwrap();
    let c = tc.add_block_with_parents(vec![a, b]).unwrap();

    let c_data = tc.storage.ghostdag_store.get_data(c).unwrap();

    // The selected parent maximizes (blue work, hash); with equal bits the
    // higher hash wins
    let expected_selected = if a > b { a } else { b };
    let non_selected = if a > b { b } else { a };
    assert_eq!(c_data.selected_parent, expected_selected);

    // The merge set (beyond the selected parent) holds exactly the non-selected parent
    assert_eq!(c_data.mergeset_size() - 1, 1);
    assert_eq!(c_data.mergeset_blues.as_slice(), &[expected_selected, non_selected]);

    // blue_score(C) = blue_score(sp) + |mergeSetBlues| + 1
    assert_eq!(c_data.blue_score, 3);

    assert_eq!(tc.get_virtual_selected_parent(), c);
}

#[test]
fn test_insertion_idempotence() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();

    let block = tc.build_block_with_parents(vec![genesis]).to_immutable();
    tc.validate_and_insert_block(block.clone()).unwrap();
    let virtual_sp = tc.get_virtual_selected_parent();

    // A second back-to-back insertion of the same block is a no-op
    let result = tc.validate_and_insert_block(block);
    assert!(matches!(result, Err(RuleError::DuplicateBlock)));
    assert_eq!(tc.get_virtual_selected_parent(), virtual_sp);
}

#[test]
fn test_parents_count_boundaries() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();
    let max_parents = tc.params().max_block_parents as usize;

    let mut tips = Vec::new();
    for _ in 0..max_parents + 1 {
        tips.push(tc.add_block_with_parents(vec![genesis]).unwrap());
    }

    // Exactly MaxBlockParents is accepted
    let ok_block = tc.build_block_with_parents(tips[..max_parents].to_vec()).to_immutable();
    tc.validate_and_insert_block(ok_block).unwrap();

    // MaxBlockParents + 1 is rejected
    let bad_block = tc.build_block_with_parents(tips.clone()).to_immutable();
    assert!(matches!(tc.validate_and_insert_block(bad_block), Err(RuleError::TooManyParents(n, m)) if n == m + 1));
}

#[test]
fn test_mergeset_size_boundaries() {
    let mut params = test_params();
    params.mergeset_size_limit = 3;
    let tc = TestConsensus::new(params);
    let genesis = tc.genesis_hash();

    let mut tips = Vec::new();
    for _ in 0..5 {
        tips.push(tc.add_block_with_parents(vec![genesis]).unwrap());
    }

    // Merging 4 siblings: the merge set (excluding the selected parent) is
    // exactly the limit
    let ok_block = tc.build_block_with_parents(tips[..4].to_vec()).to_immutable();
    tc.validate_and_insert_block(ok_block).unwrap();

    // One sibling more and the limit is crossed
    let bad_block = tc.build_block_with_parents(tips.clone()).to_immutable();
    assert!(matches!(tc.validate_and_insert_block(bad_block), Err(RuleError::MergeSetTooBig(4, 3))));
}

#[test]
fn test_timestamp_boundaries() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();
    let a = tc.add_block_with_parents(vec![genesis]).unwrap();

    // The block builder sets timestamp to past-median-time + 1, which is the minimal valid value
    let mut boundary_block = tc.build_block_with_parents(vec![a]);
    let minimal_valid_timestamp = boundary_block.header.timestamp;

    // timestamp == pastMedianTime is rejected
    boundary_block.header.timestamp = minimal_valid_timestamp - 1;
    boundary_block.header.finalize();
    assert!(matches!(tc.validate_and_insert_block(boundary_block.clone().to_immutable()), Err(RuleError::TimeTooOld(_, _))));

    // timestamp == pastMedianTime + 1 is accepted
    boundary_block.header.timestamp = minimal_valid_timestamp;
    boundary_block.header.finalize();
    tc.validate_and_insert_block(boundary_block.to_immutable()).unwrap();
}

/// Returns the hash of a funding block over genesis plus the outpoint of the
/// subsidy UTXO its coinbase creates (which enters the UTXO set once a chain
/// descendant applies the funding block's coinbase)
fn fund(tc: &TestConsensus) -> (Hash, TransactionOutpoint, u64) {
    let genesis = tc.genesis_hash();
    let funding_block = tc.add_block_with_parents(vec![genesis]).unwrap();
    let coinbase_id = tc.get_block(funding_block).unwrap().transactions[0].id();
    let subsidy = tc.params().base_subsidy;
    (funding_block, TransactionOutpoint::new(coinbase_id, 0), subsidy)
}

#[test]
fn test_double_spend_in_same_block() {
    let tc = TestConsensus::new(test_params());
    let (funding_block, outpoint, subsidy) = fund(&tc);

    let tx1 = spend_tx(outpoint, subsidy, subsidy - 1000, 1);
    let tx2 = spend_tx(outpoint, subsidy, subsidy - 2000, 2);

    let virtual_sp_before = tc.get_virtual_selected_parent();
    let block = tc.build_block_with_parents_and_transactions(vec![funding_block], vec![tx1, tx2]).to_immutable();
    let result = tc.validate_and_insert_block(block);

    assert!(matches!(result, Err(RuleError::DuplicateInputsInBlock(op)) if op == outpoint));
    // No state changes
    assert_eq!(tc.get_virtual_selected_parent(), virtual_sp_before);
}

#[test]
fn test_double_spend_across_blocks() {
    let tc = TestConsensus::new(test_params());
    let (funding_block, outpoint, subsidy) = fund(&tc);

    let tx1 = spend_tx(outpoint, subsidy, subsidy - 1000, 1);
    let tx2 = spend_tx(outpoint, subsidy, subsidy - 2000, 2);
    let (tx1_id, tx2_id) = (tx1.id(), tx2.id());

    // Two sibling blocks each spend the same output; both are individually accepted
    let s1 = {
        let block = tc.build_block_with_parents_and_transactions(vec![funding_block], vec![tx1]).to_immutable();
        let hash = block.hash();
        tc.validate_and_insert_block(block).unwrap();
        hash
    };
    let s2 = {
        let block = tc.build_block_with_parents_and_transactions(vec![funding_block], vec![tx2]).to_immutable();
        let hash = block.hash();
        tc.validate_and_insert_block(block).unwrap();
        hash
    };

    // A block merging both: exactly one of the conflicting spends is accepted
    let merging = {
        let block = tc.build_block_with_parents(vec![s1, s2]).to_immutable();
        let hash = block.hash();
        tc.validate_and_insert_block(block).unwrap();
        hash
    };
    assert_eq!(tc.get_virtual_selected_parent(), merging);

    let acceptance_data = tc.get_block_acceptance_data(merging).unwrap();
    let verdicts: Vec<(Hash, bool)> = acceptance_data
        .iter()
        .flat_map(|mbad| mbad.accepted_transactions.iter().map(|tad| (tad.transaction.id(), tad.is_accepted)))
        .filter(|(id, _)| *id == tx1_id || *id == tx2_id)
        .collect();

    assert_eq!(verdicts.len(), 2);
    let accepted_count = verdicts.iter().filter(|(_, accepted)| *accepted).count();
    assert_eq!(accepted_count, 1, "exactly one of the conflicting spends must be accepted");

    // The winning spend belongs to the merge-set blue which comes first in
    // the canonical order (the selected parent)
    let merging_data = tc.storage.ghostdag_store.get_data(merging).unwrap();
    let expected_winner_block = merging_data.selected_parent;
    let winner_tx = if expected_winner_block == s1 { tx1_id } else { tx2_id };
    assert!(verdicts.contains(&(winner_tx, true)));
}

#[test]
fn test_finality_violation() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();
    let finality_depth = tc.params().finality_depth;

    // Build a chain longer than the finality depth
    let mut tip = genesis;
    for _ in 0..finality_depth + 5 {
        tip = tc.add_block_with_parents(vec![tip]).unwrap();
    }
    assert_eq!(tc.get_virtual_selected_parent(), tip);

    // Attach a block whose selected chain does not contain the current
    // finality point
    let fork = tc.add_block_with_parents(vec![genesis]).unwrap();

    // The fork is accepted to the DAG but may never become the virtual
    // selected parent
    assert_eq!(tc.get_block_status(fork), Some(BlockStatus::StatusUTXOPendingVerification));
    assert_eq!(tc.get_virtual_selected_parent(), tip);
    assert!(tc.get_tips().contains(&fork));
}

#[test]
fn test_acceptance_commitments_hold_along_chain() {
    // Every chain block passes `verify_expected_utxo_state` during virtual
    // resolution, hence a run over a chain carrying transactions validates
    // the utxo-commitment and accepted-id-merkle-root invariants end to end
    let tc = TestConsensus::new(test_params());
    let (funding_block, outpoint, subsidy) = fund(&tc);

    let tx = spend_tx(outpoint, subsidy, subsidy - 1000, 7);
    let tx_first_output = TransactionOutpoint::new(tx.id(), 0);
    let spender = {
        let block = tc.build_block_with_parents_and_transactions(vec![funding_block], vec![tx]).to_immutable();
        let hash = block.hash();
        tc.validate_and_insert_block(block).unwrap();
        hash
    };

    // Spend the change output in a follow-up block
    let tx2 = spend_tx(tx_first_output, subsidy - 1000, subsidy - 5000, 8);
    let block = tc.build_block_with_parents_and_transactions(vec![spender], vec![tx2]).to_immutable();
    let (status, chain_path) = tc.validate_and_insert_block(block).unwrap();
    assert_eq!(status, BlockStatus::StatusUTXOValid);
    assert_eq!(chain_path.added.len(), 1);
}

#[test]
fn test_block_template_round_trip() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();
    tc.add_block_with_parents(vec![genesis]).unwrap();

    let template = tc.build_block_template(TestConsensus::default_miner_data(), vec![]).unwrap();
    let (status, _) = tc.validate_and_insert_block(template.block.to_immutable()).unwrap();
    assert_eq!(status, BlockStatus::StatusUTXOValid);
}

#[test]
fn test_hashes_between_and_locator() {
    let tc = TestConsensus::new(test_params());
    let genesis = tc.genesis_hash();

    let mut chain = vec![genesis];
    for _ in 0..8 {
        chain.push(tc.add_block_with_parents(vec![*chain.last().unwrap()]).unwrap());
    }
    let tip = *chain.last().unwrap();

    let (hashes, highest) = tc.get_hashes_between(genesis, tip, 1 << 10).unwrap();
    assert_eq!(highest, tip);
    assert_eq!(hashes, chain[1..].to_vec());

    let locator = tc.create_block_locator(None, None).unwrap();
    assert_eq!(*locator.first().unwrap(), tip);
    assert_eq!(*locator.last().unwrap(), genesis);
    // Exponential spacing means a logarithmic length
    assert!(locator.len() <= 5, "locator of a 9-block chain should be short, got {}", locator.len());

    // A peer which only knows the genesis zooms in on the lowest segment
    let (low, high) = tc.find_next_block_locator_boundaries(&locator[locator.len() - 1..]).unwrap();
    assert_eq!(low, genesis);
    assert_eq!(high, genesis);
}
