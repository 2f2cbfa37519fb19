// tests/integration_test.rs - black-box coverage of the chain manager
// against a real on-disk store, exercising the flows an operator drives
// through the CLI.
use annalink::chain::ChainManager;
use annalink::consensus::ProofOfWork;
use annalink::storage::Storage;
use annalink::transaction::Transaction;
use annalink::wallet::Wallet;

fn open_chain(path: &str, difficulty: u32) -> ChainManager {
    let storage = Storage::open(path).unwrap();
    ChainManager::open(storage, ProofOfWork::new(difficulty, 600, 10)).unwrap()
}

#[test]
fn mine_sign_send_and_reopen_preserves_balances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.db");
    let path_str = path.to_str().unwrap();

    let miner = Wallet::generate();
    let receiver = Wallet::generate();

    {
        let mut chain = open_chain(path_str, 1);
        chain.mine_pending(miner.address()).unwrap();

        let mut tx = Transaction::new(miner.address().to_string(), receiver.address().to_string(), 5.0, 0.5);
        tx.sign(&miner.keypair).unwrap();
        assert!(chain.add_transaction(tx));
        chain.mine_pending(miner.address()).unwrap();

        assert_eq!(chain.get_balance(receiver.address()), 5.0);
        chain.close();
    }

    // Reopening at the same path must observe every previously mined block.
    let reopened = open_chain(path_str, 1);
    assert_eq!(reopened.height(), 3);
    assert_eq!(reopened.get_balance(receiver.address()), 5.0);
    assert!(reopened.is_chain_valid());
}

#[test]
fn transaction_rejected_with_insufficient_balance_never_touches_mempool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.db");
    let mut chain = open_chain(path.to_str().unwrap(), 1);

    let pauper = Wallet::generate();
    let mut tx = Transaction::new(pauper.address().to_string(), Wallet::generate().address().to_string(), 100.0, 0.0);
    tx.sign(&pauper.keypair).unwrap();

    assert!(!chain.add_transaction(tx));
    assert!(chain.pending_transactions().is_empty());
}

#[test]
fn wallet_file_round_trips_through_disk_and_reopens_the_same_chain_identity() {
    let dir = tempfile::tempdir().unwrap();
    let wallet_path = dir.path().join("wallet.json");
    let chain_path = dir.path().join("chain.db");

    let wallet = Wallet::generate();
    wallet.save_to_file(&wallet_path, Some("correct horse battery staple")).unwrap();

    let loaded = Wallet::load_from_file(&wallet_path, Some("correct horse battery staple")).unwrap();
    assert_eq!(loaded.address(), wallet.address());

    let mut chain = open_chain(chain_path.to_str().unwrap(), 1);
    chain.mine_pending(loaded.address()).unwrap();
    assert_eq!(chain.get_balance(wallet.address()), 50.0);
}

#[test]
fn replace_chain_ignores_invalid_candidate_and_keeps_local_height() {
    let dir_a = tempfile::tempdir().unwrap();
    let mut node_a = open_chain(dir_a.path().join("a.db").to_str().unwrap(), 0);
    let miner_a = Wallet::generate();
    node_a.mine_pending(miner_a.address()).unwrap();
    node_a.mine_pending(miner_a.address()).unwrap();
    assert_eq!(node_a.height(), 3);

    let mut forged = node_a.chain().to_vec();
    forged.push(forged.last().unwrap().clone()); // duplicate tip, breaks linkage
    assert!(!node_a.replace_chain(forged));
    assert_eq!(node_a.height(), 3);
}
