// src/bin/web.rs - a thin HTTP facade over a running node: read endpoints
// for chain/mempool/peers/balance, write endpoints to submit a transaction
// or trigger mining (§6).
use std::convert::Infallible;
use std::path::PathBuf;

use annalink::chain::ChainManager;
use annalink::config::AnnalinkConfig;
use annalink::consensus::ProofOfWork;
use annalink::node::Node;
use annalink::storage::Storage;
use annalink::transaction::Transaction;
use clap::Parser;
use log::info;
use serde::Deserialize;
use warp::http::StatusCode;
use warp::Filter;

#[derive(Parser)]
#[command(name = "annalink-web", about = "HTTP API for an Annalink node")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "blockchain.db")]
    data_dir: String,
    #[arg(long, default_value_t = 8080)]
    http_port: u16,
}

#[derive(Deserialize)]
struct SubmitTransaction {
    sender: String,
    receiver: String,
    amount: f64,
    #[serde(default)]
    fee: f64,
    public_key: String,
    signature: String,
}

#[derive(Deserialize)]
struct MineRequest {
    miner_address: String,
}

fn with_node(node: Node) -> impl Filter<Extract = (Node,), Error = Infallible> + Clone {
    warp::any().map(move || node.clone())
}

#[tokio::main]
async fn main() {
    annalink::init_logging();
    let args = Args::parse();

    let config = AnnalinkConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("failed to load configuration: {e}");
        std::process::exit(1);
    });

    let pow = ProofOfWork::new(
        config.consensus.difficulty_target,
        config.consensus.target_block_time,
        config.consensus.adjustment_interval,
    );
    let storage = Storage::open(&args.data_dir).unwrap_or_else(|e| {
        eprintln!("failed to open storage: {e}");
        std::process::exit(1);
    });
    let manager = ChainManager::open(storage, pow).unwrap_or_else(|e| {
        eprintln!("failed to open chain: {e}");
        std::process::exit(1);
    });

    let node = Node::new(config.network.host.clone(), config.network.port, manager, config.network.max_peers);

    let server_node = node.clone();
    tokio::spawn(async move {
        if let Err(e) = server_node.run_server().await {
            log::error!("p2p server stopped: {e}");
        }
    });
    let sync_node = node.clone();
    tokio::spawn(async move {
        sync_node.run_sync_loop().await;
    });

    let info_route = warp::path("info")
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|node: Node| {
            warp::reply::json(&serde_json::json!({
                "host": node.host,
                "port": node.port,
                "peers": node.connected_peers().len(),
                "version": "1.0",
            }))
        });

    let blockchain_route = warp::path("blockchain")
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|node: Node| {
            let (height, difficulty, pending, mining_reward) = node.chain_summary();
            warp::reply::json(&serde_json::json!({
                "blocks": height,
                "difficulty": difficulty,
                "pending_transactions": pending,
                "mining_reward": mining_reward,
            }))
        });

    let chain_route = warp::path("chain")
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|node: Node| warp::reply::json(&node.snapshot_chain()));

    let pending_route = warp::path("pending")
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|node: Node| warp::reply::json(&node.snapshot_pending()));

    let peers_route = warp::path("peers")
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|node: Node| warp::reply::json(&node.known_peers()));

    let balance_route = warp::path!("balance" / String)
        .and(warp::get())
        .and(with_node(node.clone()))
        .map(|address: String, node: Node| {
            warp::reply::json(&serde_json::json!({ "address": address, "balance": node.get_balance(&address) }))
        });

    let submit_transaction_route = warp::path("transactions")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(|body: SubmitTransaction, node: Node| async move {
            let mut tx = Transaction::new(body.sender, body.receiver, body.amount, body.fee);
            tx.public_key = Some(body.public_key);
            tx.signature = Some(body.signature);
            tx.txid = tx.calculate_txid().unwrap_or(tx.txid);

            if node.add_transaction(tx.clone()) {
                node.broadcast_transaction(&tx).await;
                warp::reply::with_status(warp::reply::json(&tx), StatusCode::CREATED)
            } else {
                warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({ "error": "transaction rejected" })),
                    StatusCode::BAD_REQUEST,
                )
            }
        });

    let mine_route = warp::path("mine")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(|body: MineRequest, node: Node| async move {
            match node.mine_pending(&body.miner_address) {
                Some(block) => {
                    node.broadcast_block(&block).await;
                    warp::reply::with_status(warp::reply::json(&block), StatusCode::CREATED)
                }
                None => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({ "error": "mining timed out" })),
                    StatusCode::REQUEST_TIMEOUT,
                ),
            }
        });

    let routes = info_route
        .or(blockchain_route)
        .or(chain_route)
        .or(pending_route)
        .or(peers_route)
        .or(balance_route)
        .or(submit_transaction_route)
        .or(mine_route);

    info!("HTTP API listening on 0.0.0.0:{}", args.http_port);
    warp::serve(routes).run(([0, 0, 0, 0], args.http_port)).await;
}
