// src/main.rs - operator-facing CLI: wallet management, transaction
// submission, mining, and the node's server/sync loop.
use std::path::PathBuf;

use annalink::chain::ChainManager;
use annalink::config::AnnalinkConfig;
use annalink::consensus::ProofOfWork;
use annalink::node::Node;
use annalink::peer::Peer;
use annalink::storage::Storage;
use annalink::transaction::Transaction;
use annalink::wallet::Wallet;
use clap::{Parser, Subcommand};
use log::{error, info};

#[derive(Parser)]
#[command(name = "annalink", version, about = "A proof-of-work cryptocurrency node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new wallet.
    CreateWallet {
        #[arg(long)]
        save: Option<PathBuf>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign and submit a transaction, then mine it immediately.
    Send {
        #[arg(long = "wallet-file")]
        wallet_file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value_t = 0.0)]
        fee: f64,
        #[arg(long, default_value = "blockchain.db")]
        data_dir: String,
    },
    /// Mine pending transactions in a loop.
    Mine {
        #[arg(long = "wallet-file")]
        wallet_file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "blockchain.db")]
        data_dir: String,
    },
    /// Print the balance of a wallet.
    Balance {
        #[arg(long = "wallet-file")]
        wallet_file: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "blockchain.db")]
        data_dir: String,
    },
    /// Print the local chain height and tip.
    Blockchain {
        #[arg(long, default_value = "blockchain.db")]
        data_dir: String,
    },
    /// Run the P2P node: inbound server and outbound sync loop.
    Node {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        peer: Vec<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "blockchain.db")]
        data_dir: String,
    },
}

fn open_chain_manager(data_dir: &str, pow: ProofOfWork) -> annalink::Result<ChainManager> {
    let storage = Storage::open(data_dir)?;
    ChainManager::open(storage, pow)
}

fn load_wallet(path: &PathBuf, password: Option<&str>) -> Wallet {
    match Wallet::load_from_file(path, password) {
        Ok(wallet) => wallet,
        Err(e) => {
            eprintln!("error loading wallet: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    annalink::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::CreateWallet { save, password } => {
            let wallet = Wallet::generate();
            println!("New wallet created!");
            println!("Address: {}", wallet.address());
            println!("Private key: {}", wallet.keypair.private_key_hex());

            if let Some(path) = save {
                if let Err(e) = wallet.save_to_file(&path, password.as_deref()) {
                    eprintln!("failed to save wallet: {e}");
                    std::process::exit(1);
                }
                println!("Wallet saved to {}", path.display());
            }
        }

        Command::Send { wallet_file, password, to, amount, fee, data_dir } => {
            let wallet = load_wallet(&wallet_file, password.as_deref());
            let mut manager = match open_chain_manager(&data_dir, ProofOfWork::default()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("failed to open chain: {e}");
                    std::process::exit(1);
                }
            };

            let mut tx = Transaction::new(wallet.address().to_string(), to, amount, fee);
            if let Err(e) = tx.sign(&wallet.keypair) {
                eprintln!("failed to sign transaction: {e}");
                std::process::exit(1);
            }

            if manager.add_transaction(tx.clone()) {
                println!("Transaction sent: {}", tx.txid);
                match manager.mine_pending(wallet.address()) {
                    Some(block) => println!("Transaction mined in block {}", block.index),
                    None => {
                        println!("Failed to mine transaction");
                        std::process::exit(1);
                    }
                }
            } else {
                eprintln!("failed to send transaction");
                std::process::exit(1);
            }
        }

        Command::Mine { wallet_file, password, data_dir } => {
            let wallet = load_wallet(&wallet_file, password.as_deref());
            let mut manager = match open_chain_manager(&data_dir, ProofOfWork::default()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("failed to open chain: {e}");
                    std::process::exit(1);
                }
            };

            println!("Mining... press Ctrl+C to stop");
            loop {
                match manager.mine_pending(wallet.address()) {
                    Some(block) => {
                        println!("Mined block {} with {} transactions", block.index, block.transactions.len());
                    }
                    None => {
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Command::Balance { wallet_file, password, data_dir } => {
            let wallet = load_wallet(&wallet_file, password.as_deref());
            let manager = match open_chain_manager(&data_dir, ProofOfWork::default()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("failed to open chain: {e}");
                    std::process::exit(1);
                }
            };
            println!("Balance: {}", manager.get_balance(wallet.address()));
        }

        Command::Blockchain { data_dir } => {
            let manager = match open_chain_manager(&data_dir, ProofOfWork::default()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("failed to open chain: {e}");
                    std::process::exit(1);
                }
            };
            println!("Height: {}", manager.height());
            println!("Tip hash: {}", manager.latest_block().hash);
            println!("Pending transactions: {}", manager.pending_transactions().len());
        }

        Command::Node { host, port, peer, config, data_dir } => {
            let loaded_config = match AnnalinkConfig::load(config.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("failed to load configuration: {e}");
                    std::process::exit(1);
                }
            };

            let host = host.unwrap_or(loaded_config.network.host);
            let port = port.unwrap_or(loaded_config.network.port);
            let pow = ProofOfWork::new(
                loaded_config.consensus.difficulty_target,
                loaded_config.consensus.target_block_time,
                loaded_config.consensus.adjustment_interval,
            );

            let manager = match open_chain_manager(&data_dir, pow) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("failed to open chain: {e}");
                    std::process::exit(1);
                }
            };
            info!("blockchain initialized with height {}", manager.height());

            let node = Node::new(host.clone(), port, manager, loaded_config.network.max_peers);
            for addr in &peer {
                if let Some((host, port)) = addr.rsplit_once(':') {
                    if let Ok(port) = port.parse() {
                        node.add_known_peer(Peer::new(host.to_string(), port));
                    }
                }
            }

            let server_node = node.clone();
            let sync_node = node.clone();
            let server = tokio::spawn(async move {
                if let Err(e) = server_node.run_server().await {
                    error!("server stopped: {e}");
                }
            });
            let sync = tokio::spawn(async move {
                sync_node.run_sync_loop().await;
            });

            let _ = tokio::join!(server, sync);
        }
    }
}
