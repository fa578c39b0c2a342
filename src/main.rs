use log::{error, info};

use std::sync::atomic::AtomicBool;

use simple_blockchain::{Node, NodeConfig};

fn main() {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::from_env();
    info!("using data directory {}", config.store_dir().display());

    let node = match Node::open(config) {
        Ok(node) => node,
        Err(err) => {
            error!("failed to start node: {}", err);
            std::process::exit(1);
        }
    };

    info!(
        "chain loaded at height {}, head {}",
        node.height(),
        node.newest_hash()
    );

    let key = match node.default_key() {
        Ok(key) => key,
        Err(err) => {
            error!("failed to prepare wallet: {}", err);
            std::process::exit(1);
        }
    };

    let miner_address = match node.key_address(key) {
        Ok(address) => address,
        Err(err) => {
            error!("failed to read miner key: {}", err);
            std::process::exit(1);
        }
    };
    info!("mining to wallet key {} ({})", key, miner_address);

    let cancel = AtomicBool::new(false);
    loop {
        match node.mine_block(key, &cancel) {
            Ok(Some(hash)) => {
                info!(
                    "mined block {} at height {}, miner balance {}",
                    hash,
                    node.height(),
                    node.balance(&miner_address)
                );
            }
            Ok(None) => break,
            Err(err) => {
                error!("mining failed: {}", err);
                std::process::exit(1);
            }
        }
    }
}
