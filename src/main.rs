use aeon_light_wallet::config::WalletConfig;
use aeon_light_wallet::daemon::DaemonClient;
use aeon_light_wallet::rpc::WalletRpcService;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	// Logs go to stderr; stdout carries the JSON-RPC responses.
	let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
		"aeon_light_wallet=info"
			.parse()
			.unwrap_or_else(|_| tracing::Level::INFO.into()),
	);
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	let config = match WalletConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load wallet config: {}", e);
			return;
		}
	};

	let client = match DaemonClient::new(config.daemon_address.clone(), config.rpc_timeout()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create daemon client: {}", e);
			return;
		}
	};

	info!("Serving wallet RPC on stdin, daemon at {}", config.daemon_address);
	let service = WalletRpcService::new(config, Arc::new(client));

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				error!("Failed to read request: {}", e);
				break;
			}
		};
		if line.trim().is_empty() {
			continue;
		}

		let mut response = service.handle_line(&line).await;
		response.push('\n');
		if let Err(e) = stdout.write_all(response.as_bytes()).await {
			error!("Failed to write response: {}", e);
			break;
		}
		if let Err(e) = stdout.flush().await {
			error!("Failed to flush response: {}", e);
			break;
		}
	}

	info!("Input closed, shutting down");
}
