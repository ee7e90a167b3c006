use clap::Parser;
use client::{Client, ClientConfig};
use log::{error, info};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address as host[:port]
    #[arg(default_value = "localhost:30000")]
    server: String,

    /// Name of the character to log in as
    #[arg(default_value = "user")]
    username: String,

    /// Password, for servers that require one
    #[arg(default_value = "")]
    password: String,

    /// Log every wire field as JSON (needs RUST_LOG=trace)
    #[arg(long)]
    trace: bool,

    /// Give up if the server has not let us in after this many seconds
    #[arg(short = 't', long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to {} as {}", args.server, args.username);

    let config = ClientConfig::new(args.server, args.username)
        .with_password(args.password)
        .with_trace(args.trace)
        .with_handshake_timeout(args.timeout.map(Duration::from_secs))
        .with_on_message(|message| println!("{}", message));

    let client = Client::connect(config).await?;
    let player = client.player();
    info!(
        "Joined as peer {} at ({:.1}, {:.1}, {:.1})",
        client.peer_id(),
        player.position.x,
        player.position.y,
        player.position.z
    );
    info!("Type a line to chat, Ctrl-D or Ctrl-C to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Err(e) = client.say(line).await {
                        error!("Failed to send chat message: {}", e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await?;
    info!("Final state: {}", serde_json::to_string(&client.player())?);

    Ok(())
}
