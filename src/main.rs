//! rokuctl - drive a Roku device from the command line.
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;

use rokuctl_client::{DeviceConfig, RokuClient};
use rokuctl_core::{Key, LogPort};

/// Default config file, looked up in the working directory.
const DEFAULT_CONFIG: &str = "rokuctl.toml";

/// Drive a Roku device: keypresses, launches, sideloads, queries, live logs
#[derive(Parser, Debug)]
#[command(name = "rokuctl")]
#[command(about = "Drive a Roku device from the command line", long_about = None)]
struct Args {
    /// Device hostname or IP (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Path to a rokuctl.toml config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Developer-mode password, needed for install
    #[arg(long)]
    dev_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Press one or more keys, in order (names like Home/Select, or single characters)
    Press { keys: Vec<String> },

    /// Type a string as literal key presses
    Type { text: String },

    /// Launch a channel by app id, installed name, or media URL
    Launch { target: String },

    /// Sideload a channel archive through the developer installer
    Install { archive: PathBuf },

    /// List installed channels
    Apps {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Query device information
    Info {
        /// Emit JSON instead of key = value lines
        #[arg(long)]
        json: bool,
    },

    /// Save a channel's icon to a file
    Icon {
        app_id: u32,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Tail live debug log lines until Ctrl-C
    Logs {
        /// Subsystem name (main, sg, task1..task4x, profiler) or a port number
        #[arg(long, default_value = "main")]
        port: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    rokuctl_core::logging::init()?;

    let args = Args::parse();
    let mut config = resolve_config(&args)?;

    // `logs` attaches explicitly below; don't let the config auto-connect too.
    if matches!(args.command, Command::Logs { .. }) {
        config.log_port = None;
    }

    let client = RokuClient::from_config(&config)?;

    match args.command {
        Command::Press { keys } => {
            let mut handles = Vec::new();
            for name in &keys {
                let key: Key = name.parse()?;
                handles.push(client.press(key));
            }
            for handle in handles {
                handle.await?;
            }
        }
        Command::Type { text } => {
            for handle in client.type_text(&text) {
                handle.await?;
            }
        }
        Command::Launch { target } => {
            client.launch(target.as_str()).await?;
        }
        Command::Install { archive } => {
            client.install(&archive).await?;
            println!("Installed {}", archive.display());
        }
        Command::Apps { json } => {
            let apps = client.apps().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else {
                for app in &apps {
                    println!("{:>8}  {:<12}  {}", app.id, app.version, app.name);
                }
            }
        }
        Command::Info { json } => {
            let info = client.device_info().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                for (tag, value) in &info {
                    println!("{} = {}", tag, value);
                }
            }
        }
        Command::Icon { app_id, output } => {
            let response = client.icon(app_id).await?;
            let mut stream = response.bytes_stream();
            let mut file = tokio::fs::File::create(&output).await?;
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            println!("Saved icon for app {} to {}", app_id, output.display());
        }
        Command::Logs { port } => {
            let port: LogPort = port.parse()?;
            let mut lines = client.subscribe_logs();
            client.connect_log(port).await?;
            eprintln!("Attached to {} on {} (Ctrl-C to stop)", port, client.host());

            loop {
                tokio::select! {
                    line = lines.recv() => match line {
                        Ok(line) => println!("{}", line),
                        // Missed lines under burst; keep tailing.
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!("log tail lagged, dropped {} lines", missed);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        client.destroy_log();
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Merge the config file and command-line overrides into one device config.
fn resolve_config(args: &Args) -> color_eyre::Result<DeviceConfig> {
    let mut config = if let Some(path) = &args.config {
        DeviceConfig::load(path)?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        DeviceConfig::load(Path::new(DEFAULT_CONFIG))?
    } else {
        let host = args.host.clone().ok_or_else(|| {
            eyre!(
                "no device host: pass --host or create {} in the working directory",
                DEFAULT_CONFIG
            )
        })?;
        DeviceConfig::new(host)
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(password) = &args.dev_password {
        config.dev_password = Some(password.clone());
    }
    Ok(config)
}
