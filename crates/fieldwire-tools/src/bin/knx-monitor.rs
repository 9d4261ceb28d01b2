use clap::Parser;
use fieldwire_client::{tunnelled_frame, EngineState, KnxTunnelClient};
use fieldwire_core::knxnetip::{GroupAddress, IndividualAddress};
use fieldwire_transport::{CapturingTransport, TcpTransport, Transport};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "knx-monitor")]
struct Args {
    /// KNXnet/IP gateway reachable over TCP.
    #[arg(long)]
    gateway: IpAddr,
    #[arg(long, default_value_t = 3671)]
    port: u16,
    #[arg(long, default_value_t = 60)]
    heartbeat_seconds: u64,
    #[arg(long)]
    json: bool,
    /// Record all tunnel traffic to a PCAP file.
    #[arg(long)]
    capture: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let transport = TcpTransport::new(SocketAddr::new(args.gateway, args.port));
    match &args.capture {
        Some(path) => monitor(CapturingTransport::to_file(transport, path)?, &args).await,
        None => monitor(transport, &args).await,
    }
}

async fn monitor<T: Transport>(
    transport: T,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(KnxTunnelClient::with_transport(transport));
    let mut telegrams = client
        .telegrams()
        .ok_or("telegram channel already taken")?;
    let info = client.open().await?;
    let _heartbeat = client.start_heartbeat(Duration::from_secs(args.heartbeat_seconds.max(1)));
    println!("tunnel open on channel {}. Ctrl+C to stop.", info.channel_id);

    let mut states = client.engine().subscribe_state();
    loop {
        let state = *states.borrow_and_update();
        if state == EngineState::Closed {
            break;
        }
        tokio::select! {
            message = telegrams.recv() => {
                let Some(message) = message else { break };
                let Some(frame) = tunnelled_frame(&message) else {
                    log::debug!("ignoring {message:?}");
                    continue;
                };
                if args.json {
                    println!("{}", serde_json::to_string(&frame)?);
                } else if frame.is_group_destination() {
                    println!(
                        "{} -> {} {:?} {:02x?}",
                        IndividualAddress(frame.source),
                        GroupAddress(frame.destination),
                        frame.group_service(),
                        frame.group_data()
                    );
                } else {
                    println!(
                        "{} -> {} tpdu {:02x?}",
                        IndividualAddress(frame.source),
                        IndividualAddress(frame.destination),
                        frame.tpdu
                    );
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    eprintln!("gateway closed the connection");
    Ok(())
}
