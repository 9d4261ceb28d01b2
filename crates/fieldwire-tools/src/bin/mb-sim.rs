use clap::Parser;
use fieldwire_client::{DataStore, ModbusSimulator};
use fieldwire_transport::TcpTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Parser, Debug)]
#[command(name = "mb-sim")]
struct Args {
    #[arg(long, default_value = "0.0.0.0:5020")]
    bind: SocketAddr,
    /// Number of coils and discrete inputs.
    #[arg(long, default_value_t = 1000)]
    bits: usize,
    /// Number of holding and input registers.
    #[arg(long, default_value_t = 1000)]
    registers: usize,
    /// Answer only this unit id.
    #[arg(long)]
    unit: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let store = Arc::new(RwLock::new(DataStore::with_sizes(args.bits, args.registers)));
    let listener = TcpListener::bind(args.bind).await?;
    println!(
        "Simulated Modbus device on {} ({} bits, {} registers). Ctrl+C to stop.",
        listener.local_addr()?,
        args.bits,
        args.registers
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        let transport = match TcpTransport::from_stream(stream) {
            Ok(transport) => transport,
            Err(e) => {
                log::warn!("rejecting {peer}: {e}");
                continue;
            }
        };
        let mut sim = ModbusSimulator::with_store(transport, store.clone());
        if let Some(unit) = args.unit {
            sim = sim.with_unit_id(unit);
        }
        log::info!("client {peer} connected");
        tokio::spawn(async move {
            if let Err(e) = sim.run().await {
                log::warn!("client {peer}: {e}");
            }
            log::info!("client {peer} disconnected");
        });
    }
}
