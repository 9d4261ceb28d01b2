use clap::Parser;
use fieldwire_client::{ClientError, ModbusClient};
use fieldwire_tools::{DataTypeArg, TableArg};
use fieldwire_transport::{CapturingTransport, TcpTransport, Transport};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mb-read")]
struct Args {
    #[arg(long)]
    host: IpAddr,
    #[arg(long, default_value_t = 502)]
    port: u16,
    #[arg(long, default_value_t = 1)]
    unit: u8,
    #[arg(long, value_enum, default_value = "holding")]
    table: TableArg,
    #[arg(long)]
    address: u16,
    /// Registers or bits to read; element count when `--data-type` is set.
    #[arg(long, default_value_t = 1)]
    count: u16,
    /// Decode register contents as this type (holding and input only).
    #[arg(long, value_enum)]
    data_type: Option<DataTypeArg>,
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
    #[arg(long)]
    json: bool,
    /// Record the exchange to a PCAP file.
    #[arg(long)]
    capture: Option<PathBuf>,
}

async fn read<T: Transport>(
    client: &ModbusClient<T>,
    args: &Args,
) -> Result<Result<serde_json::Value, serde_json::Error>, ClientError> {
    let value = match (args.table, args.data_type) {
        (TableArg::Holding, Some(ty)) => client
            .read_holding_typed(args.address, ty.into_primitive_type(), args.count)
            .await
            .map(serde_json::to_value)?,
        (TableArg::Input, Some(ty)) => client
            .read_input_typed(args.address, ty.into_primitive_type(), args.count)
            .await
            .map(serde_json::to_value)?,
        (TableArg::Holding, None) => client
            .read_holding_registers(args.address, args.count)
            .await
            .map(serde_json::to_value)?,
        (TableArg::Input, None) => client
            .read_input_registers(args.address, args.count)
            .await
            .map(serde_json::to_value)?,
        (TableArg::Coils, _) => client
            .read_coils(args.address, args.count)
            .await
            .map(serde_json::to_value)?,
        (TableArg::DiscreteInputs, _) => client
            .read_discrete_inputs(args.address, args.count)
            .await
            .map(serde_json::to_value)?,
    };
    Ok(value)
}

async fn run<T: Transport>(transport: T, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = ModbusClient::with_transport(transport)
        .with_unit_id(args.unit)
        .with_response_timeout(Duration::from_millis(args.timeout_ms));
    client.open().await?;
    let result = read(&client, args).await;
    client.close().await?;

    match result {
        Ok(value) => {
            let value = value?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{:?} @ {}: {value}", args.table, args.address);
            }
        }
        Err(e) => {
            eprintln!("read failed: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let transport = TcpTransport::new(SocketAddr::new(args.host, args.port));
    match &args.capture {
        Some(path) => run(CapturingTransport::to_file(transport, path)?, &args).await,
        None => run(transport, &args).await,
    }
}
