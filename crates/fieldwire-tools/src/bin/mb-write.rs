use clap::{ArgAction, Parser, Subcommand};
use fieldwire_client::ModbusClient;
use fieldwire_core::types::TypedValue;
use fieldwire_tools::{scalar_from_f64, DataTypeArg};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mb-write")]
struct Args {
    #[arg(long)]
    host: IpAddr,
    #[arg(long, default_value_t = 502)]
    port: u16,
    #[arg(long, default_value_t = 1)]
    unit: u8,
    #[arg(long)]
    address: u16,
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one holding register.
    Register { value: u16 },
    /// Write one coil.
    Coil {
        #[arg(action = ArgAction::Set)]
        on: bool,
    },
    /// Encode a number as the given type and write it across registers.
    Typed {
        #[arg(value_enum)]
        data_type: DataTypeArg,
        value: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let client = ModbusClient::connect(SocketAddr::new(args.host, args.port))
        .await?
        .with_unit_id(args.unit)
        .with_response_timeout(Duration::from_millis(args.timeout_ms));

    let result = match args.command {
        Command::Register { value } => client.write_single_register(args.address, value).await,
        Command::Coil { on } => client.write_single_coil(args.address, on).await,
        Command::Typed { data_type, value } => {
            let ty = data_type.into_primitive_type();
            let scalar = scalar_from_f64(ty, value)?;
            client
                .write_typed(args.address, &TypedValue::Scalar(scalar), ty, 1)
                .await
        }
    };
    client.close().await?;

    if let Err(e) = result {
        eprintln!("write failed: {e}");
        std::process::exit(1);
    }
    println!("ok");
    Ok(())
}
