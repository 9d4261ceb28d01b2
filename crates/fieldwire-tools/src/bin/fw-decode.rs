use clap::Parser;
use fieldwire_core::Direction;
use fieldwire_tools::{parse_hex, ProtocolArg};
use std::io::Read;

#[derive(Parser, Debug)]
#[command(name = "fw-decode")]
struct Args {
    #[arg(long, value_enum)]
    protocol: ProtocolArg,
    /// Decode as a response (Modbus only).
    #[arg(long)]
    response: bool,
    /// Frame bytes in hex; read from stdin when omitted.
    hex: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let text = if args.hex.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
    } else {
        args.hex.join(" ")
    };
    let bytes = parse_hex(&text)?;
    let direction = if args.response {
        Direction::Response
    } else {
        Direction::Request
    };

    match args.protocol.decode_to_json(&bytes, direction) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
