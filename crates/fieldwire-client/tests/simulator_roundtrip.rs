use fieldwire_client::{ClientError, DataStore, EngineConfig, ModbusClient, ModbusSimulator};
use fieldwire_core::modbus::{ExceptionCode, ModbusPdu};
use fieldwire_core::types::{PrimitiveType, Scalar, TypedValue};
use fieldwire_transport::{CapturingTransport, MemoryTransport};
use std::sync::Arc;
use std::time::Duration;

async fn connected() -> (ModbusClient<MemoryTransport>, Arc<ModbusSimulator<MemoryTransport>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (client_side, server_side) = MemoryTransport::pair();
    let simulator = Arc::new(ModbusSimulator::new(server_side, DataStore::with_sizes(64, 64)));
    {
        let simulator = simulator.clone();
        tokio::spawn(async move { simulator.run().await });
    }
    let client = ModbusClient::with_engine_config(
        client_side,
        EngineConfig::default().with_poll_interval(Duration::from_millis(5)),
    )
    .with_response_timeout(Duration::from_secs(1));
    client.open().await.unwrap();
    (client, simulator)
}

#[tokio::test]
async fn register_reads_and_writes() {
    let (client, simulator) = connected().await;
    client.write_single_register(10, 500).await.unwrap();
    client.write_multiple_registers(11, &[1, 2, 3]).await.unwrap();
    assert_eq!(
        client.read_holding_registers(10, 4).await.unwrap(),
        vec![500, 1, 2, 3]
    );
    assert_eq!(
        simulator.store().read().await.holding_registers[10..14],
        [500, 1, 2, 3]
    );

    client.mask_write_register(10, 0xFF00, 0x0001).await.unwrap();
    let read = client
        .read_write_multiple_registers(10, 2, 20, &[7, 8])
        .await
        .unwrap();
    assert_eq!(read, vec![0x0101, 1]);
    assert_eq!(client.read_holding_registers(20, 2).await.unwrap(), vec![7, 8]);
}

#[tokio::test]
async fn coils_round_trip() {
    let (client, _simulator) = connected().await;
    client.write_single_coil(0, true).await.unwrap();
    client
        .write_multiple_coils(3, &[true, true, false, true])
        .await
        .unwrap();
    assert_eq!(
        client.read_coils(0, 8).await.unwrap(),
        vec![true, false, false, true, true, false, true, false]
    );
    assert_eq!(client.read_discrete_inputs(0, 3).await.unwrap(), vec![false; 3]);
}

#[tokio::test]
async fn typed_values_span_registers() {
    let (client, _simulator) = connected().await;
    let value = TypedValue::List(vec![Scalar::Float32(21.5), Scalar::Float32(-1.0)]);
    client
        .write_typed(30, &value, PrimitiveType::Float32, 2)
        .await
        .unwrap();
    assert_eq!(
        client.read_holding_registers(30, 2).await.unwrap(),
        vec![0x41AC, 0x0000]
    );
    assert_eq!(
        client
            .read_holding_typed(30, PrimitiveType::Float32, 2)
            .await
            .unwrap(),
        value
    );
    assert_eq!(
        client.read_input_typed(0, PrimitiveType::UInt32, 1).await.unwrap(),
        TypedValue::Scalar(Scalar::UInt32(0))
    );
}

#[tokio::test]
async fn device_exceptions_reach_the_caller() {
    let (client, _simulator) = connected().await;
    let err = client.read_holding_registers(60, 10).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::ProtocolException {
            function_code: 0x03,
            exception: ExceptionCode::IllegalDataAddress
        }
    ));

    let err = client.call(ModbusPdu::ReportServerIdRequest).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::ProtocolException {
            function_code: 0x11,
            exception: ExceptionCode::IllegalFunction
        }
    ));
    assert_eq!(client.read_exception_status().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_requests_share_one_connection() {
    let (client, _simulator) = connected().await;
    let client = Arc::new(client);
    for address in 0..8u16 {
        client.write_single_register(address, address * 100).await.unwrap();
    }
    let reads: Vec<_> = (0..8u16)
        .map(|address| {
            let client = client.clone();
            tokio::spawn(async move { (address, client.read_holding_registers(address, 1).await) })
        })
        .collect();
    for read in reads {
        let (address, result) = read.await.unwrap();
        assert_eq!(result.unwrap(), vec![address * 100]);
    }
}

#[tokio::test]
async fn closing_the_client_stops_the_simulator() {
    let (client_side, server_side) = MemoryTransport::pair();
    let simulator = ModbusSimulator::new(server_side, DataStore::with_sizes(8, 8));
    let server = tokio::spawn(async move { simulator.run().await });
    let client = ModbusClient::with_transport(client_side);
    client.open().await.unwrap();
    client.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn captured_exchange_is_written_as_pcap() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (client_side, server_side) = MemoryTransport::pair();
    let simulator = Arc::new(ModbusSimulator::new(server_side, DataStore::with_sizes(8, 8)));
    {
        let simulator = simulator.clone();
        tokio::spawn(async move { simulator.run().await });
    }
    let path = std::env::temp_dir().join(format!("fieldwire-client-{}.pcap", std::process::id()));
    let capturing = CapturingTransport::to_file(client_side, &path).unwrap();
    let client = ModbusClient::with_transport(capturing);
    client.open().await.unwrap();
    client.write_single_register(3, 42).await.unwrap();
    client.close().await.unwrap();
    drop(client);

    let written = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    // Global header, then a 12-byte request and its 12-byte echo.
    assert_eq!(written.len(), 24 + (16 + 12) * 2);
    assert_eq!(&written[24 + 16 + 7..24 + 16 + 12], &[0x06, 0x00, 0x03, 0x00, 0x2A]);
}
