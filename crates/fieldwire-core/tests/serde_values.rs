#![cfg(feature = "serde")]

use fieldwire_core::modbus::{ExceptionCode, ModbusPdu};
use fieldwire_core::types::{Scalar, TypedValue};

#[test]
fn typed_value_serializes_as_tagged_json() {
    let value = TypedValue::List(vec![Scalar::UInt16(10), Scalar::UInt16(20)]);
    let json = serde_json::to_string(&value).unwrap();
    assert_eq!(json, r#"{"List":[{"UInt16":10},{"UInt16":20}]}"#);
    let back: TypedValue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}

#[test]
fn pdu_serializes_through_json() {
    let pdu = ModbusPdu::Exception {
        function_code: 3,
        exception: ExceptionCode::IllegalDataAddress,
    };
    let json = serde_json::to_value(&pdu).unwrap();
    assert_eq!(json["Exception"]["function_code"], 3);
    let back: ModbusPdu = serde_json::from_value(json).unwrap();
    assert_eq!(back, pdu);
}
