use proptest::prelude::*;

use synth_attestation::request::{transaction_id_bytes, type_of};
use synth_attestation::{
    AttestationHelperError, AttestationRequest, ConfirmedBlockHeightExistsRequest,
    PaymentRequest,
};
use synth_types::{Bytes32, SourceId};

fn source_id() -> impl Strategy<Value = SourceId> {
    prop_oneof![
        Just(SourceId::Btc),
        Just(SourceId::Ltc),
        Just(SourceId::Doge),
        Just(SourceId::Xrp),
        Just(SourceId::Algo),
    ]
}

fn request() -> impl Strategy<Value = AttestationRequest> {
    prop_oneof![
        (source_id(), prop::array::uniform32(0u8..), any::<u64>(), any::<u16>(), any::<u16>())
            .prop_map(|(source_id, tx, block_number, in_utxo, utxo)| {
                AttestationRequest::Payment(PaymentRequest {
                    source_id,
                    tx_id: Bytes32::new(tx),
                    block_number,
                    in_utxo,
                    utxo,
                    integrity_code: Bytes32::default(),
                })
            }),
        (source_id(), any::<u64>(), any::<u64>()).prop_map(
            |(source_id, block_number, query_window)| {
                AttestationRequest::ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest {
                    source_id,
                    block_number,
                    query_window,
                    integrity_code: Bytes32::default(),
                })
            }
        ),
    ]
}

proptest! {
    /// The type prefix of encoded data names the request's type.
    #[test]
    fn encoded_type_prefix_matches(request in request()) {
        prop_assert_eq!(type_of(&request.encode()).unwrap(), request.attestation_type());
    }

    /// Cutting encoded data short is a decode error, never a panic or a
    /// different request.
    #[test]
    fn truncated_request_is_rejected(request in request(), cut in 1usize..64) {
        let data = request.encode();
        let keep = data.len().saturating_sub(cut * 2).max(2);
        let result = AttestationRequest::decode(&data[..keep]);
        prop_assert!(matches!(result, Err(AttestationHelperError::Decode(_))));
    }

    /// Hex transaction ids map to the same bytes whatever their case.
    #[test]
    fn transaction_id_ignores_case(bytes in prop::array::uniform32(0u8..)) {
        let hex = Bytes32::new(bytes).to_hex();
        let lower = hex.trim_start_matches("0x").to_lowercase();
        let upper = lower.to_uppercase();
        prop_assert_eq!(transaction_id_bytes(&lower), transaction_id_bytes(&upper));
        prop_assert_eq!(transaction_id_bytes(&lower), Bytes32::new(bytes));
    }
}
