#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::codec::{decode, encode};
    use crate::v1::IdentifyV1;

    // Strategies for generating identify messages

    prop_compose! {
        fn any_identify()(
            public_key in proptest::option::of(any::<Vec<u8>>()),
            listen_addrs in proptest::collection::vec(any::<Vec<u8>>(), 0..4),
            protocols in proptest::collection::vec(any::<String>(), 0..4),
            observed_addr in proptest::option::of(any::<Vec<u8>>()),
            protocol_version in proptest::option::of(any::<String>()),
            agent_version in proptest::option::of(any::<String>())
        ) -> IdentifyV1 {
            IdentifyV1 {
                public_key,
                listen_addrs,
                protocols,
                observed_addr,
                protocol_version,
                agent_version,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_identify_round_trip(msg in any_identify()) {
            let decoded = decode(&encode(&msg)).unwrap();
            prop_assert_eq!(msg, decoded);
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&bytes);
        }
    }
}
