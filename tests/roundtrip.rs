//! Serializing a parsed rule and parsing it again gives the same rule.

use hbactl::{parse_line, Rule};
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,10}"
}

fn method() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["trust", "reject", "md5", "scram-sha-256", "peer", "ident", "cert"]),
        prop::collection::vec("[a-z_]{1,6}=[a-z0-9_-]{1,8}", 0..3),
    )
        .prop_map(|(m, opts)| {
            std::iter::once(m.to_string())
                .chain(opts)
                .collect::<Vec<_>>()
                .join(" ")
        })
}

fn cidr() -> impl Strategy<Value = String> {
    prop_oneof![
        (any::<[u8; 4]>(), 0u8..=32).prop_map(|(o, bits)| format!(
            "{}.{}.{}.{}/{}",
            o[0], o[1], o[2], o[3], bits
        )),
        (any::<u16>(), 0u8..=128).prop_map(|(seg, bits)| format!("fd00:{seg:x}::/{bits}")),
        Just("samehost".to_string()),
        Just("samenet".to_string()),
    ]
}

fn host_kind() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["host", "hostssl", "hostnossl", "hostgssenc", "hostnogssenc"])
}

fn assert_round_trip(rule: &Rule) -> Result<(), TestCaseError> {
    let line = rule.line().map_err(|e| TestCaseError::fail(e.to_string()))?;
    let reparsed = parse_line(&line);
    prop_assert_eq!(reparsed.as_ref(), Some(rule), "line: {:?}", line);
    Ok(())
}

proptest! {
    #[test]
    fn local_rules_round_trip(db in name(), user in name(), method in method()) {
        let rule = Rule {
            kind: "local".into(),
            database: db,
            user,
            address: "-".into(),
            netmask: String::new(),
            method,
        };
        assert_round_trip(&rule)?;
    }

    #[test]
    fn cidr_rules_round_trip(
        kind in host_kind(),
        db in name(),
        user in name(),
        address in cidr(),
        method in method(),
    ) {
        let rule = Rule {
            kind: kind.into(),
            database: db,
            user,
            address,
            netmask: String::new(),
            method,
        };
        assert_round_trip(&rule)?;
    }

    #[test]
    fn netmask_rules_round_trip(
        kind in host_kind(),
        db in name(),
        user in name(),
        ip in any::<[u8; 4]>(),
        mask_bits in 0u32..=32,
        method in method(),
    ) {
        let mask = u32::MAX.checked_shl(32 - mask_bits).unwrap_or(0);
        let rule = Rule {
            kind: kind.into(),
            database: db,
            user,
            address: format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]),
            netmask: std::net::Ipv4Addr::from(mask).to_string(),
            method,
        };
        assert_round_trip(&rule)?;
    }

    #[test]
    fn quoted_names_round_trip(db in "[a-z]{1,5} [a-z]{1,5}", user in "[a-z]{1,5}#[a-z]{1,3}") {
        let rule = Rule {
            kind: "host".into(),
            database: db,
            user,
            address: "10.0.0.0/8".into(),
            netmask: String::new(),
            method: "md5".into(),
        };
        assert_round_trip(&rule)?;
    }
}
