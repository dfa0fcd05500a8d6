//! Payload and frame encoding as seen by a peer.

use bytes::{Buf, Bytes};
use pla_compose::error::ProtocolError;
use pla_compose::function::FunctionTable;
use pla_compose::module::{ChildLink, Module, ModuleRepository};
use pla_compose::shared::{decode_all, Address, Envelope, Payload, PayloadKind, Wire};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn scheduled_tree() -> ModuleRepository {
    let mut root = FunctionTable::new(3);
    root.push_parsed("1-0", '1').unwrap();
    root.push_parsed("011", '0').unwrap();
    let mut leaf = FunctionTable::new(2);
    leaf.push_parsed("10", '1').unwrap();

    let mut repo = ModuleRepository::new();
    repo.insert(Module::new("M1", root)).unwrap();
    repo.insert(Module::new("M2", leaf.clone())).unwrap();
    repo.insert(Module::new("M13", leaf)).unwrap();
    repo.attach_child("M1", "M2", 0).unwrap();
    repo.attach_child("M1", "M13", 2).unwrap();
    repo.get_mut("M1").unwrap().set_assigned_worker(4);
    repo
}

#[test]
fn module_keeps_tree_data_and_drops_scheduling_state() {
    let repo = scheduled_tree();
    let root = repo.get("M1").unwrap();
    assert_eq!(root.level(), 1);

    let decoded = decode_all::<Module>(root.to_bytes()).unwrap();

    assert_eq!(decoded.name(), "M1");
    assert_eq!(decoded.function(), root.function());
    assert_eq!(
        decoded.children(),
        &[ChildLink::new("M2", 0), ChildLink::new("M13", 2)]
    );
    assert_eq!(decoded.parent(), None);
    assert_eq!(decoded.assigned_worker(), 0);
    assert_eq!(decoded.level(), 0);
    assert_eq!(decoded.source(), None);
}

#[test]
fn child_module_forgets_its_parent() {
    let repo = scheduled_tree();
    let child = repo.get("M13").unwrap();
    assert_eq!(child.parent(), Some("M1"));

    let decoded = decode_all::<Module>(child.to_bytes()).unwrap();

    assert_eq!(decoded.parent(), None);
    assert!(decoded.children().is_empty());
}

#[test]
fn children_header_uses_longest_element() {
    let links = vec![ChildLink::new("M2", 0), ChildLink::new("M13", 2)];
    let mut bytes = links.to_bytes();

    assert_eq!(bytes.get_i32_le(), 2);
    // u32 name len + "M13" + i32 position
    assert_eq!(bytes.get_i32_le(), 4 + 3 + 4);
    assert_eq!(bytes.get_i32_le(), 2);
}

#[test]
fn envelope_frame_layout() {
    let envelope = Envelope::new(Address::Worker(3), Payload::Int(7).encode());
    let mut frame = envelope.encode();

    assert_eq!(frame.len(), 4 + 12 + 4);
    assert_eq!(frame.get_u32_le(), 16);
    assert_eq!(frame.get_i32_le(), 3);
    assert_eq!(frame.get_u64_le(), 4);
    assert_eq!(frame.get_i32_le(), 7);
}

#[test]
fn terminal_addresses() {
    let done = Envelope::new(Address::Done, Bytes::new());
    let result = Envelope::new(Address::Result, Bytes::new());

    assert_eq!(done.target, -1);
    assert_eq!(result.target, -2);
    assert!(done.address().unwrap().is_terminal());
    assert!(!Address::Worker(0).is_terminal());
    let stray = Envelope {
        target: -3,
        payload: Bytes::new(),
    };
    assert_eq!(stray.address(), Err(ProtocolError::InvalidTarget(-3)));
}

#[test]
fn payload_kind_mismatch_is_an_error() {
    let bytes = Payload::Text("MERG R A\n".to_string()).encode();

    // Text bytes do not form a module.
    assert!(Payload::decode(PayloadKind::Module, bytes).is_err());
}

#[test]
fn truncated_module_is_rejected() {
    let repo = scheduled_tree();
    let bytes = repo.get("M1").unwrap().to_bytes();
    let cut = bytes.slice(..bytes.len() - 3);

    let err = decode_all::<Module>(cut).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Truncated { .. } | ProtocolError::LengthMismatch { .. }
    ));
}

// ─── Properties ───────────────────────────────────────────────────────────

fn row_text(vars: usize) -> impl Strategy<Value = (String, bool)> {
    (
        prop::collection::vec(prop_oneof![Just('0'), Just('1'), Just('-')], vars)
            .prop_map(|chars| chars.into_iter().collect::<String>()),
        any::<bool>(),
    )
}

fn module_strategy() -> impl Strategy<Value = Module> {
    (
        "M[0-9]{1,3}",
        (0usize..6).prop_flat_map(|vars| (Just(vars), prop::collection::vec(row_text(vars), 0..6))),
        prop::collection::vec(("M[0-9]{1,3}", 0usize..6), 0..4),
    )
        .prop_map(|(name, (vars, rows), links)| {
            let mut function = FunctionTable::new(vars);
            for (inputs, output) in rows {
                function
                    .push_parsed(&inputs, if output { '1' } else { '0' })
                    .unwrap();
            }
            let children = links
                .into_iter()
                .map(|(name, position)| ChildLink::new(name, position))
                .collect();
            Module::from_parts(name, function, children)
        })
}

proptest! {
    #[test]
    fn module_round_trip(module in module_strategy()) {
        let decoded = decode_all::<Module>(module.to_bytes()).unwrap();
        prop_assert_eq!(decoded, module);
    }

    #[test]
    fn envelope_round_trip(target in -2i32..10, payload in prop::collection::vec(any::<u8>(), 0..64)) {
        let envelope = Envelope::new(Address::from_wire(target).unwrap(), Bytes::from(payload));
        let mut frame = envelope.encode();
        let len = frame.get_u32_le() as usize;
        prop_assert_eq!(len, frame.len());
        let decoded = Envelope::decode_body(frame).unwrap();
        prop_assert_eq!(decoded, envelope);
    }
}
