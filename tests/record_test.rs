//! Record integration tests

use std::sync::Arc;

use elohim_provenance::{
    Address, Ledger, LedgerConfig, LedgerEvent, ManualClock, Phase, RecordParams, TagId,
    TokenId, TransferCall,
};

const BUILDING_SECS: u64 = 60;

struct Fixture {
    ledger: Ledger,
    clock: ManualClock,
    tag_registry: Address,
    tag_ids: Vec<TagId>,
    parent: Address,
    record: Address,
    unlock_time: u64,
    owner: Address,
    other: Address,
}

fn fixture() -> Fixture {
    let clock = ManualClock::new(1_700_000_000);
    let mut ledger = Ledger::new(LedgerConfig::default(), Arc::new(clock.clone()));
    let owner = Address::from_label("owner");
    let other = Address::from_label("other");
    let unlock_time = ledger.now() + BUILDING_SECS;

    let tag_registry = ledger.deploy_tag_registry(&owner, "testseedphrase");
    let tag_ids = ledger
        .tag_multi(
            &owner,
            &tag_registry,
            &[
                "http://arweave.net/SIDgyBbwuErZgfnEFzfuNtP-3YvFdLmn8G_BePGCL9s".to_string(),
                "http://arweave.net/7lmMbH1XEiIstR_UVWGEfweDM2BrTIQAONupzqzRbA4".to_string(),
            ],
        )
        .unwrap();

    let parent = ledger
        .deploy_record(&owner, params("parentRecords", vec![], 0))
        .unwrap();
    let record = ledger
        .deploy_record(&owner, params("Records", vec![parent], unlock_time))
        .unwrap();

    Fixture {
        ledger,
        clock,
        tag_registry,
        tag_ids,
        parent,
        record,
        unlock_time,
        owner,
        other,
    }
}

fn params(name: &str, parents: Vec<Address>, immutable_from: u64) -> RecordParams {
    RecordParams {
        parent_records: parents,
        name: name.to_string(),
        symbol: "IMG".to_string(),
        immutable_from,
    }
}

fn traced(ledger: &Ledger, record: &Address) -> Vec<(TagId, Address)> {
    ledger
        .events()
        .by_emitter(record)
        .filter_map(|r| match &r.event {
            LedgerEvent::TagTraced { tag_id, tag_registry } => Some((*tag_id, *tag_registry)),
            _ => None,
        })
        .collect()
}

const BUILDING_ONLY: &str = "called function is only usable during building period.";
const IMMUTABLE_ONLY: &str = "called function is only available when contract is immutable.";

#[test]
fn test_deployment_accessors() {
    let f = fixture();
    let record = f.ledger.record(&f.record).unwrap();

    assert_eq!(record.immutable_from(), f.unlock_time);
    assert_eq!(record.record_chain_length(), 1);
    assert_eq!(record.record_parent_records(0).unwrap(), f.parent);
    assert_eq!(record.name(), "Records");
    assert_eq!(record.symbol(), "IMG");
    assert_eq!(record.owner(), f.owner);

    let parent = f.ledger.record(&f.parent).unwrap();
    assert_eq!(parent.record_chain_length(), 0);
    assert!(parent.record_parent_records(0).is_err());
}

#[test]
fn test_trace_one_tag_rejected_when_immutable() {
    let mut f = fixture();
    let err = f
        .ledger
        .trace_one_tag(&f.owner, &f.parent, &f.tag_registry, f.tag_ids[0])
        .unwrap_err();
    assert_eq!(err.to_string(), BUILDING_ONLY);
}

#[test]
fn test_trace_one_tag_during_building() {
    let mut f = fixture();
    f.ledger
        .trace_one_tag(&f.owner, &f.record, &f.tag_registry, f.tag_ids[0])
        .unwrap();

    assert_eq!(traced(&f.ledger, &f.record), vec![(f.tag_ids[0], f.tag_registry)]);
}

#[test]
fn test_trace_multi_tags_rejected_when_immutable() {
    let mut f = fixture();
    let err = f
        .ledger
        .trace_multi_tags(&f.owner, &f.parent, &f.tag_registry, &f.tag_ids)
        .unwrap_err();
    assert_eq!(err.to_string(), BUILDING_ONLY);
}

#[test]
fn test_trace_multi_tags_during_building() {
    let mut f = fixture();
    f.ledger
        .trace_multi_tags(&f.owner, &f.record, &f.tag_registry, &f.tag_ids)
        .unwrap();

    let expected: Vec<_> = f.tag_ids.iter().map(|id| (*id, f.tag_registry)).collect();
    assert_eq!(traced(&f.ledger, &f.record), expected);
    assert_eq!(f.ledger.record(&f.record).unwrap().traced_tags().len(), 2);
}

#[test]
fn test_building_window_closes_after_unlock_time() {
    let mut f = fixture();
    let record = f.record;

    f.clock.advance(BUILDING_SECS - 1);
    f.ledger
        .trace_one_tag(&f.owner, &record, &f.tag_registry, f.tag_ids[0])
        .unwrap();

    f.clock.advance(1);
    assert_eq!(f.ledger.record(&record).unwrap().phase(f.ledger.now()), Phase::Immutable);
    let err = f
        .ledger
        .trace_one_tag(&f.owner, &record, &f.tag_registry, f.tag_ids[1])
        .unwrap_err();
    assert_eq!(err.to_string(), BUILDING_ONLY);

    // Traces made while building survive the transition, nothing else is added
    assert_eq!(f.ledger.record(&record).unwrap().traced_tags().len(), 1);

    f.clock.advance(365 * 24 * 60 * 60);
    assert!(f.ledger.sign(&f.other, &record).unwrap());
}

#[test]
fn test_record_stays_immutable_when_clock_goes_back() {
    let mut f = fixture();
    let record = f.record;

    f.clock.set(f.unlock_time + 40);
    f.ledger.sign(&f.owner, &record).unwrap();

    f.clock.set(f.unlock_time - 50);
    let err = f
        .ledger
        .trace_one_tag(&f.owner, &record, &f.tag_registry, f.tag_ids[0])
        .unwrap_err();
    assert_eq!(err.to_string(), BUILDING_ONLY);
    assert!(f.ledger.has_signed(&record, &f.owner).unwrap());
    assert!(f.ledger.record(&record).unwrap().traced_tags().is_empty());
}

#[test]
fn test_sign_rejected_while_building() {
    let mut f = fixture();
    let err = f.ledger.sign(&f.owner, &f.record).unwrap_err();
    assert_eq!(err.to_string(), IMMUTABLE_ONLY);
}

#[test]
fn test_sign_emits_record_signed() {
    let mut f = fixture();
    f.ledger.sign(&f.owner, &f.parent).unwrap();

    let last = f.ledger.events().iter().last().unwrap();
    assert_eq!(last.emitter, f.parent);
    assert_eq!(last.event, LedgerEvent::RecordSigned { signer: f.owner });
}

#[test]
fn test_has_signed_rejected_while_building() {
    let f = fixture();
    let err = f.ledger.has_signed(&f.record, &f.owner).unwrap_err();
    assert_eq!(err.to_string(), IMMUTABLE_ONLY);
}

#[test]
fn test_has_signed_after_sign() {
    let mut f = fixture();
    assert!(!f.ledger.has_signed(&f.parent, &f.owner).unwrap());

    f.ledger.sign(&f.owner, &f.parent).unwrap();
    f.ledger.sign(&f.owner, &f.parent).unwrap();

    assert!(f.ledger.has_signed(&f.parent, &f.owner).unwrap());
    assert!(!f.ledger.has_signed(&f.parent, &f.other).unwrap());
    let parent = f.ledger.record(&f.parent).unwrap();
    assert_eq!(parent.signature_count(), 1);

    let signed_events = f
        .ledger
        .events()
        .by_emitter(&f.parent)
        .filter(|r| matches!(r.event, LedgerEvent::RecordSigned { .. }))
        .count();
    assert_eq!(signed_events, 2);
}

#[test]
fn test_transfer_surface_disabled_in_both_phases() {
    let f = fixture();
    let id = TokenId::ZERO;
    let calls = [
        TransferCall::Approve { to: f.other, token_id: id },
        TransferCall::GetApproved { token_id: id },
        TransferCall::SetApprovalForAll { operator: f.owner, approved: true },
        TransferCall::IsApprovedForAll { owner: f.owner, operator: f.other },
        TransferCall::TransferFrom { from: f.owner, to: f.other, token_id: id },
        TransferCall::SafeTransferFrom { from: f.owner, to: f.other, token_id: id },
        TransferCall::SafeTransferFromWithData {
            from: f.owner,
            to: f.other,
            token_id: id,
            data: vec![0x00],
        },
    ];

    for target in [f.record, f.parent] {
        for call in &calls {
            let err = f.ledger.transfer_call(&target, call).unwrap_err();
            assert_eq!(
                err.to_string(),
                "The invoked function of ERC721 is disable for Records.",
                "{:?}",
                call
            );
        }
    }
}
