//! Ledger host - deploys entities and runs calls against them
//!
//! The host is the execution environment tag registries and records assume:
//!
//! - it assigns addresses on deployment and supplies the caller and the time
//!   of every call ([`CallContext`])
//! - it serializes calls; all mutation goes through `&mut Ledger`, so a
//!   multi-threaded embedder wraps the ledger in a mutex
//! - it makes each call atomic: entity operations validate before they
//!   mutate (registries mint into a batch first), and the events a call
//!   produced are committed to the log only if it succeeds
//! - it never lets time run backwards: the latest time any committed call
//!   saw is persisted, and a clock reading below it is raised to it, so a
//!   record that became immutable stays immutable

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{Address, TagId};
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::context::CallContext;
use crate::error::LedgerError;
use crate::events::{EventLog, LedgerEvent};
use crate::guard::TransferCall;
use crate::record::{ParentRef, Phase, Record};
use crate::tag_registry::TagRegistry;

/// Everything the ledger persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    /// Deployments performed so far; feeds address derivation
    pub deploy_nonce: u64,
    pub registries: BTreeMap<Address, TagRegistry>,
    pub records: BTreeMap<Address, Record>,
    pub events: EventLog,
    /// Latest time observed by a committed call (unix seconds)
    #[serde(default)]
    pub last_now: u64,
}

/// Construction parameters of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordParams {
    pub parent_records: Vec<Address>,
    pub name: String,
    pub symbol: String,
    /// Unix seconds; 0 makes the record immutable immediately
    pub immutable_from: u64,
}

/// A deployed entity, borrowed from the ledger
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum Entity<'a> {
    TagRegistry(&'a TagRegistry),
    Record(&'a Record),
}

pub struct Ledger {
    state: LedgerState,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(LedgerState::default(), config, clock)
    }

    pub fn from_state(state: LedgerState, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { state, config, clock }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn into_state(self) -> LedgerState {
        self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current ledger time: the clock, but never earlier than a committed call
    pub fn now(&self) -> u64 {
        let now = self.clock.now();
        if now < self.state.last_now {
            debug!(clock = now, last_now = self.state.last_now, "Clock behind ledger time");
        }
        now.max(self.state.last_now)
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    fn context(&self, caller: &Address) -> CallContext {
        CallContext::new(*caller, self.now())
    }

    fn observe(&mut self, now: u64) {
        self.state.last_now = self.state.last_now.max(now);
    }

    fn next_address(&mut self, deployer: &Address) -> Address {
        loop {
            let address = Address::for_deployment(deployer, self.state.deploy_nonce);
            self.state.deploy_nonce += 1;
            if !self.is_deployed(&address) {
                return address;
            }
        }
    }

    pub fn is_deployed(&self, address: &Address) -> bool {
        self.state.registries.contains_key(address) || self.state.records.contains_key(address)
    }

    /// Deploy a tag registry seeded with `seed`
    pub fn deploy_tag_registry(&mut self, deployer: &Address, seed: &str) -> Address {
        let address = self.next_address(deployer);
        let registry = TagRegistry::new(address, *deployer, seed, self.config.max_tag_attempts);
        self.state.registries.insert(address, registry);
        let now = self.now();
        self.observe(now);

        info!(registry = %address, deployer = %deployer, "Deployed tag registry");
        address
    }

    /// Deploy a record; every parent must be an existing record
    pub fn deploy_record(&mut self, deployer: &Address, params: RecordParams) -> Result<Address, LedgerError> {
        let parents = params
            .parent_records
            .iter()
            .map(|addr| {
                self.state
                    .records
                    .get(addr)
                    .map(|parent| ParentRef {
                        address: *addr,
                        chain_length: parent.record_chain_length(),
                    })
                    .ok_or_else(|| LedgerError::InvalidInput(format!("parent record {} does not exist", addr)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let address = self.next_address(deployer);
        let record = Record::new(
            address,
            *deployer,
            params.name,
            params.symbol,
            params.immutable_from,
            &parents,
        );

        info!(
            record = %address,
            deployer = %deployer,
            parents = parents.len(),
            chain_length = record.record_chain_length(),
            immutable_from = params.immutable_from,
            "Deployed record"
        );
        self.state.records.insert(address, record);
        let now = self.now();
        self.observe(now);
        Ok(address)
    }

    pub fn registry(&self, address: &Address) -> Result<&TagRegistry, LedgerError> {
        self.state
            .registries
            .get(address)
            .ok_or(LedgerError::UnknownRegistry(*address))
    }

    pub fn record(&self, address: &Address) -> Result<&Record, LedgerError> {
        self.state
            .records
            .get(address)
            .ok_or(LedgerError::UnknownRecord(*address))
    }

    pub fn entity(&self, address: &Address) -> Result<Entity<'_>, LedgerError> {
        if let Some(registry) = self.state.registries.get(address) {
            return Ok(Entity::TagRegistry(registry));
        }
        if let Some(record) = self.state.records.get(address) {
            return Ok(Entity::Record(record));
        }
        Err(LedgerError::UnknownAddress(*address))
    }

    fn call_registry<T>(
        &mut self,
        caller: &Address,
        address: &Address,
        op: impl FnOnce(&mut TagRegistry, &CallContext, &mut Vec<LedgerEvent>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let ctx = self.context(caller);
        let registry = self
            .state
            .registries
            .get_mut(address)
            .ok_or(LedgerError::UnknownRegistry(*address))?;
        let mut events = Vec::new();

        let out = op(registry, &ctx, &mut events)?;

        self.observe(ctx.now);
        self.state.events.commit(*address, ctx.now, events);
        Ok(out)
    }

    fn call_record<T>(
        &mut self,
        caller: &Address,
        address: &Address,
        op: impl FnOnce(&mut Record, &CallContext, &mut Vec<LedgerEvent>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let ctx = self.context(caller);
        let record = self
            .state
            .records
            .get_mut(address)
            .ok_or(LedgerError::UnknownRecord(*address))?;
        let mut events = Vec::new();

        let out = op(record, &ctx, &mut events)?;

        self.observe(ctx.now);
        self.state.events.commit(*address, ctx.now, events);
        Ok(out)
    }

    pub fn tag_one(&mut self, caller: &Address, registry: &Address, uri: &str) -> Result<TagId, LedgerError> {
        self.call_registry(caller, registry, |reg, ctx, events| reg.tag_one(ctx, uri, events))
    }

    pub fn tag_multi(
        &mut self,
        caller: &Address,
        registry: &Address,
        uris: &[String],
    ) -> Result<Vec<TagId>, LedgerError> {
        self.call_registry(caller, registry, |reg, ctx, events| reg.tag_multi(ctx, uris, events))
    }

    /// Under `verify_traced_tags`, every traced tag must exist in its registry.
    /// The record's phase gate is checked first so an immutable record always
    /// reports the phase violation.
    fn check_traceable(&self, record: &Address, registry: &Address, tag_ids: &[TagId]) -> Result<(), LedgerError> {
        if !self.config.verify_traced_tags {
            return Ok(());
        }
        self.record(record)?.require_phase(self.now(), Phase::Building)?;
        let reg = self.registry(registry)?;
        if let Some(missing) = tag_ids.iter().find(|id| !reg.contains(id)) {
            warn!(registry = %registry, tag_id = %missing, "Refusing to trace unknown tag");
            return Err(LedgerError::UntrackedTag {
                registry: *registry,
                tag_id: *missing,
            });
        }
        Ok(())
    }

    pub fn trace_one_tag(
        &mut self,
        caller: &Address,
        record: &Address,
        tag_registry: &Address,
        tag_id: TagId,
    ) -> Result<(), LedgerError> {
        self.check_traceable(record, tag_registry, &[tag_id])?;
        self.call_record(caller, record, |rec, ctx, events| {
            rec.trace_one_tag(ctx, *tag_registry, tag_id, events)
        })
    }

    pub fn trace_multi_tags(
        &mut self,
        caller: &Address,
        record: &Address,
        tag_registry: &Address,
        tag_ids: &[TagId],
    ) -> Result<(), LedgerError> {
        self.check_traceable(record, tag_registry, tag_ids)?;
        self.call_record(caller, record, |rec, ctx, events| {
            rec.trace_multi_tags(ctx, *tag_registry, tag_ids, events)
        })
    }

    /// Attest `record` as `caller`; returns whether the caller is a new signer
    pub fn sign(&mut self, caller: &Address, record: &Address) -> Result<bool, LedgerError> {
        self.call_record(caller, record, |rec, ctx, events| rec.sign(ctx, events))
    }

    pub fn has_signed(&self, record: &Address, signer: &Address) -> Result<bool, LedgerError> {
        self.record(record)?.has_signed(self.now(), signer)
    }

    /// Route a transfer-surface call to whatever is deployed at `target`
    pub fn transfer_call(&self, target: &Address, call: &TransferCall) -> Result<(), LedgerError> {
        match self.entity(target)? {
            Entity::TagRegistry(registry) => call.dispatch(registry),
            Entity::Record(record) => call.dispatch(record),
        }
    }

    /// Every record reachable through parent links, nearest first
    pub fn ancestors(&self, record: &Address) -> Result<Vec<Address>, LedgerError> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<Address> = self.record(record)?.parent_records().iter().copied().collect();

        while let Some(addr) = queue.pop_front() {
            if !seen.insert(addr) {
                continue;
            }
            order.push(addr);
            if let Ok(parent) = self.record(&addr) {
                queue.extend(parent.parent_records().iter().copied());
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: u64 = 1_700_000_000;

    fn ledger(config: LedgerConfig) -> (Ledger, ManualClock) {
        let clock = ManualClock::new(START);
        (Ledger::new(config, Arc::new(clock.clone())), clock)
    }

    fn params(parents: Vec<Address>, immutable_from: u64) -> RecordParams {
        RecordParams {
            parent_records: parents,
            name: "Records".to_string(),
            symbol: "IMG".to_string(),
            immutable_from,
        }
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let (mut ledger, _) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let reg = ledger.deploy_tag_registry(&owner, "s1");

        let uris = vec!["http://x/a".to_string(), String::new()];
        assert!(ledger.tag_multi(&owner, &reg, &uris).is_err());

        assert_eq!(ledger.registry(&reg).unwrap().nonce(), 0);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let (mut ledger, _) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let err = ledger
            .deploy_record(&owner, params(vec![Address::from_label("nowhere")], 0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(ledger.state().records.is_empty());
    }

    #[test]
    fn test_verify_traced_tags_policy() {
        let (mut ledger, _) = ledger(LedgerConfig {
            verify_traced_tags: true,
            ..LedgerConfig::default()
        });
        let owner = Address::from_label("owner");
        let reg = ledger.deploy_tag_registry(&owner, "s1");
        let tag = ledger.tag_one(&owner, &reg, "http://x/a").unwrap();
        let rec = ledger.deploy_record(&owner, params(vec![], START + 60)).unwrap();

        ledger.trace_one_tag(&owner, &rec, &reg, tag).unwrap();
        let err = ledger
            .trace_multi_tags(&owner, &rec, &reg, &[tag, TagId::from(9)])
            .unwrap_err();
        assert!(matches!(err, LedgerError::UntrackedTag { .. }));
        assert_eq!(ledger.record(&rec).unwrap().traced_tags().len(), 1);
    }

    #[test]
    fn test_verify_policy_reports_phase_on_immutable_record() {
        let (mut ledger, _) = ledger(LedgerConfig {
            verify_traced_tags: true,
            ..LedgerConfig::default()
        });
        let owner = Address::from_label("owner");
        let reg = ledger.deploy_tag_registry(&owner, "s1");
        let rec = ledger.deploy_record(&owner, params(vec![], 0)).unwrap();

        let err = ledger
            .trace_one_tag(&owner, &rec, &reg, TagId::from(9))
            .unwrap_err();
        assert_eq!(err.to_string(), "called function is only usable during building period.");

        let err = ledger
            .trace_multi_tags(&owner, &rec, &reg, &[TagId::from(9)])
            .unwrap_err();
        assert!(err.is_phase_violation());
    }

    #[test]
    fn test_clock_regression_does_not_reopen_record() {
        let (mut ledger, clock) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let reg = ledger.deploy_tag_registry(&owner, "s1");
        let rec = ledger.deploy_record(&owner, params(vec![], START + 60)).unwrap();

        clock.set(START + 100);
        ledger.sign(&owner, &rec).unwrap();

        clock.set(START + 10);
        assert_eq!(ledger.now(), START + 100);
        let err = ledger
            .trace_one_tag(&owner, &rec, &reg, TagId::from(1))
            .unwrap_err();
        assert_eq!(err.to_string(), "called function is only usable during building period.");
        assert!(ledger.has_signed(&rec, &owner).unwrap());

        let record = ledger.record(&rec).unwrap();
        assert!(record.traced_tags().is_empty());
        assert_eq!(record.signature_count(), 1);
    }

    #[test]
    fn test_failed_call_does_not_advance_ledger_time() {
        let (mut ledger, clock) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let rec = ledger.deploy_record(&owner, params(vec![], START + 60)).unwrap();

        clock.set(START + 30);
        assert!(ledger.sign(&owner, &rec).is_err());
        assert_eq!(ledger.state().last_now, START);
    }

    #[test]
    fn test_unverified_trace_trusts_caller() {
        let (mut ledger, _) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let rec = ledger.deploy_record(&owner, params(vec![], START + 60)).unwrap();
        let phantom = Address::from_label("not-a-registry");

        ledger.trace_one_tag(&owner, &rec, &phantom, TagId::from(1)).unwrap();
        assert_eq!(ledger.record(&rec).unwrap().traced_tags()[0].tag_registry, phantom);
    }

    #[test]
    fn test_ancestors_walks_graph() {
        let (mut ledger, _) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let a = ledger.deploy_record(&owner, params(vec![], 0)).unwrap();
        let b = ledger.deploy_record(&owner, params(vec![a], 0)).unwrap();
        let c = ledger.deploy_record(&owner, params(vec![a], 0)).unwrap();
        let d = ledger.deploy_record(&owner, params(vec![b, c], 0)).unwrap();

        assert_eq!(ledger.ancestors(&d).unwrap(), vec![b, c, a]);
        assert_eq!(ledger.record(&d).unwrap().record_chain_length(), 2);
        assert!(ledger.ancestors(&a).unwrap().is_empty());
    }

    #[test]
    fn test_transfer_call_routes_by_entity() {
        let (mut ledger, _) = ledger(LedgerConfig::default());
        let owner = Address::from_label("owner");
        let reg = ledger.deploy_tag_registry(&owner, "s1");
        let rec = ledger.deploy_record(&owner, params(vec![], 0)).unwrap();
        let call = TransferCall::GetApproved { token_id: TagId::ZERO };

        assert_eq!(
            ledger.transfer_call(&reg, &call).unwrap_err().to_string(),
            "The invoked function of ERC721 is disable for tagRepos."
        );
        assert_eq!(
            ledger.transfer_call(&rec, &call).unwrap_err().to_string(),
            "The invoked function of ERC721 is disable for Records."
        );
        assert!(matches!(
            ledger.transfer_call(&owner, &call),
            Err(LedgerError::UnknownAddress(_))
        ));
    }
}
