use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dns_types::protocol::types::{DomainName, Message, Question, QueryType, RecordType, ResourceRecord};

/// All public `Cache` operations run under this single lock; a worker that
/// finds it poisoned has no safe way to keep serving answers, so it aborts
/// rather than risk returning wrong data from a half-updated cache.
const MUTEX_POISON_MESSAGE: &str = "cache mutex poisoned";

/// A `RR` plus the instant it was inserted. The remaining TTL at any later
/// instant is computed functionally from this, never by mutating `ttl` in
/// place — see the Design Notes on the source's in-place-decrement bug.
#[derive(Debug, Clone)]
struct CacheEntry {
    rr: ResourceRecord,
    inserted_at: Instant,
}

impl CacheEntry {
    fn new(rr: ResourceRecord) -> Self {
        CacheEntry {
            rr,
            inserted_at: Instant::now(),
        }
    }

    /// `None` once the RR's TTL has elapsed.
    fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.inserted_at);
        let ttl = Duration::from_secs(u64::from(self.rr.ttl));
        ttl.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    fn is_live(&self, now: Instant) -> bool {
        self.remaining_ttl(now).is_some()
    }
}

// Entries are compared and hashed by their RR (which itself ignores TTL),
// so that inserting an already-present record replaces it in a `HashSet`
// (via `HashSet::replace`) and refreshes `inserted_at` instead of
// duplicating the entry.
impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.rr == other.rr
    }
}

impl Eq for CacheEntry {}

impl std::hash::Hash for CacheEntry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rr.hash(state);
    }
}

/// Per-domain bucket: entries grouped by record type, plus the
/// authority/additional side-sets that accompanied the most recent answer
/// for this owner name.
#[derive(Debug, Default)]
struct CacheDomain {
    buckets: HashMap<RecordType, HashSet<CacheEntry>>,
    authority: HashSet<CacheEntry>,
    additional: HashSet<CacheEntry>,
}

impl CacheDomain {
    /// Drop every entry (in every bucket, and the side-sets) whose TTL has
    /// elapsed. Confined to one domain so a lookup never pays for a global
    /// scan.
    fn sweep(&mut self, now: Instant) {
        for bucket in self.buckets.values_mut() {
            bucket.retain(|entry| entry.is_live(now));
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        self.authority.retain(|entry| entry.is_live(now));
        self.additional.retain(|entry| entry.is_live(now));
    }
}

/// The result of a lookup: the RRs that answer the question, plus the
/// authority and additional side-sets gathered along the way. A `miss` is
/// three empty lists.
#[derive(Debug, Default, Clone)]
pub struct LookupResult {
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl LookupResult {
    pub fn is_miss(&self) -> bool {
        self.answers.is_empty()
    }
}

/// TTL-aware cache keyed by (domain, type), with CNAME chasing and
/// aggregate (`ANY`) lookups. See spec §4.4.
#[derive(Debug, Default)]
pub struct Cache {
    domains: HashMap<DomainName, CacheDomain>,
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    /// Index every RR from a forwarder response under its owner/type
    /// bucket, and attach the response's authority/additional sections as
    /// the side-sets for each question's owner name.
    pub fn insert(&mut self, message: &Message) {
        for rr in message
            .answers
            .iter()
            .chain(message.authority.iter())
            .chain(message.additional.iter())
        {
            self.insert_rr(rr.clone());
        }

        for question in &message.questions {
            let domain = self.domains.entry(question.name.clone()).or_default();
            for rr in &message.authority {
                domain.authority.replace(CacheEntry::new(rr.clone()));
            }
            for rr in &message.additional {
                domain.additional.replace(CacheEntry::new(rr.clone()));
            }
        }
    }

    fn insert_rr(&mut self, rr: ResourceRecord) {
        let rtype = rr.rtype_with_data.rtype();
        let domain = self.domains.entry(rr.name.clone()).or_default();
        domain.buckets.entry(rtype).or_default().replace(CacheEntry::new(rr));
    }

    /// Look up a question, sweeping the domain's buckets for expired
    /// entries first. Returns a miss (three empty lists) if nothing live
    /// answers the question.
    pub fn lookup(&mut self, question: &Question) -> LookupResult {
        let now = Instant::now();
        match question.qtype {
            QueryType::Any => self.lookup_any(&question.name, now),
            QueryType::Record(rtype) => {
                let mut visited = HashSet::new();
                self.lookup_chasing(&question.name, rtype, now, &mut visited)
            }
            QueryType::Axfr => LookupResult::default(),
        }
    }

    /// `ANY` returns the union of every type bucket for the domain as
    /// answers, with empty authority/additional (spec §4.4).
    fn lookup_any(&mut self, name: &DomainName, now: Instant) -> LookupResult {
        let Some(domain) = self.domains.get_mut(name) else {
            return LookupResult::default();
        };
        domain.sweep(now);

        let answers = domain
            .buckets
            .values()
            .flat_map(|bucket| bucket.iter().map(|entry| entry.rr.clone()))
            .collect();

        LookupResult {
            answers,
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Collect records of `rtype` at `name`, then follow any cached CNAME
    /// at `name` and recurse, bounded by `visited` so a cache poisoned
    /// with a CNAME loop can't hang a lookup.
    fn lookup_chasing(
        &mut self,
        name: &DomainName,
        rtype: RecordType,
        now: Instant,
        visited: &mut HashSet<DomainName>,
    ) -> LookupResult {
        if !visited.insert(name.clone()) {
            return LookupResult::default();
        }

        let Some(domain) = self.domains.get_mut(name) else {
            return LookupResult::default();
        };
        domain.sweep(now);

        let mut result = LookupResult {
            answers: domain
                .buckets
                .get(&rtype)
                .map(|bucket| bucket.iter().map(|entry| entry.rr.clone()).collect())
                .unwrap_or_default(),
            authority: domain.authority.iter().map(|entry| entry.rr.clone()).collect(),
            additional: domain.additional.iter().map(|entry| entry.rr.clone()).collect(),
        };

        // A direct query for CNAME records is already satisfied by the
        // bucket match above; chasing only applies when looking for some
        // other type aliased through a CNAME, otherwise the CNAME records
        // would be collected twice.
        if rtype != RecordType::CNAME {
            let cnames: Vec<ResourceRecord> = domain
                .buckets
                .get(&RecordType::CNAME)
                .map(|bucket| bucket.iter().map(|entry| entry.rr.clone()).collect())
                .unwrap_or_default();

            for cname_rr in cnames {
                let target = match &cname_rr.rtype_with_data {
                    dns_types::protocol::types::RecordTypeWithData::CNAME { cname } => cname.clone(),
                    _ => continue,
                };
                result.answers.push(cname_rr);
                let chased = self.lookup_chasing(&target, rtype, now, visited);
                result.answers.extend(chased.answers);
                result.authority.extend(chased.authority);
                result.additional.extend(chased.additional);
            }
        }

        result
    }
}

/// A `Cache` behind a mutex, shared between all workers. Cloning shares the
/// same underlying cache (it's an `Arc`).
#[derive(Debug, Clone)]
pub struct SharedCache(Arc<Mutex<Cache>>);

impl SharedCache {
    pub fn new() -> Self {
        SharedCache(Arc::new(Mutex::new(Cache::new())))
    }

    pub fn lock(&self) -> MutexGuard<'_, Cache> {
        self.0.lock().expect(MUTEX_POISON_MESSAGE)
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        SharedCache::new()
    }
}
