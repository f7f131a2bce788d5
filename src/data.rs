use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::farcaster::{Cast, CastGroup, CastId};
use crate::history::Location;
use crate::hub::HubSource;
use crate::storage::Store;

pub const MAX_ASCENT: usize = 64;
pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const DEFAULT_FNAME_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub trait CastService: Send + Sync {
    fn fetch_list(&self, fid: u64, limit: usize) -> Result<CastGroup>;
    fn fetch_thread(&self, id: CastId) -> Result<CastGroup>;
    fn fetch_cast(&self, id: CastId) -> Result<CastGroup>;
    fn resolve_fname(&self, name: &str) -> Result<u64>;

    fn fetch(&self, location: Location, limit: usize) -> Result<CastGroup> {
        match location {
            Location::List { fid } => self.fetch_list(fid, limit),
            Location::Thread(id) => self.fetch_thread(id),
            Location::Cast(id) => self.fetch_cast(id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub max_depth: usize,
    pub fname_ttl: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            fname_ttl: DEFAULT_FNAME_TTL,
        }
    }
}

pub struct HubCastService {
    source: Arc<dyn HubSource>,
    store: Option<Store>,
    options: ServiceOptions,
}

impl HubCastService {
    pub fn new(source: Arc<dyn HubSource>, store: Option<Store>, options: ServiceOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    fn ascend(&self, id: CastId) -> Result<Cast> {
        let mut cast = self
            .source
            .cast_by_id(id)
            .with_context(|| format!("fetch cast {}", id.hash))?;
        let mut seen = HashSet::from([cast.id.hash]);
        for _ in 0..MAX_ASCENT {
            let Some(parent) = cast.parent_cast() else {
                break;
            };
            if !seen.insert(parent.hash) {
                tracing::warn!(hash = %parent.hash, "parent cycle while ascending");
                break;
            }
            match self.source.cast_by_id(parent) {
                Ok(next) => cast = next,
                Err(err) => {
                    tracing::warn!(hash = %parent.hash, error = %err, "parent unavailable, stopping ascent");
                    break;
                }
            }
        }
        Ok(cast)
    }

    // Breadth-first in hub order; a cast is linked under its first parent only.
    fn assemble(&self, root: Cast) -> CastGroup {
        let mut group = CastGroup::new();
        let root_id = root.id;
        group.head = Some(group.insert(root));

        let mut queue: VecDeque<(CastId, usize)> = VecDeque::from([(root_id, 0)]);
        while let Some((parent, depth)) = queue.pop_front() {
            if depth >= self.options.max_depth {
                continue;
            }
            let replies = match self.source.casts_by_parent(parent) {
                Ok(replies) => replies,
                Err(err) => {
                    tracing::warn!(hash = %parent.hash, error = %err, "replies unavailable");
                    continue;
                }
            };
            for reply in replies {
                let reply_id = reply.id;
                if group.get(&reply_id.hash).is_some() {
                    continue;
                }
                group.insert(reply);
                group.link_reply(parent.hash, reply_id.hash);
                queue.push_back((reply_id, depth + 1));
            }
        }

        group
    }

    fn fill_fnames(&self, group: &mut CastGroup) {
        for fid in group.referenced_fids() {
            if let Some(name) = self.fname(fid) {
                group.fnames.insert(fid, name);
            }
        }
    }

    fn fname(&self, fid: u64) -> Option<String> {
        if let Some(store) = &self.store {
            match store.fresh_fname(fid, self.options.fname_ttl) {
                Ok(Some(name)) => return Some(name),
                Ok(None) => tracing::debug!(fid, "fname cache miss"),
                Err(err) => tracing::warn!(fid, error = %err, "fname cache read failed"),
            }
        }

        match self.source.username(fid) {
            Ok(Some(name)) => {
                if let Some(store) = &self.store {
                    if let Err(err) = store.put_fname(fid, &name) {
                        tracing::warn!(fid, error = %err, "fname cache write failed");
                    }
                }
                Some(name)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(fid, error = %err, "fname lookup failed");
                self.store
                    .as_ref()
                    .and_then(|store| store.get_fname(fid).ok().flatten())
                    .map(|entry| entry.fname)
            }
        }
    }
}

impl CastService for HubCastService {
    fn fetch_list(&self, fid: u64, limit: usize) -> Result<CastGroup> {
        let casts = self
            .source
            .casts_by_fid(fid, limit)
            .with_context(|| format!("fetch casts of fid {fid}"))?;
        let mut group = CastGroup::new();
        for cast in casts {
            let hash = group.insert(cast);
            if !group.ordered.contains(&hash) {
                group.ordered.push(hash);
            }
        }
        self.fill_fnames(&mut group);
        Ok(group)
    }

    fn fetch_thread(&self, id: CastId) -> Result<CastGroup> {
        let root = self.ascend(id)?;
        let mut group = self.assemble(root);
        self.fill_fnames(&mut group);
        Ok(group)
    }

    fn fetch_cast(&self, id: CastId) -> Result<CastGroup> {
        let cast = self
            .source
            .cast_by_id(id)
            .with_context(|| format!("fetch cast {}", id.hash))?;
        let mut group = self.assemble(cast);
        self.fill_fnames(&mut group);
        Ok(group)
    }

    fn resolve_fname(&self, name: &str) -> Result<u64> {
        let name = name.trim().trim_start_matches('@');
        if name.is_empty() {
            bail!("empty fname");
        }
        if let Some(store) = &self.store {
            match store.fid_for_fname(name) {
                Ok(Some(fid)) => return Ok(fid),
                Ok(None) => {}
                Err(err) => tracing::warn!(name, error = %err, "fname cache read failed"),
            }
        }
        let fid = self
            .source
            .fid_by_name(name)
            .with_context(|| format!("resolve @{name}"))?;
        if let Some(store) = &self.store {
            if let Err(err) = store.put_fname(fid, name) {
                tracing::warn!(fid, error = %err, "fname cache write failed");
            }
        }
        Ok(fid)
    }
}
