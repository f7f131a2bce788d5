use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config;
use crate::data::{CastService, HubCastService, ServiceOptions};
use crate::farcaster::CastId;
use crate::format::CastFormatter;
use crate::history::Location;
use crate::hub;
use crate::logging;
use crate::storage;
use crate::target::{Target, User};
use crate::ui;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: Target,
    pub count: Option<usize>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    if let Err(err) = logging::init_tracing() {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    tracing::info!(target_arg = %opts.target, hub = %cfg.hub.url, "starting");

    let store = match storage::Store::open(storage::Options {
        path: cfg.cache.path.clone(),
    }) {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "fname cache unavailable");
            None
        }
    };

    let client = hub::Client::new(hub::ClientConfig {
        base_url: cfg.hub.url.clone(),
        user_agent: cfg.hub.user_agent.clone(),
        timeout: cfg.hub.timeout,
        http_client: None,
    })
    .context("create hub client")?;

    let service: Arc<dyn CastService> = Arc::new(HubCastService::new(
        Arc::new(client),
        store.clone(),
        ServiceOptions {
            max_depth: cfg.explore.max_thread_depth,
            fname_ttl: cfg.cache.fname_ttl,
        },
    ));

    let start = resolve_location(service.as_ref(), &opts.target)
        .with_context(|| format!("resolve {}", opts.target))?;

    let mut model = ui::Model::new(ui::Options {
        start,
        service: service.clone(),
        renderer: Box::new(CastFormatter::new(cfg.ui.wrap_width)),
        history_size: cfg.explore.history_size,
        count: opts.count.unwrap_or(cfg.explore.count).max(1),
    });
    let result = model.run();

    drop(model);
    drop(service);
    if let Some(store) = store {
        if let Err(err) = store.close() {
            tracing::debug!(error = %err, "fname cache not closed cleanly");
        }
    }

    result
}

pub fn resolve_location(service: &dyn CastService, target: &Target) -> Result<Location> {
    let fid = match target.user() {
        User::Fid(fid) => *fid,
        User::Fname(name) => service.resolve_fname(name)?,
    };
    Ok(match target {
        Target::Casts(_) => Location::List { fid },
        Target::Cast(_, hash) => Location::Cast(CastId::new(fid, *hash)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farcaster::{CastGroup, Hash, HASH_LEN};
    use anyhow::bail;

    struct Names;

    impl CastService for Names {
        fn fetch_list(&self, _fid: u64, _limit: usize) -> Result<CastGroup> {
            bail!("offline")
        }

        fn fetch_thread(&self, _id: CastId) -> Result<CastGroup> {
            bail!("offline")
        }

        fn fetch_cast(&self, _id: CastId) -> Result<CastGroup> {
            bail!("offline")
        }

        fn resolve_fname(&self, name: &str) -> Result<u64> {
            match name {
                "v" => Ok(2),
                _ => bail!("unknown fname @{name}"),
            }
        }
    }

    #[test]
    fn targets_map_to_locations() {
        let list: Target = "@v/casts".parse().unwrap();
        assert_eq!(
            resolve_location(&Names, &list).unwrap(),
            Location::List { fid: 2 }
        );
        let by_fid: Target = "fid:9/casts".parse().unwrap();
        assert_eq!(
            resolve_location(&Names, &by_fid).unwrap(),
            Location::List { fid: 9 }
        );
        let hash = Hash::new([3; HASH_LEN]);
        let cast: Target = format!("@v/{hash}").parse().unwrap();
        assert_eq!(
            resolve_location(&Names, &cast).unwrap(),
            Location::Cast(CastId::new(2, hash))
        );
        let unknown: Target = "@nobody/casts".parse().unwrap();
        assert!(resolve_location(&Names, &unknown).is_err());
    }
}
