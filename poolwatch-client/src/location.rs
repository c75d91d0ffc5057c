//! Schedd location cache
//!
//! Decides, per (schedd, pool), whether a schedd must be addressed by name
//! or can be read through its spool directory on this host. The decision is
//! made once and remembered for the life of the cache; the raw advert behind
//! it goes to the persistent store under `"{schedd}.igetenv"`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::Path;

use poolwatch_core::dto::location::ScheddAdvert;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::overrides::ConfigOverrides;
use crate::store::PersistentStore;

/// Knob pointing the tools at a spool directory
pub const SPOOL_KNOB: &str = "SPOOL";

/// How a backend should address its target daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSelector {
    /// The tool's default daemon
    Default,
    /// A named daemon (`-name <name>`)
    ByName(String),
    /// The daemon on this host, read through overridden directories
    Local,
}

impl ResourceSelector {
    /// Arguments selecting this resource on the external tools' command line
    pub fn to_args(&self) -> Vec<String> {
        match self {
            ResourceSelector::ByName(name) => vec!["-name".to_string(), name.clone()],
            ResourceSelector::Default | ResourceSelector::Local => Vec::new(),
        }
    }

    /// Name of the selected daemon, if addressed by name
    pub fn name(&self) -> Option<&str> {
        match self {
            ResourceSelector::ByName(name) => Some(name),
            _ => None,
        }
    }
}

/// Resolved location of a schedd
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheddLocation {
    pub selector: ResourceSelector,
    pub overrides: ConfigOverrides,
}

impl ScheddLocation {
    fn by_name(schedd: &str) -> Self {
        Self {
            selector: ResourceSelector::ByName(schedd.to_string()),
            overrides: ConfigOverrides::new(),
        }
    }

    fn default_schedd() -> Self {
        Self {
            selector: ResourceSelector::Default,
            overrides: ConfigOverrides::new(),
        }
    }
}

/// Addresses this host answers on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAddresses(Vec<IpAddr>);

impl LocalAddresses {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self(addresses)
    }

    /// Resolve the host name and `localhost`
    pub fn discover() -> Self {
        let mut addresses = Vec::new();

        match hostname::get() {
            Ok(name) => {
                let name = name.to_string_lossy().into_owned();
                addresses.extend(resolve_host(&name));
            }
            Err(e) => warn!("Cannot determine host name: {}", e),
        }
        addresses.extend(resolve_host("localhost"));

        addresses.sort();
        addresses.dedup();
        debug!("Local addresses: {:?}", addresses);
        Self(addresses)
    }

    pub fn contains(&self, address: &IpAddr) -> bool {
        self.0.contains(address)
    }

    pub fn as_slice(&self) -> &[IpAddr] {
        &self.0
    }
}

fn resolve_host(host: &str) -> Vec<IpAddr> {
    match (host, 0u16).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            debug!("Cannot resolve {}: {}", host, e);
            Vec::new()
        }
    }
}

/// Host part of a sinful string such as `<10.0.0.1:9618?addrs=...>`
pub fn parse_sinful_host(sinful: &str) -> Option<IpAddr> {
    let inner = sinful.trim().strip_prefix('<')?;
    let inner = inner.split(['?', '>']).next()?;

    let host = if let Some(rest) = inner.strip_prefix('[') {
        rest.split(']').next()?
    } else {
        inner.split(':').next()?
    };
    host.parse().ok()
}

/// Look up adverts for a schedd in a pool (a status query in practice)
pub type AdvertLookup<'a> = dyn Fn(&str, Option<&str>) -> Result<Vec<ScheddAdvert>> + 'a;

/// Per (schedd, pool) memo of location decisions
#[derive(Debug)]
pub struct LocationCache {
    enabled: Cell<bool>,
    local: LocalAddresses,
    entries: RefCell<HashMap<(String, Option<String>), ScheddLocation>>,
}

impl LocationCache {
    pub fn new(local: LocalAddresses) -> Self {
        Self {
            enabled: Cell::new(true),
            local,
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn enable(&self) {
        self.enabled.set(true);
    }

    /// Always address schedds by name from now on
    pub fn disable(&self) {
        self.enabled.set(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Number of remembered decisions
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Resolve how to reach `schedd` in `pool`
    ///
    /// # Errors
    /// [`Error::NotFound`] if the schedd has no advert; lookup failures are
    /// passed through.
    pub fn resolve(
        &self,
        schedd: Option<&str>,
        pool: Option<&str>,
        store: &dyn PersistentStore,
        lookup: &AdvertLookup<'_>,
    ) -> Result<ScheddLocation> {
        let Some(schedd) = schedd else {
            return Ok(ScheddLocation::default_schedd());
        };

        if !self.is_enabled() {
            return Ok(ScheddLocation::by_name(schedd));
        }

        let key = (schedd.to_string(), pool.map(str::to_string));
        if let Some(location) = self.entries.borrow().get(&key) {
            debug!("Location cache hit for {}", schedd);
            return Ok(location.clone());
        }

        debug!("Location cache miss for {}", schedd);
        let location = match self.spool_override(schedd, pool, store, lookup)? {
            Some(overrides) => ScheddLocation {
                selector: ResourceSelector::Local,
                overrides,
            },
            None => ScheddLocation::by_name(schedd),
        };

        self.entries.borrow_mut().insert(key, location.clone());
        Ok(location)
    }

    fn spool_override(
        &self,
        schedd: &str,
        pool: Option<&str>,
        store: &dyn PersistentStore,
        lookup: &AdvertLookup<'_>,
    ) -> Result<Option<ConfigOverrides>> {
        let adverts = load_adverts(schedd, pool, store, lookup)?;
        let advert = adverts
            .iter()
            .find(|a| a.name == schedd)
            .ok_or_else(|| Error::NotFound(format!("Schedd '{}' not found", schedd)))?;

        if advert.spool_dir.is_none() && advert.local_dir.is_none() {
            debug!("Schedd {} advertises no directory", schedd);
            return Ok(None);
        }

        let Some(address) = advert.address.as_deref() else {
            warn!("Schedd {} is not advertising ScheddIpAddr", schedd);
            return Ok(None);
        };

        let is_local = parse_sinful_host(address)
            .map(|ip| self.local.contains(&ip))
            .unwrap_or(false);
        if !is_local {
            debug!("Schedd {} at {} is not local", schedd, address);
            return Ok(None);
        }

        let spool = if let Some(spool) = &advert.spool_dir {
            Path::new(spool).is_dir().then(|| spool.clone())
        } else if let Some(local) = &advert.local_dir {
            let spool = Path::new(local).join("spool");
            spool.is_dir().then(|| spool.to_string_lossy().into_owned())
        } else {
            None
        };
        let Some(spool) = spool else {
            debug!("Schedd {} is local but its directory is missing", schedd);
            return Ok(None);
        };

        info!("Schedd {} is local, reading spool {}", schedd, spool);
        Ok(Some(ConfigOverrides::new().with(SPOOL_KNOB, spool)))
    }
}

fn load_adverts(
    schedd: &str,
    pool: Option<&str>,
    store: &dyn PersistentStore,
    lookup: &AdvertLookup<'_>,
) -> Result<Vec<ScheddAdvert>> {
    let store_key = format!("{}.igetenv", schedd);

    if let Some(bytes) = store.get(&store_key) {
        match serde_json::from_slice::<Vec<ScheddAdvert>>(&bytes) {
            Ok(adverts) => return Ok(adverts),
            Err(e) => warn!("Ignoring unreadable store entry {}: {}", store_key, e),
        }
    }

    let adverts = lookup(schedd, pool)?;
    match serde_json::to_vec(&adverts) {
        Ok(bytes) => store.save(&store_key, &bytes),
        Err(e) => warn!("Cannot serialize adverts for {}: {}", schedd, e),
    }
    Ok(adverts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NoneStore};
    use std::net::Ipv4Addr;

    fn local() -> LocalAddresses {
        LocalAddresses::new(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))])
    }

    fn advert(address: &str, spool: Option<&str>, local_dir: Option<&str>) -> ScheddAdvert {
        ScheddAdvert {
            name: "schedd1".to_string(),
            address: Some(address.to_string()),
            spool_dir: spool.map(str::to_string),
            local_dir: local_dir.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_sinful_host() {
        assert_eq!(
            parse_sinful_host("<10.0.0.5:9618?addrs=10.0.0.5-9618>"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(
            parse_sinful_host("<[::1]:9618>"),
            Some("::1".parse().unwrap())
        );
        assert_eq!(parse_sinful_host("10.0.0.5:9618"), None);
        assert_eq!(parse_sinful_host("<cm.example.org:9618>"), None);
    }

    #[test]
    fn test_local_spool_dir_becomes_override() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().to_string_lossy().into_owned();
        let ad = advert("<10.0.0.5:9618>", Some(&spool), None);

        let cache = LocationCache::new(local());
        let location = cache
            .resolve(Some("schedd1"), None, &NoneStore, &|_, _| Ok(vec![ad.clone()]))
            .unwrap();

        assert_eq!(location.selector, ResourceSelector::Local);
        assert_eq!(location.overrides.get(SPOOL_KNOB), Some(spool.as_str()));
    }

    #[test]
    fn test_local_dir_falls_back_to_spool_subdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("spool")).unwrap();
        let local_dir = dir.path().to_string_lossy().into_owned();
        let ad = advert("<10.0.0.5:9618>", None, Some(&local_dir));

        let cache = LocationCache::new(local());
        let location = cache
            .resolve(Some("schedd1"), None, &NoneStore, &|_, _| Ok(vec![ad.clone()]))
            .unwrap();

        let expected = dir.path().join("spool").to_string_lossy().into_owned();
        assert_eq!(location.overrides.get(SPOOL_KNOB), Some(expected.as_str()));
    }

    #[test]
    fn test_remote_schedd_resolves_by_name() {
        let ad = advert("<192.168.7.7:9618>", Some("/"), None);

        let cache = LocationCache::new(local());
        let location = cache
            .resolve(Some("schedd1"), None, &NoneStore, &|_, _| Ok(vec![ad.clone()]))
            .unwrap();

        assert_eq!(location.selector, ResourceSelector::ByName("schedd1".into()));
        assert!(location.overrides.is_empty());
    }

    #[test]
    fn test_missing_directory_is_not_an_error() {
        let ad = advert("<10.0.0.5:9618>", Some("/definitely/not/here"), None);

        let cache = LocationCache::new(local());
        let location = cache
            .resolve(Some("schedd1"), None, &NoneStore, &|_, _| Ok(vec![ad.clone()]))
            .unwrap();
        assert!(location.overrides.is_empty());
    }

    #[test]
    fn test_missing_address_resolves_by_name() {
        let ad = ScheddAdvert {
            address: None,
            ..advert("<10.0.0.5:9618>", Some("/"), None)
        };

        let cache = LocationCache::new(local());
        let location = cache
            .resolve(Some("schedd1"), None, &NoneStore, &|_, _| Ok(vec![ad.clone()]))
            .unwrap();
        assert_eq!(location.selector, ResourceSelector::ByName("schedd1".into()));
        assert!(location.overrides.is_empty());
    }

    #[test]
    fn test_unknown_schedd_is_not_found() {
        let cache = LocationCache::new(local());
        let err = cache
            .resolve(Some("ghost"), None, &NoneStore, &|_, _| Ok(Vec::new()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decisions_are_memoized_and_stored() {
        let store = MemoryStore::new();
        let calls = Cell::new(0);
        let lookup = |_: &str, _: Option<&str>| -> Result<Vec<ScheddAdvert>> {
            calls.set(calls.get() + 1);
            Ok(vec![advert("<192.168.7.7:9618>", None, None)])
        };

        let cache = LocationCache::new(local());
        cache.resolve(Some("schedd1"), Some("cm"), &store, &lookup).unwrap();
        cache.resolve(Some("schedd1"), Some("cm"), &store, &lookup).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
        assert!(store.get("schedd1.igetenv").is_some());

        // A fresh cache sharing the store does not look up again
        let other = LocationCache::new(local());
        other.resolve(Some("schedd1"), Some("cm"), &store, &lookup).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_disabled_and_default_bypass_cache() {
        let cache = LocationCache::new(local());
        let fail = |_: &str, _: Option<&str>| -> Result<Vec<ScheddAdvert>> {
            Err(Error::Config("lookup must not run".into()))
        };

        let default = cache.resolve(None, None, &NoneStore, &fail).unwrap();
        assert_eq!(default.selector, ResourceSelector::Default);

        cache.disable();
        let named = cache.resolve(Some("schedd1"), None, &NoneStore, &fail).unwrap();
        assert_eq!(named.selector.to_args(), vec!["-name", "schedd1"]);
        assert!(cache.is_empty());
    }
}
