//! Query context
//!
//! Everything queries share for the life of the process: configuration,
//! the location cache, the persistent store, the command runner and the
//! optional native binding. Built once at startup and passed by reference.

use std::rc::Rc;

use poolwatch_core::dto::location::ScheddAdvert;
use poolwatch_core::{AttrType, FormatSpec, RecordSet, Value};
use tracing::debug;

use crate::backend::{
    BackendKind, BackendSelector, CommandRunner, ExternalBackend, NativeBackend, NativeBinding,
    QueryBackend, SystemRunner,
};
use crate::config::Config;
use crate::error::Result;
use crate::location::{LocalAddresses, LocationCache, ScheddLocation};
use crate::query::Query;
use crate::store::{DiskStore, NoneStore, PersistentStore};

/// Shared state injected into every query
pub struct QueryContext {
    config: Config,
    location_cache: LocationCache,
    store: Rc<dyn PersistentStore>,
    runner: Rc<dyn CommandRunner>,
    binding: Option<Rc<dyn NativeBinding>>,
    backend_kind: BackendKind,
}

impl QueryContext {
    /// Build a context from configuration, discovering the local host's
    /// addresses and running tools through [`SystemRunner`]
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store: Rc<dyn PersistentStore> = match &config.store_dir {
            Some(dir) => Rc::new(DiskStore::new(dir).with_cache_duration(config.store_ttl)),
            None => Rc::new(NoneStore),
        };

        Ok(Self::with_parts(
            config,
            LocationCache::new(LocalAddresses::discover()),
            store,
            Rc::new(SystemRunner),
            None,
        ))
    }

    /// Build a context from explicit parts
    pub fn with_parts(
        config: Config,
        location_cache: LocationCache,
        store: Rc<dyn PersistentStore>,
        runner: Rc<dyn CommandRunner>,
        binding: Option<Rc<dyn NativeBinding>>,
    ) -> Self {
        if !config.location_cache {
            location_cache.disable();
        }
        let backend_kind = BackendSelector::detect(binding.as_deref(), config.prefer_native);

        Self {
            config,
            location_cache,
            store,
            runner,
            binding,
            backend_kind,
        }
    }

    /// Register a native binding and choose the backend again
    pub fn with_binding(mut self, binding: Rc<dyn NativeBinding>) -> Self {
        self.backend_kind = BackendSelector::detect(Some(binding.as_ref()), self.config.prefer_native);
        self.binding = Some(binding);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn location_cache(&self) -> &LocationCache {
        &self.location_cache
    }

    pub fn store(&self) -> &dyn PersistentStore {
        self.store.as_ref()
    }

    /// Strategy chosen by the capability check
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    /// A backend of the chosen kind
    pub fn backend(&self) -> Box<dyn QueryBackend> {
        match self.native_backend() {
            Some(native) => Box::new(native),
            None => Box::new(self.external_backend()),
        }
    }

    pub fn external_backend(&self) -> ExternalBackend {
        ExternalBackend::new(self.runner.clone(), self.config.condor_bin.clone())
    }

    /// The native backend, if it was selected
    pub fn native_backend(&self) -> Option<NativeBackend> {
        match (&self.binding, self.backend_kind) {
            (Some(binding), BackendKind::Native) => {
                Some(NativeBackend::new(binding.clone(), self.store.clone()))
            }
            _ => None,
        }
    }

    /// Resolve how to reach a schedd through the location cache
    pub fn resolve_schedd(&self, schedd: Option<&str>, pool: Option<&str>) -> Result<ScheddLocation> {
        self.location_cache
            .resolve(schedd, pool, self.store(), &|name, pool| {
                self.lookup_schedd_adverts(name, pool)
            })
    }

    /// Status query for a schedd's advertised address and directories
    fn lookup_schedd_adverts(&self, schedd: &str, pool: Option<&str>) -> Result<Vec<ScheddAdvert>> {
        debug!("Looking up adverts of schedd {}", schedd);
        let query = Query::status(self, Some("schedd"), pool, None)?;
        let format = FormatSpec::new()
            .with("ScheddIpAddr", AttrType::String)
            .with("SPOOL_DIR_STRING", AttrType::String)
            .with("LOCAL_DIR_STRING", AttrType::String);

        let data = query.fetch(Some(&format!("Name=?=\"{}\"", schedd)), Some(&format))?;
        Ok(adverts_from(data))
    }
}

fn adverts_from(data: RecordSet) -> Vec<ScheddAdvert> {
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

    data.into_iter()
        .filter_map(|(key, record)| {
            let name = key.parts().first()?.as_str()?.to_string();
            Some(ScheddAdvert {
                name,
                address: text(record.get("ScheddIpAddr")),
                spool_dir: text(record.get("SPOOL_DIR_STRING")),
                local_dir: text(record.get("LOCAL_DIR_STRING")),
            })
        })
        .collect()
}
