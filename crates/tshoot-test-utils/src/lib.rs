//! Testing utilities for the troubleshooting workspace
//!
//! Shared fixtures: a sample site, a scripted health probe and an engine
//! harness with helpers for signed request URLs.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tshoot_engine::{
    Action, Engine, EngineConfig, ExtensionInfo, HealthProbe, ProbeError, ProbeReport, Request,
    SiteManifest, ThemeInfo,
};
use tshoot_store::{MemoryStore, OverrideStore};

pub const BASE_URL: &str = "http://example.test/wp-admin/plugins.php";

/// Probe answering from a queue; healthy once the queue is empty
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<ProbeReport, String>>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_healthy(&self) -> &Self {
        self.script.lock().push_back(Ok(ProbeReport::good()));
        self
    }

    pub fn then_broken(&self) -> &Self {
        self.script
            .lock()
            .push_back(Ok(ProbeReport::critical("loopback request failed")));
        self
    }

    pub fn then_unreachable(&self) -> &Self {
        self.script.lock().push_back(Err("connection refused".to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HealthProbe for ScriptedProbe {
    fn probe(&self) -> Result<ProbeReport, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(reason)) => Err(ProbeError::Unreachable(reason)),
            None => Ok(ProbeReport::good()),
        }
    }
}

fn extension(path: &str, name: &str) -> ExtensionInfo {
    ExtensionInfo {
        path: path.to_string(),
        name: name.to_string(),
    }
}

fn theme(id: &str, parent: Option<&str>) -> ThemeInfo {
    ThemeInfo {
        id: id.to_string(),
        name: id.to_string(),
        parent: parent.map(str::to_string),
    }
}

/// Four active extensions, a custom child theme and one bundled default
pub fn sample_site() -> SiteManifest {
    SiteManifest {
        extensions: vec![
            extension("a/a.php", "Alpha"),
            extension("b/b.php", "Beta"),
            extension("c/c.php", "Gamma"),
            extension("hello.php", "Hello"),
            extension("inactive/inactive.php", "Inactive"),
        ],
        active_extensions: vec![
            "a/a.php".to_string(),
            "b/b.php".to_string(),
            "c/c.php".to_string(),
            "hello.php".to_string(),
        ],
        themes: vec![
            theme("storefront", None),
            theme("storefront-child", Some("storefront")),
            theme("twentytwentyone", None),
        ],
        stylesheet: "storefront-child".to_string(),
    }
}

/// Engine over an in-memory store, the sample site and a scripted probe
pub struct Harness {
    pub kv: Arc<MemoryStore>,
    pub probe: Arc<ScriptedProbe>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_site(sample_site())
    }

    pub fn with_site(site: SiteManifest) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let probe = Arc::new(ScriptedProbe::new());
        let site = Arc::new(site);
        let config = EngineConfig::default().with_signing_seed("42".repeat(32));
        let engine = Engine::new(config, kv.clone(), site.clone(), site, probe.clone()).unwrap();
        Self { kv, probe, engine }
    }

    pub fn store(&self) -> &OverrideStore {
        self.engine.store()
    }

    /// Begin a session allowing `allowed`; returns the cookie secret
    pub fn start_session(&self, allowed: &[&str]) -> String {
        let allowed: BTreeSet<String> = allowed.iter().map(|s| (*s).to_string()).collect();
        self.engine
            .lifecycle()
            .begin_session(None, &allowed)
            .unwrap()
            .secret
    }

    /// Request on `url` carrying the session cookie
    pub fn request(&self, url: &str, secret: &str) -> Request {
        Request::new(url)
            .unwrap()
            .with_cookie(self.engine.config().cookie_name.clone(), secret)
    }

    /// Link on the base URL performing `action` with a fresh token
    pub fn signed_url(&self, action: &Action, force: bool) -> String {
        action.link(
            self.engine.authorizer(),
            &url::Url::parse(BASE_URL).unwrap(),
            force,
        )
    }

    /// Link on the base URL performing `action` without a token
    pub fn unsigned_url(&self, action: &Action) -> String {
        let mut url = url::Url::parse(BASE_URL).unwrap();
        url.query_pairs_mut().extend_pairs(action.query_pairs());
        url.to_string()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
