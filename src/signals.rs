//! Site lifecycle signals.
//!
//! Plugins subscribe to a [`Signal`] with an explicit [`Signals::connect`]
//! call during setup; the host fires each signal with [`Signals::emit`].
//! Handlers run synchronously, in connection order, on the emitting thread.

use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Lifecycle points a plugin can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Configuration is resolved and the build is about to start.
    Initialized,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Initialized => "initialized",
        }
    }
}

/// What a handler sees of the site: its root and resolved configuration.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub root: PathBuf,
    pub config: SiteConfig,
}

impl SiteContext {
    pub fn new(root: &Path, config: SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Generator output directory, resolved against the site root.
    pub fn output_dir(&self) -> PathBuf {
        self.config.output_dir(&self.root)
    }
}

type Handler = Box<dyn Fn(&SiteContext) + Send + Sync>;

#[derive(Default)]
pub struct Signals {
    handlers: Vec<(Signal, Handler)>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F>(&mut self, signal: Signal, handler: F)
    where
        F: Fn(&SiteContext) + Send + Sync + 'static,
    {
        self.handlers.push((signal, Box::new(handler)));
    }

    /// Fire `signal`, returning how many handlers ran.
    pub fn emit(&self, signal: Signal, context: &SiteContext) -> usize {
        let mut ran = 0;
        for (_, handler) in self.handlers.iter().filter(|(s, _)| *s == signal) {
            handler(context);
            ran += 1;
        }
        tracing::debug!(signal = signal.name(), handlers = ran, "signal emitted");
        ran
    }
}
