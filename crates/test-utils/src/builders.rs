#![allow(dead_code)]

use execwatch::config::{ConfigFile, RawConfigFile};
use execwatch::types::{ExecutorKind, Target};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn executor(mut self, kind: ExecutorKind) -> Self {
        self.config.executor.kind = kind;
        self
    }

    pub fn kubectl(mut self, binary: &str) -> Self {
        self.config.executor.kubectl = binary.to_string();
        self
    }

    pub fn poll_interval(mut self, value: &str) -> Self {
        self.config.timeouts.poll_interval = value.to_string();
        self
    }

    pub fn helper_timeout(mut self, value: &str) -> Self {
        self.config.timeouts.helper = value.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `ns/pod` target shorthand.
pub fn pod(namespace: &str, name: &str) -> Target {
    Target::new(name).in_namespace(namespace)
}
