//! Builder configuration.

use crate::target::TargetInfo;

/// Settings fixed for the lifetime of one [`ModuleBuilder`](crate::ModuleBuilder).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerConfig {
    pub module_name: String,
    pub target: TargetInfo,
    /// Run the cleanup pass in [`finish`](crate::ModuleBuilder::finish).
    pub run_cleanup: bool,
    /// Verify the module in [`finish`](crate::ModuleBuilder::finish).
    pub verify: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            module_name: "module".to_string(),
            target: TargetInfo::default(),
            run_cleanup: true,
            verify: true,
        }
    }
}

impl LowerConfig {
    pub fn new(module_name: impl Into<String>) -> Self {
        LowerConfig {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: TargetInfo) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn without_cleanup(mut self) -> Self {
        self.run_cleanup = false;
        self
    }

    #[must_use]
    pub fn without_verify(mut self) -> Self {
        self.verify = false;
        self
    }
}
