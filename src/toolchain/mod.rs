// Per-language toolchain setup implementations. Concrete setups are
// selected by a static match over the supported language enumeration.

pub mod node;
pub mod python;
pub mod rust;
pub mod solidity;
pub mod traits;

use std::sync::Arc;

use crate::process::ProcessRunner;
use crate::requirements::LanguageId;

pub use node::{NodeFlavor, NodeToolchain};
pub use python::PythonToolchain;
pub use rust::RustToolchain;
pub use solidity::SolidityToolchain;
pub use traits::{
    ensure_tool, options_record_json, options_record_toml, SetupConfig, SetupStatus,
    ToolchainResult, ToolchainSetup,
};

/// Select the concrete setup implementation for a language
pub fn toolchain_for(
    language: LanguageId,
    runner: Arc<dyn ProcessRunner>,
) -> Box<dyn ToolchainSetup> {
    match language {
        LanguageId::Rust => Box::new(RustToolchain::new(runner)),
        LanguageId::Python => Box::new(PythonToolchain::new(runner)),
        LanguageId::Solidity => Box::new(SolidityToolchain::new(runner)),
        LanguageId::Nodejs => Box::new(NodeToolchain::new(runner, NodeFlavor::Plain)),
        LanguageId::React => Box::new(NodeToolchain::new(runner, NodeFlavor::React)),
        LanguageId::Web3 => Box::new(NodeToolchain::new(runner, NodeFlavor::Web3)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeProcessRunner;

    #[test]
    fn test_every_language_has_a_toolchain() {
        let runner: Arc<dyn ProcessRunner> = Arc::new(FakeProcessRunner::new());
        for language in LanguageId::ALL {
            let toolchain = toolchain_for(language, runner.clone());
            assert_eq!(toolchain.language(), language);
            assert!(!toolchain.tool_binary().is_empty());
        }
    }
}
