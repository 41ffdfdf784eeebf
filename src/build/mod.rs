//! Build bridge: turns a recipe into a Dockerfile and metadata by running
//! the builder toolchain inside an interpreter sandbox.

mod orchestrator;
mod sandbox;
mod toolchain;
mod types;


pub use orchestrator::{BuildOrchestrator, DEFAULT_OUTPUT_DIR};
pub use sandbox::{ProcessSandbox, Sandbox};
pub use toolchain::BuilderScriptSource;
pub use types::{Architecture, GenerateOptions, Generation, OrchestratorState};
