//! Instruction compiler: typed rule blocks merged in a fixed precedence order, a
//! machine-readable control object, and a stable fingerprint of the result.

pub mod blocks;
pub mod compiler;
pub mod control;
pub mod fingerprint;

pub use compiler::{CompileInputs, CompiledInstruction, CoverageConstraint, FaceAnchor, compile};
pub use fingerprint::InstructionFingerprint;
