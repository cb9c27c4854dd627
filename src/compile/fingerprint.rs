use std::fmt;

use xxhash_rust::xxh3::Xxh3;

use crate::compile::blocks::{Section, SectionKind};
use crate::compile::compiler::CompiledInstruction;

const XXH3_SEED: u64 = 0x5e7a_11c0_d3b9_4f27;

/// Stable 128-bit identity of a compiled instruction. Equal inputs give equal fingerprints
/// across runs and platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct InstructionFingerprint {
    pub hi: u64,
    pub lo: u64,
}

impl fmt::Display for InstructionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

pub(crate) fn fingerprint_instruction(ins: &CompiledInstruction) -> InstructionFingerprint {
    let mut h = StableHasher::new();
    h.write_u32(ins.sections.len() as u32);
    for s in &ins.sections {
        write_section(&mut h, s);
    }
    h.write_str(&ins.control_json);
    h.write_str(&ins.closing);
    h.finish()
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> InstructionFingerprint {
        let v = self.inner.digest128();
        InstructionFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

fn write_section(h: &mut StableHasher, s: &Section) {
    h.write_u8(match s.kind {
        SectionKind::SceneIntegration => 0,
        SectionKind::FaceLock => 1,
        SectionKind::BodyLock => 2,
        SectionKind::GarmentFit => 3,
        SectionKind::CoverageConstraint => 4,
        SectionKind::AntiArtifact => 5,
        SectionKind::Advisory => 6,
        SectionKind::Retry => 7,
    });
    h.write_str(s.title);
    match &s.preamble {
        Some(p) => {
            h.write_u8(1);
            h.write_str(p);
        }
        None => h.write_u8(0),
    }
    h.write_u32(s.rules.len() as u32);
    for r in &s.rules {
        h.write_str(r.id);
        h.write_str(&r.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_32_hex_digits() {
        let fp = InstructionFingerprint { hi: 1, lo: 0xff };
        let s = fp.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.ends_with("00ff"));
    }

    #[test]
    fn string_length_prefix_separates_fields() {
        let mut a = StableHasher::new();
        a.write_str("ab");
        a.write_str("c");
        let mut b = StableHasher::new();
        b.write_str("a");
        b.write_str("bc");
        assert_ne!(a.finish(), b.finish());
    }
}
