use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of contracts a registered node satisfies.
///
/// Computed from what was handed to the registry at registration time, so
/// the capability set of a node type is fixed once it is registered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const ACTION: Capabilities = Capabilities(1);
    pub const MODEL: Capabilities = Capabilities(1 << 1);
    pub const MEMORY: Capabilities = Capabilities(1 << 2);
    pub const TOOL: Capabilities = Capabilities(1 << 3);
    pub const TRIGGER: Capabilities = Capabilities(1 << 4);

    const NAMED: [(Capabilities, &'static str); 5] = [
        (Capabilities::ACTION, "action"),
        (Capabilities::MODEL, "model"),
        (Capabilities::MEMORY, "memory"),
        (Capabilities::TOOL, "tool"),
        (Capabilities::TRIGGER, "trigger"),
    ];

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.insert(rhs);
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capabilities({})", self)
    }
}

impl Serialize for Capabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}
