/// Default bound on both the exclusive depth and each identity's shared count.
pub const DEFAULT_MAX_RECURSION: u32 = 65_535;

/// Tie-break between the two waiting classes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    /// New readers that have to block queue behind waiting writers.
    ///
    /// Readers that already hold the lock (and the exclusive owner) are
    /// always admitted, so recursion never deadlocks behind a writer.
    #[default]
    Writer,
    /// New readers are admitted whenever no other thread holds exclusive
    /// access. Writers may starve under continuous read load.
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    pub preference: Preference,
    pub max_recursion: u32,
}

impl LockConfig {
    pub const fn new() -> Self {
        Self {
            preference: Preference::Writer,
            max_recursion: DEFAULT_MAX_RECURSION,
        }
    }

    pub const fn preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }

    /// A limit of zero is raised to one: every identity may hold at least once.
    pub const fn max_recursion(mut self, max_recursion: u32) -> Self {
        self.max_recursion = if max_recursion == 0 { 1 } else { max_recursion };
        self
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new()
    }
}
