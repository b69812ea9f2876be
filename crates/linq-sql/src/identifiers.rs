//! Alias generation.

/// Produces `prefix + n` with one counter shared by every prefix.
///
/// One instance serves a whole top-level compilation, including nested
/// sub-statements, and is threaded through by `&mut`. It is deliberately not
/// `Clone`: a copied generator would hand out colliding aliases.
#[derive(Debug, Default)]
pub struct UniqueIdentifierGenerator {
    counter: usize,
}

impl UniqueIdentifierGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_unique_identifier(&mut self, prefix: &str) -> String {
        let identifier = format!("{}{}", prefix, self.counter);
        self.counter += 1;
        identifier
    }

    /// Number of identifiers handed out so far.
    pub fn issued(&self) -> usize {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_shared_across_prefixes() {
        let mut generator = UniqueIdentifierGenerator::new();
        assert_eq!(generator.get_unique_identifier("t"), "t0");
        assert_eq!(generator.get_unique_identifier("q"), "q1");
        assert_eq!(generator.get_unique_identifier("t"), "t2");
        assert_eq!(generator.issued(), 3);
    }

    #[test]
    fn test_independent_generators_restart() {
        let mut a = UniqueIdentifierGenerator::new();
        let mut b = UniqueIdentifierGenerator::new();
        a.get_unique_identifier("t");
        assert_eq!(b.get_unique_identifier("t"), "t0");
    }
}
