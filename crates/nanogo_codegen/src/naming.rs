/// Counters for generated block and string-literal symbol names.
///
/// Owned by a single [`CodeGenerator`](crate::CodeGenerator), so two
/// compilation units never share a sequence and output is deterministic.
#[derive(Debug, Default)]
pub struct NameGen {
    blocks: usize,
    strings: usize,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh block name: `label.N`.
    pub fn block(&mut self, label: &str) -> String {
        let name = format!("{label}.{}", self.blocks);
        self.blocks += 1;
        name
    }

    /// Fresh string-literal global name: `str.N`.
    pub fn string(&mut self) -> String {
        let name = format!("str.{}", self.strings);
        self.strings += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_independent() {
        let mut names = NameGen::new();
        assert_eq!(names.block("if.true"), "if.true.0");
        assert_eq!(names.string(), "str.0");
        assert_eq!(names.block("if.after"), "if.after.1");
        assert_eq!(names.string(), "str.1");

        let mut other = NameGen::new();
        assert_eq!(other.string(), "str.0");
    }
}
