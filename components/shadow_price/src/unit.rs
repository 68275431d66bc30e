//! View of a compilation unit as seen by profiling and the decision pass

use crate::profile::ProfileStore;
use jit_compiler::{CallKind, IRModule};
use tracing::debug;

/// Position of a call instruction: function index, instruction index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteLocation {
    /// Function index within the unit
    pub function: usize,
    /// Instruction index within the function body
    pub instruction: usize,
}

/// One call-family instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Where the call lives
    pub location: SiteLocation,
    /// Name of the calling function
    pub caller: String,
    /// Name the call refers to; it may not resolve within the unit
    pub callee: String,
    /// Whether the call is already an inline candidate
    pub is_candidate: bool,
}

/// What the decision pass needs from a compiled unit
pub trait CompilationUnit {
    /// Every call-family instruction, functions in order, instructions in order
    fn call_sites(&self) -> Vec<CallSite>;

    /// Body size of `callee` if it is defined in this unit
    fn body_size(&self, callee: &str) -> Option<usize>;

    /// Turn the plain call at `site` into an inline candidate
    ///
    /// Returns false if there is no plain call at that location.
    fn promote(&mut self, site: SiteLocation) -> bool;
}

impl CompilationUnit for IRModule {
    fn call_sites(&self) -> Vec<CallSite> {
        let mut sites = Vec::new();
        for (fi, func) in self.functions().iter().enumerate() {
            for (ii, inst) in func.instructions.iter().enumerate() {
                if let (Some(kind), Some(callee)) = (inst.call_kind(), inst.callee()) {
                    sites.push(CallSite {
                        location: SiteLocation {
                            function: fi,
                            instruction: ii,
                        },
                        caller: func.name.clone(),
                        callee: callee.to_string(),
                        is_candidate: kind == CallKind::Inline,
                    });
                }
            }
        }
        sites
    }

    fn body_size(&self, callee: &str) -> Option<usize> {
        self.function(callee).map(|f| f.instruction_count())
    }

    fn promote(&mut self, site: SiteLocation) -> bool {
        let Some(inst) = self
            .functions_mut()
            .get_mut(site.function)
            .and_then(|f| f.instructions.get_mut(site.instruction))
        else {
            return false;
        };
        if inst.call_kind() != Some(CallKind::Call) {
            return false;
        }
        inst.set_call_kind(CallKind::Inline)
    }
}

/// Count resolvable call sites per callee and normalize
///
/// Both plain and candidate calls are counted, one observation per site.
/// Returns the number of observations recorded.
pub fn profile_unit<U: CompilationUnit + ?Sized>(unit: &U, store: &mut ProfileStore) -> usize {
    let mut observed = 0;
    for site in unit.call_sites() {
        if unit.body_size(&site.callee).is_some() {
            store.record(&site.callee);
            observed += 1;
        }
    }
    store.normalize();
    debug!(observed, callees = store.len(), "static profile collected");
    observed
}

#[cfg(test)]
mod tests {
    use super::*;
    use jit_compiler::parse_module;

    const SRC: &str = "\
func leaf(x)
  ret x
endfunc
func mid(x)
  call x, leaf, x
  inline x, leaf, x
  ret x
endfunc
func top(x)
  call x, mid, x
  call x, leaf, x
  call x, ext, x
  ret x
endfunc
";

    #[test]
    fn test_call_sites_in_traversal_order() {
        let module = parse_module(SRC).unwrap();
        let sites = module.call_sites();
        let summary: Vec<(&str, &str, bool)> = sites
            .iter()
            .map(|s| (s.caller.as_str(), s.callee.as_str(), s.is_candidate))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("mid", "leaf", false),
                ("mid", "leaf", true),
                ("top", "mid", false),
                ("top", "leaf", false),
                ("top", "ext", false),
            ]
        );
        assert_eq!(
            sites[0].location,
            SiteLocation {
                function: 1,
                instruction: 0
            }
        );
    }

    #[test]
    fn test_body_size() {
        let module = parse_module(SRC).unwrap();
        assert_eq!(module.body_size("leaf"), Some(1));
        assert_eq!(module.body_size("mid"), Some(3));
        assert_eq!(module.body_size("ext"), None);
    }

    #[test]
    fn test_promote() {
        let mut module = parse_module(SRC).unwrap();
        let sites = module.call_sites();
        assert!(module.promote(sites[0].location));
        assert!(module.call_sites()[0].is_candidate);

        // Already a candidate, out of range, and a non-call instruction.
        assert!(!module.promote(sites[1].location));
        assert!(!module.promote(SiteLocation {
            function: 9,
            instruction: 0
        }));
        assert!(!module.promote(SiteLocation {
            function: 0,
            instruction: 0
        }));
    }

    #[test]
    fn test_profile_unit_counts_resolvable_sites() {
        let module = parse_module(SRC).unwrap();
        let mut store = ProfileStore::new();
        let observed = profile_unit(&module, &mut store);

        assert_eq!(observed, 4);
        assert_eq!(store.entry("leaf").unwrap().call_count, 3);
        assert_eq!(store.entry("mid").unwrap().call_count, 1);
        assert!(store.entry("ext").is_none());
        assert_eq!(store.lookup("leaf"), 1.0);
        assert!((store.lookup("mid") - 1.0 / 3.0).abs() < 1e-12);
    }
}
