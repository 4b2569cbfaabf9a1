use ragkb_core::types::Evidence;

/// Evidence kept for the prompt, in rank order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub entries: Vec<Evidence>,
    pub chars: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct source names in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            if !out.contains(&e.source) {
                out.push(e.source.clone());
            }
        }
        out
    }
}

/// Packs ranked evidence into a character budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Takes evidence in order until the next entry would overflow the budget.
    /// Later, shorter entries are not considered once that happens.
    pub fn assemble(&self, hits: &[Evidence]) -> AssembledContext {
        let mut ctx = AssembledContext::default();
        for hit in hits {
            if hit.text.is_empty() {
                continue;
            }
            let len = hit.text.chars().count();
            if ctx.chars + len > self.max_chars {
                break;
            }
            ctx.chars += len;
            ctx.entries.push(hit.clone());
        }
        ctx
    }
}
