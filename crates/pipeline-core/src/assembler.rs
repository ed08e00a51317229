//! Reassembly of streamed tool-call fragments.
//!
//! Providers split a tool call across many deltas keyed by a stream index:
//! the first fragment usually carries the id and name, later ones carry
//! argument slices. Indices can interleave across calls and need not be
//! contiguous.

use std::collections::BTreeMap;

use pipeline_provider::ToolCallSpec;

#[derive(Debug, Default)]
struct Fragment {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates `ToolCallDelta` events into complete calls.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    fragments: BTreeMap<u32, Fragment>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(
        &mut self,
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        let fragment = self.fragments.entry(index).or_default();
        if fragment.id.is_none() {
            fragment.id = id;
        }
        // first name wins, later fragments never rename a call
        if fragment.name.is_none() {
            fragment.name = name;
        }
        if let Some(slice) = arguments {
            fragment.arguments.push_str(&slice);
        }
    }

    /// True once at least one fragment has a name, i.e. the draft pass
    /// produced something executable.
    pub fn has_named_calls(&self) -> bool {
        self.fragments.values().any(|f| f.name.is_some())
    }

    /// Completed calls in index order. Fragments that never received a name
    /// are dropped rather than guessed at.
    pub fn finish(self) -> Vec<ToolCallSpec> {
        self.fragments
            .into_iter()
            .filter_map(|(index, fragment)| {
                let name = fragment.name?;
                Some(ToolCallSpec {
                    id: fragment.id.unwrap_or_else(|| format!("call_{index}")),
                    name,
                    arguments: fragment.arguments,
                })
            })
            .collect()
    }
}
