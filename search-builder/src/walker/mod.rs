//! Hierarchy traversal.
//!
//! Turns a hierarchy tree into a sequence of search document writes,
//! depth-first and pre-order, with children visited in source order.

use tracing::{debug, instrument};

use hierarchy_client::HierarchyFetcher;
use search_builder_repository::SearchIndexProvider;
use search_builder_shared::{HierarchyNode, SearchDocument};

use crate::errors::JobError;

/// Counts collected during a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Documents written, including the root.
    pub documents_written: usize,
    /// Child references skipped because they had no code.
    pub children_skipped: usize,
}

/// Walks a hierarchy and writes one document per reachable node.
pub struct HierarchyWalker<'a> {
    hierarchy: &'a dyn HierarchyFetcher,
    index: &'a dyn SearchIndexProvider,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(hierarchy: &'a dyn HierarchyFetcher, index: &'a dyn SearchIndexProvider) -> Self {
        Self { hierarchy, index }
    }

    /// Write `root` and every descendant reachable through non-empty codes.
    ///
    /// Pending codes are kept on an explicit stack, so memory use grows with
    /// the width of the tree rather than call depth. The first fetch or write
    /// error ends the walk; documents already written stay in the index.
    #[instrument(skip(self, root), fields(root = %root.code))]
    pub async fn walk(
        &self,
        instance_id: &str,
        dimension: &str,
        root: &HierarchyNode,
    ) -> Result<WalkSummary, JobError> {
        let mut summary = WalkSummary::default();
        let mut pending: Vec<String> = Vec::new();

        self.write(instance_id, dimension, root).await?;
        summary.documents_written += 1;
        push_children(&mut pending, root, &mut summary);

        while let Some(code_id) = pending.pop() {
            let node = self
                .hierarchy
                .get_node(instance_id, dimension, &code_id)
                .await?;

            self.write(instance_id, dimension, &node).await?;
            summary.documents_written += 1;
            push_children(&mut pending, &node, &mut summary);
        }

        debug!(
            documents_written = summary.documents_written,
            children_skipped = summary.children_skipped,
            "Hierarchy walk complete"
        );
        Ok(summary)
    }

    async fn write(
        &self,
        instance_id: &str,
        dimension: &str,
        node: &HierarchyNode,
    ) -> Result<(), JobError> {
        let document = SearchDocument::from(node);
        let status = self
            .index
            .put_document(instance_id, dimension, &document)
            .await?;

        debug!(code = %document.code, status = status, "Dimension option indexed");
        Ok(())
    }
}

/// Push the followable children of `node` so that the first child is popped first.
fn push_children(pending: &mut Vec<String>, node: &HierarchyNode, summary: &mut WalkSummary) {
    for child in node.children.iter().rev() {
        if child.is_followable() {
            pending.push(child.code_id.clone());
        } else {
            summary.children_skipped += 1;
            debug!(parent = %node.code, "Skipping child without code");
        }
    }
}
