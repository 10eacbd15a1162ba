//! The lockstep diff walk.
//!
//! Walks the child lists of the old and new trees in lockstep, emitting
//! replace/insert/delete callbacks wherever the shallow comparator reports
//! a mismatch. A bounded lookahead window picks the hypothesis that
//! realigns the two cursors fastest.

use crate::tracing_macros::{debug, trace};
use crate::{
    Anchor, ChangeBuilder, ChildList, DiffAborted, DiffLimits, Equality, ShallowCompare,
    TreeSource,
};

/// Diff two trees, emitting the edit script into `builder`.
///
/// On success every callback needed to turn the subtree at `old_root` into
/// the subtree at `new_root` has been emitted, in application order. On
/// [`DiffAborted`] no callback has been emitted at all (anything recorded
/// mid-walk was rolled back) and the caller must substitute a whole-tree
/// replace.
pub fn diff<O, N, C, B>(
    old: &O,
    old_root: O::Node,
    new: &N,
    new_root: N::Node,
    cmp: &C,
    builder: &mut B,
    limits: &DiffLimits,
) -> Result<(), DiffAborted>
where
    O: TreeSource,
    N: TreeSource,
    C: ShallowCompare<O, N>,
    B: ChangeBuilder<O::Node, N::Node>,
{
    let mut walker = Walker {
        old,
        new,
        cmp,
        builder,
        limits,
    };
    walker.run(old_root, new_root)
}

struct Walker<'a, O, N, C, B> {
    old: &'a O,
    new: &'a N,
    cmp: &'a C,
    builder: &'a mut B,
    limits: &'a DiffLimits,
}

enum Hypothesis {
    DeleteOld,
    InsertNew,
    Replace,
}

impl<O, N, C, B> Walker<'_, O, N, C, B>
where
    O: TreeSource,
    N: TreeSource,
    C: ShallowCompare<O, N>,
    B: ChangeBuilder<O::Node, N::Node>,
{
    fn run(&mut self, old_root: O::Node, new_root: N::Node) -> Result<(), DiffAborted> {
        if self.compare(old_root, new_root) == Equality::NotEqual {
            debug!(?old_root, ?new_root, "roots differ, whole-tree replace");
            self.builder.replaced(old_root, new_root);
            return Ok(());
        }

        if !(self.old.is_composite(old_root) && self.new.is_composite(new_root)) {
            // Equal leaves (or an equal leaf/composite mix, which a sane
            // comparator never reports): nothing to do.
            return Ok(());
        }

        let entry = self.builder.checkpoint();
        match self.walk_children(old_root, new_root, 0) {
            Ok(()) => Ok(()),
            Err(reason) => {
                debug!(?reason, "diff aborted at entry boundary");
                self.builder.rollback_to(entry);
                Err(reason)
            }
        }
    }

    fn compare(&self, old_node: O::Node, new_node: N::Node) -> Equality {
        self.cmp.compare(self.old, old_node, self.new, new_node)
    }

    fn walk_children(
        &mut self,
        old_parent: O::Node,
        new_parent: N::Node,
        depth: usize,
    ) -> Result<(), DiffAborted> {
        if depth >= self.limits.max_depth {
            return Err(DiffAborted::DepthLimit);
        }

        let olds: ChildList<O::Node> = self.old.children(old_parent);
        let news: ChildList<N::Node> = self.new.children(new_parent);
        if olds.len() > self.limits.max_children || news.len() > self.limits.max_children {
            return Err(DiffAborted::WidthLimit);
        }
        if olds.contains(&old_parent) || news.contains(&new_parent) {
            return Err(DiffAborted::Malformed);
        }

        trace!(
            ?old_parent,
            old_children = olds.len(),
            new_children = news.len(),
            depth,
            "walk children"
        );

        let mut i = 0;
        let mut j = 0;
        // Position after which the next insert lands. Starts before the
        // first child, then tracks whichever node most recently ended up
        // occupying the current position.
        let mut anchor: Anchor<O::Node, N::Node> = Anchor::Start;

        while i < olds.len() && j < news.len() {
            let (o, n) = (olds[i], news[j]);

            if self.compare(o, n) == Equality::Equal {
                if self.old.is_composite(o) && self.new.is_composite(n) {
                    // Tentatively reuse the composite wrapper; recurse to
                    // find interior differences. If the recursion trips a
                    // safety bound, retract its partial output and replace
                    // the whole subtree instead.
                    let mark = self.builder.checkpoint();
                    if self.walk_children(o, n, depth + 1).is_err() {
                        debug!(?o, "subtree diff failed, degrading to replace");
                        self.builder.rollback_to(mark);
                        self.builder.replaced(o, n);
                        anchor = Anchor::NewSibling(n);
                        i += 1;
                        j += 1;
                        continue;
                    }
                }
                anchor = Anchor::OldSibling(o);
                i += 1;
                j += 1;
                continue;
            }

            match self.pick_hypothesis(&olds, &news, i, j) {
                Hypothesis::DeleteOld => {
                    debug!(?o, "emit delete");
                    self.builder.deleted(old_parent, o);
                    i += 1;
                }
                Hypothesis::InsertNew => {
                    debug!(?n, "emit insert");
                    self.builder.inserted(old_parent, anchor, n);
                    anchor = Anchor::NewSibling(n);
                    j += 1;
                }
                Hypothesis::Replace => {
                    debug!(?o, ?n, "emit replace");
                    self.builder.replaced(o, n);
                    anchor = Anchor::NewSibling(n);
                    i += 1;
                    j += 1;
                }
            }
        }

        while i < olds.len() {
            debug!(old = ?olds[i], "emit trailing delete");
            self.builder.deleted(old_parent, olds[i]);
            i += 1;
        }
        while j < news.len() {
            debug!(new = ?news[j], "emit trailing insert");
            self.builder.inserted(old_parent, anchor, news[j]);
            anchor = Anchor::NewSibling(news[j]);
            j += 1;
        }

        Ok(())
    }

    /// Decide how to get past a mismatched child pair.
    ///
    /// The delete hypothesis wins if the current new child reappears among
    /// the next few old children (the old child in between has no
    /// counterpart); the insert hypothesis wins symmetrically. Whichever
    /// realigns the cursors in fewer steps is cheapest; ties and dead ends
    /// become a replace, which is a single event.
    fn pick_hypothesis(
        &self,
        olds: &[O::Node],
        news: &[N::Node],
        i: usize,
        j: usize,
    ) -> Hypothesis {
        let window = self.limits.lookahead;

        let delete_realigns = (1..=window)
            .find(|&d| i + d < olds.len() && self.compare(olds[i + d], news[j]) == Equality::Equal);
        let insert_realigns = (1..=window)
            .find(|&d| j + d < news.len() && self.compare(olds[i], news[j + d]) == Equality::Equal);

        match (delete_realigns, insert_realigns) {
            (Some(del), Some(ins)) if del < ins => Hypothesis::DeleteOld,
            (Some(del), Some(ins)) if ins < del => Hypothesis::InsertNew,
            (Some(_), Some(_)) => Hypothesis::Replace,
            (Some(_), None) => Hypothesis::DeleteOld,
            (None, Some(_)) => Hypothesis::InsertNew,
            (None, None) => Hypothesis::Replace,
        }
    }
}
