//! Point-to-point links.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use gosmpls_types::LinkKind;

use crate::ports::Link;

/// A link between two [`super::SimPort`]s.
///
/// Tracks how many primary and backup LSPs ride on it. A lossy link damages
/// every labeled GoS packet it carries.
#[derive(Debug)]
pub struct SimLink {
    kind: LinkKind,
    broken: AtomicBool,
    lossy: AtomicBool,
    lsps: AtomicU32,
    backup_lsps: AtomicU32,
}

impl SimLink {
    pub fn new(kind: LinkKind) -> Self {
        Self {
            kind,
            broken: AtomicBool::new(false),
            lossy: AtomicBool::new(false),
            lsps: AtomicU32::new(0),
            backup_lsps: AtomicU32::new(0),
        }
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn set_lossy(&self, lossy: bool) {
        self.lossy.store(lossy, Ordering::SeqCst);
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy.load(Ordering::SeqCst)
    }

    /// Primary LSPs established over the link.
    pub fn lsp_count(&self) -> u32 {
        self.lsps.load(Ordering::SeqCst)
    }

    /// Backup LSPs established over the link.
    pub fn backup_lsp_count(&self) -> u32 {
        self.backup_lsps.load(Ordering::SeqCst)
    }
}

fn decrement(counter: &AtomicU32) {
    // saturates at zero
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

impl Link for SimLink {
    fn kind(&self) -> LinkKind {
        self.kind
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    fn set_lsp_up(&self) {
        self.lsps.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_lsp(&self) {
        decrement(&self.lsps);
    }

    fn set_backup_lsp(&self) {
        self.backup_lsps.fetch_add(1, Ordering::SeqCst);
    }

    fn set_backup_lsp_down(&self) {
        decrement(&self.backup_lsps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsp_counters_saturate() {
        let link = SimLink::new(LinkKind::Internal);
        link.set_lsp_up();
        link.remove_lsp();
        link.remove_lsp();
        assert_eq!(link.lsp_count(), 0);

        link.set_backup_lsp();
        assert_eq!(link.backup_lsp_count(), 1);
        link.set_backup_lsp_down();
        link.set_backup_lsp_down();
        assert_eq!(link.backup_lsp_count(), 0);
    }

    #[test]
    fn test_broken_flag() {
        let link = SimLink::new(LinkKind::External);
        assert!(!link.is_broken());
        link.set_broken(true);
        assert!(link.is_broken());
        assert_eq!(link.kind(), LinkKind::External);
    }
}
