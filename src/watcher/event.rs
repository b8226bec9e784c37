use std::path::{Path, PathBuf};

/// A debounced, content-checked event for one watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The file's bytes differ from the last snapshot.
    Changed(PathBuf),
    /// The file disappeared (deleted or renamed away). Its watch has been released.
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Raw notification kinds after classification, before debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawChange {
    Touched,
    Removed,
}

/// Map a notify event kind onto a raw change, or `None` for kinds that cannot alter the
/// file's content (reads, opens, closes).
pub(crate) fn classify(kind: &notify::EventKind) -> Option<RawChange> {
    use notify::EventKind;
    use notify::event::ModifyKind;

    match kind {
        EventKind::Remove(_) => Some(RawChange::Removed),
        // A rename moves the watched path away from the inode we were watching.
        EventKind::Modify(ModifyKind::Name(_)) => Some(RawChange::Removed),
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any => Some(RawChange::Touched),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};

    #[test]
    fn test_classify_writes_as_touched() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(RawChange::Touched)
        );
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(RawChange::Touched)
        );
    }

    #[test]
    fn test_classify_removals_and_renames() {
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(RawChange::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(RawChange::Removed)
        );
    }

    #[test]
    fn test_classify_ignores_access() {
        assert_eq!(classify(&EventKind::Access(AccessKind::Read)), None);
    }

    #[test]
    fn test_event_path() {
        let event = WatchEvent::Removed(PathBuf::from("/tmp/a.js"));
        assert_eq!(event.path(), Path::new("/tmp/a.js"));
    }
}
