use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use crate::audio::engine::AutoAdvance;
use crate::audio::source::is_supported_extension;
use crate::error::QueueError;
use crate::models::Item;

/// Ordered list of items the player can navigate.
///
/// Lookups are by position or by item equality. The playlist may list the
/// same item more than once; `PlaylistCursor` tracks which entry is current.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    items: Vec<Arc<Item>>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            items: items.into_iter().map(Arc::new).collect(),
        }
    }

    /// Build from files and directories. Directories are scanned
    /// recursively; files with unsupported extensions are skipped.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, QueueError> {
        let mut items = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                let found = scan_directory(path)?;
                if found.is_empty() {
                    return Err(QueueError::NoPlayableFiles {
                        path: path.to_string_lossy().to_string(),
                    });
                }
                debug!("Found {} playable files in {}", found.len(), path.display());
                items.extend(found.into_iter().map(Item::from_path));
            } else if path.is_file() {
                if is_supported_extension(path) {
                    items.push(Item::from_path(path));
                } else {
                    warn!("Skipping unsupported file: {}", path.display());
                }
            } else {
                return Err(QueueError::FileNotFound {
                    path: path.to_string_lossy().to_string(),
                });
            }
        }

        if items.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        Ok(Self::from_items(items))
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(Arc::new(item));
    }

    pub fn get(&self, index: usize) -> Result<Arc<Item>, QueueError> {
        if self.items.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        self.items
            .get(index)
            .cloned()
            .ok_or(QueueError::InvalidIndex { index })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_of(&self, item: &Item) -> Option<usize> {
        self.items.iter().position(|candidate| candidate.as_ref() == item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.iter()
    }
}

/// Current entry of a shared playlist.
///
/// Navigation is by entry index, so an item listed twice is played twice
/// and then left behind. Shared between the facade and the engine, which
/// consults it as its `AutoAdvance` provider when an item finishes.
#[derive(Debug)]
pub struct PlaylistCursor {
    playlist: Arc<Playlist>,
    current: Mutex<Option<usize>>,
}

impl PlaylistCursor {
    pub fn new(playlist: Arc<Playlist>) -> Self {
        Self {
            playlist,
            current: Mutex::new(None),
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    fn lock(&self) -> MutexGuard<'_, Option<usize>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn index(&self) -> Option<usize> {
        *self.lock()
    }

    pub fn set(&self, index: Option<usize>) {
        *self.lock() = index;
    }

    /// Entry index of `item`: the cursor when it points at an equal entry,
    /// otherwise the first entry equal to it
    pub fn locate(&self, item: &Item) -> Option<usize> {
        let current = self.index();
        match current {
            Some(index) if self.playlist.items.get(index).map(|c| c.as_ref() == item).unwrap_or(false) => {
                Some(index)
            }
            _ => self.playlist.index_of(item),
        }
    }

    /// Entry after `item` with its index; `None` at the end or when `item`
    /// is not listed
    pub fn peek_next(&self, item: &Item) -> Option<(usize, Arc<Item>)> {
        let index = self.locate(item)? + 1;
        self.playlist.items.get(index).map(|next| (index, next.clone()))
    }

    /// Entry before `item` with its index; `None` at the start or when
    /// `item` is not listed
    pub fn peek_previous(&self, item: &Item) -> Option<(usize, Arc<Item>)> {
        let index = self.locate(item)?.checked_sub(1)?;
        self.playlist.items.get(index).map(|previous| (index, previous.clone()))
    }
}

impl AutoAdvance for PlaylistCursor {
    fn next(&self, current: &Item) -> Option<Arc<Item>> {
        let (index, next) = self.peek_next(current)?;
        self.set(Some(index));
        debug!("Advancing to playlist entry {}", index + 1);
        Some(next)
    }
}

/// Recursively collect supported audio files under `dir`, sorted by path
fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, QueueError> {
    let not_found = || QueueError::FileNotFound {
        path: dir.to_string_lossy().to_string(),
    };

    let mut audio_files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|_| not_found())? {
        let path = entry.map_err(|_| not_found())?.path();
        if path.is_dir() {
            audio_files.append(&mut scan_directory(&path)?);
        } else if path.is_file() && is_supported_extension(&path) {
            audio_files.push(path);
        }
    }

    audio_files.sort();
    Ok(audio_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn sample() -> Playlist {
        Playlist::from_items(vec![
            Item::new("One", "/music/one.flac"),
            Item::new("Two", "/music/two.flac"),
            Item::new("Three", "/music/three.flac"),
        ])
    }

    #[test]
    fn test_lookup_by_index() {
        let playlist = sample();
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.get(1).unwrap().title, "Two");

        match playlist.get(7) {
            Err(QueueError::InvalidIndex { index }) => assert_eq!(index, 7),
            other => panic!("Expected InvalidIndex, got {:?}", other),
        }
        assert!(matches!(Playlist::new().get(0), Err(QueueError::EmptyQueue)));
    }

    #[test]
    fn test_navigation_does_not_wrap() {
        let cursor = PlaylistCursor::new(Arc::new(sample()));
        let first = cursor.playlist().get(0).unwrap();
        let last = cursor.playlist().get(2).unwrap();

        assert_eq!(cursor.peek_next(&first).unwrap().1.title, "Two");
        assert!(cursor.peek_next(&last).is_none());
        assert_eq!(cursor.peek_previous(&last).unwrap(), (1, cursor.playlist().get(1).unwrap()));
        assert!(cursor.peek_previous(&first).is_none());

        let stranger = Item::new("Elsewhere", "/other/elsewhere.flac");
        assert!(cursor.peek_next(&stranger).is_none());
        assert!(cursor.peek_previous(&stranger).is_none());
        assert_eq!(cursor.index(), None);
    }

    #[test]
    fn test_auto_advance_follows_order() {
        let cursor = PlaylistCursor::new(Arc::new(sample()));
        let second = cursor.playlist().get(1).unwrap();
        assert_eq!(AutoAdvance::next(&cursor, &second).unwrap().title, "Three");
        assert_eq!(cursor.index(), Some(2));

        let third = cursor.playlist().get(2).unwrap();
        assert!(AutoAdvance::next(&cursor, &third).is_none());
        assert_eq!(cursor.index(), Some(2));
    }

    #[test]
    fn test_repeated_entry_is_passed_once() {
        let cursor = PlaylistCursor::new(Arc::new(Playlist::from_items(vec![
            Item::new("a", "/music/a.flac"),
            Item::new("b", "/music/b.flac"),
            Item::new("a", "/music/a.flac"),
        ])));
        let a = cursor.playlist().get(0).unwrap();
        let b = cursor.playlist().get(1).unwrap();

        cursor.set(Some(0));
        assert_eq!(AutoAdvance::next(&cursor, &a).unwrap(), b);
        assert_eq!(AutoAdvance::next(&cursor, &b).unwrap(), a);
        assert_eq!(cursor.index(), Some(2));
        assert!(AutoAdvance::next(&cursor, &a).is_none());

        // From the last entry, previous is b rather than nothing
        assert_eq!(cursor.peek_previous(&a).unwrap().0, 1);

        // A cursor pointing elsewhere falls back to the first match
        cursor.set(Some(1));
        assert_eq!(cursor.locate(&a), Some(0));
    }

    #[test]
    fn test_from_paths_scans_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("disc2");
        fs::create_dir(&nested).unwrap();

        File::create(temp_dir.path().join("b.flac")).unwrap();
        File::create(temp_dir.path().join("a.wav")).unwrap();
        File::create(temp_dir.path().join("cover.jpg")).unwrap();
        File::create(nested.join("c.mp3")).unwrap();

        let playlist = Playlist::from_paths(&[temp_dir.path()]).unwrap();
        let titles: Vec<&str> = playlist.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_from_paths_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.flac");
        assert!(matches!(
            Playlist::from_paths(&[&missing]),
            Err(QueueError::FileNotFound { .. })
        ));

        let empty_dir = temp_dir.path().join("empty");
        fs::create_dir(&empty_dir).unwrap();
        assert!(matches!(
            Playlist::from_paths(&[&empty_dir]),
            Err(QueueError::NoPlayableFiles { .. })
        ));

        let notes = temp_dir.path().join("notes.txt");
        File::create(&notes).unwrap();
        assert!(matches!(Playlist::from_paths(&[&notes]), Err(QueueError::EmptyQueue)));
    }
}
