// cdda-rs
// Copyright (c) 2024 The cdda-rs Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `selection` module provides the machinery to select a reader backend for an input file.
//!
//! A [`Registry`] holds an ordered list of [`Descriptor`]s, a set of [`FileTest`]s, and a
//! [`Selector`]. To select a backend for a file, the selector evaluates the tests against each
//! descriptor. The [`DefaultSelector`] picks the first descriptor, in registration order, for
//! which every test passes. Registration order is therefore a priority list: a backend registered
//! earlier wins over any backend registered later that accepts the same file.

use std::cell::{Ref, RefCell};
use std::path::Path;

use hashbrown::HashMap;
use log::debug;

use crate::descriptor::{read_bytes, Descriptor};
use crate::errors::Result;
use crate::reader::FileReader;

/// The number of bytes read from the start of a file to select an audio reader.
///
/// This is the length of a canonical RIFF/WAVE header up to and including the data chunk id, and
/// suffices to discriminate all supported container signatures.
pub const AUDIO_TEST_LENGTH: usize = 44;

/// A predicate that decides whether a descriptor is a candidate for a file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileTest {
    /// Reads `length` bytes at `offset` and passes them to [`Descriptor::accepts_bytes`].
    Bytes { offset: u64, length: usize },
    /// Passes the filename to [`Descriptor::accepts_name`].
    Name,
}

impl FileTest {
    /// Evaluates the test for `desc` on the selected file.
    ///
    /// A test never passes for an empty filename. Errors are only returned if the file cannot be
    /// read.
    pub fn passes(&self, file: &FileUnderTest<'_>, desc: &dyn Descriptor) -> Result<bool> {
        if file.filename().is_empty() {
            return Ok(false);
        }

        match *self {
            FileTest::Bytes { offset, length } => {
                let bytes = file.bytes(offset, length)?;
                Ok(desc.accepts_bytes(&bytes, offset))
            }
            FileTest::Name => Ok(desc.accepts_name(file.filename())),
        }
    }
}

/// `FileUnderTest` is the file under selection.
///
/// Byte windows are read lazily and cached, so a window is read at most once per selection
/// regardless of the number of candidate descriptors.
pub struct FileUnderTest<'p> {
    path: &'p Path,
    filename: String,
    windows: RefCell<HashMap<(u64, usize), Vec<u8>>>,
}

impl<'p> FileUnderTest<'p> {
    pub fn new(path: &'p Path) -> Self {
        let filename =
            path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();

        FileUnderTest { path, filename, windows: RefCell::new(HashMap::new()) }
    }

    /// The path of the file.
    pub fn path(&self) -> &Path {
        self.path
    }

    /// The name of the file without any leading directories.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Gets `length` bytes of the file starting at `offset`.
    pub fn bytes(&self, offset: u64, length: usize) -> Result<Ref<'_, [u8]>> {
        let key = (offset, length);

        if !self.windows.borrow().contains_key(&key) {
            let bytes = read_bytes(self.path, offset, length)?;
            self.windows.borrow_mut().insert(key, bytes);
        }

        Ok(Ref::map(self.windows.borrow(), |windows| windows[&key].as_slice()))
    }
}

/// A `Selector` is the policy that chooses a descriptor for a file.
pub trait Selector: Send + Sync {
    /// Returns `true` if `desc` is a candidate for the file given `tests`.
    fn matches(&self, file: &FileUnderTest<'_>, tests: &[FileTest], desc: &dyn Descriptor)
        -> Result<bool>;

    /// Chooses one of `descriptors` for the file, or `None` if no descriptor is acceptable.
    fn select<'d>(
        &self,
        file: &FileUnderTest<'_>,
        tests: &[FileTest],
        descriptors: &'d [Box<dyn Descriptor>],
    ) -> Result<Option<&'d dyn Descriptor>>;
}

/// The default selection policy.
///
/// A descriptor matches if every test passes, an empty set of tests matches every descriptor. The
/// first matching descriptor in registration order is selected.
#[derive(Default)]
pub struct DefaultSelector;

impl Selector for DefaultSelector {
    fn matches(
        &self,
        file: &FileUnderTest<'_>,
        tests: &[FileTest],
        desc: &dyn Descriptor,
    ) -> Result<bool> {
        for test in tests {
            if !test.passes(file, desc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn select<'d>(
        &self,
        file: &FileUnderTest<'_>,
        tests: &[FileTest],
        descriptors: &'d [Box<dyn Descriptor>],
    ) -> Result<Option<&'d dyn Descriptor>> {
        for desc in descriptors {
            if self.matches(file, tests, desc.as_ref())? {
                debug!("selected {} for {}", desc.name(), file.filename());
                return Ok(Some(desc.as_ref()));
            }
            debug!("{} does not match {}", desc.name(), file.filename());
        }
        Ok(None)
    }
}

/// A `Registry` selects reader backends for files.
///
/// Registries are meant to be populated once at startup and then only be read. Selection is
/// deterministic: the same registry state always selects the same descriptor for the same file.
pub struct Registry {
    descriptors: Vec<Box<dyn Descriptor>>,
    tests: Vec<FileTest>,
    selector: Box<dyn Selector>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    /// Instantiate an empty `Registry` with the default selector and no tests.
    pub fn new() -> Self {
        Registry { descriptors: Vec::new(), tests: Vec::new(), selector: Box::new(DefaultSelector) }
    }

    /// Instantiate an empty `Registry` for audio readers. The registry tests the first
    /// [`AUDIO_TEST_LENGTH`] bytes of a file.
    pub fn audio() -> Self {
        let mut registry = Registry::new();
        registry.register_test(FileTest::Bytes { offset: 0, length: AUDIO_TEST_LENGTH });
        registry
    }

    /// Instantiate an empty `Registry` for table of contents parsers. The registry tests the
    /// filename only.
    pub fn toc() -> Self {
        let mut registry = Registry::new();
        registry.register_test(FileTest::Name);
        registry
    }

    /// Appends a descriptor. Returns `false` if an equal descriptor is already registered.
    pub fn add_descriptor(&mut self, desc: Box<dyn Descriptor>) -> bool {
        if self.descriptors.iter().any(|d| d.id() == desc.id()) {
            debug!("descriptor {} already registered", desc.id());
            return false;
        }
        self.descriptors.push(desc);
        true
    }

    /// Removes the descriptor equal to `desc`, returning it if it was registered.
    pub fn remove_descriptor(&mut self, desc: &dyn Descriptor) -> Option<Box<dyn Descriptor>> {
        let pos = self.descriptors.iter().position(|d| d.id() == desc.id())?;
        Some(self.descriptors.remove(pos))
    }

    /// Registers a test. Returns `false` if the test is already registered.
    pub fn register_test(&mut self, test: FileTest) -> bool {
        if self.tests.contains(&test) {
            return false;
        }
        self.tests.push(test);
        true
    }

    /// Unregisters a test. Returns `false` if the test was not registered.
    pub fn unregister_test(&mut self, test: &FileTest) -> bool {
        let len = self.tests.len();
        self.tests.retain(|t| t != test);
        self.tests.len() != len
    }

    /// Unregisters all tests.
    pub fn remove_all_tests(&mut self) {
        self.tests.clear();
    }

    /// Replaces the selection policy.
    pub fn set_selector(&mut self, selector: Box<dyn Selector>) {
        self.selector = selector;
    }

    /// Removes all descriptors and tests.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.tests.clear();
    }

    /// Gets the descriptor the selector chooses for the file at `path`.
    pub fn descriptor_for(&self, path: &Path) -> Result<Option<&dyn Descriptor>> {
        let file = FileUnderTest::new(path);
        self.selector.select(&file, &self.tests, &self.descriptors)
    }

    /// Instantiates the reader chosen for the file at `path`.
    ///
    /// Returns `Ok(None)` if no descriptor matches. Errors are only returned if the file could not
    /// be read by a test.
    pub fn for_file(&self, path: &Path) -> Result<Option<FileReader>> {
        Ok(self.descriptor_for(path)?.map(|desc| desc.create_reader()))
    }

    /// Gets an iterator over the registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &dyn Descriptor> {
        self.descriptors.iter().map(|d| d.as_ref())
    }

    /// The registered tests.
    pub fn tests(&self) -> &[FileTest] {
        &self.tests
    }

    /// The number of registered descriptors.
    pub fn size(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The number of registered tests.
    pub fn total_tests(&self) -> usize {
        self.tests.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::audio::AudioSize;
    use crate::descriptor::InputType;
    use crate::errors::{Error, Result};
    use crate::formats::{Codec, Format};
    use crate::reader::AudioReader;
    use crate::sink::SampleSink;

    struct NullReader;

    impl AudioReader for NullReader {
        fn acquire_size(&mut self, _: &Path) -> Result<AudioSize> {
            Ok(AudioSize::from_samples(0))
        }

        fn process_file(&mut self, _: &Path, _: &mut dyn SampleSink) -> Result<AudioSize> {
            Ok(AudioSize::from_samples(0))
        }
    }

    /// A descriptor accepting files whose name ends in `suffix` and whose first bytes are `magic`.
    struct MockDescriptor {
        id: &'static str,
        suffix: &'static str,
        magic: &'static [u8],
    }

    impl Descriptor for MockDescriptor {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            self.id
        }

        fn formats(&self) -> &'static [Format] {
            &[Format::Wav]
        }

        fn codecs(&self) -> &'static [Codec] {
            &[Codec::PcmS16Le]
        }

        fn input_type(&self) -> InputType {
            InputType::Audio
        }

        fn accepts_bytes(&self, bytes: &[u8], offset: u64) -> bool {
            offset == 0 && bytes.starts_with(self.magic)
        }

        fn accepts_name(&self, filename: &str) -> bool {
            filename.ends_with(self.suffix)
        }

        fn create_reader(&self) -> FileReader {
            FileReader::Audio(Box::new(NullReader))
        }
    }

    fn mock(id: &'static str, suffix: &'static str, magic: &'static [u8]) -> Box<dyn Descriptor> {
        Box::new(MockDescriptor { id, suffix, magic })
    }

    fn temp_file(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn verify_empty_test_set_matches_everything() {
        let mut registry = Registry::new();
        registry.add_descriptor(mock("a", ".a", b"A"));
        registry.add_descriptor(mock("b", ".b", b"B"));

        // With no tests, the file does not even need to exist.
        let path = Path::new("/nonexistent/file.x");

        let selector = DefaultSelector;
        let file = FileUnderTest::new(path);

        for desc in registry.descriptors() {
            assert!(selector.matches(&file, registry.tests(), desc).unwrap());
        }

        assert_eq!(registry.descriptor_for(path).unwrap().map(|d| d.id()), Some("a"));
    }

    #[test]
    fn verify_first_match_wins() {
        let path = temp_file("cdda-core-first-match.wav", b"RIFF0000WAVE");

        let mut registry = Registry::new();
        registry.register_test(FileTest::Bytes { offset: 0, length: 4 });
        registry.register_test(FileTest::Name);
        registry.add_descriptor(mock("a", ".wav", b"RIFF"));
        registry.add_descriptor(mock("b", ".wav", b"RIFF"));

        for _ in 0..4 {
            assert_eq!(registry.descriptor_for(&path).unwrap().map(|d| d.id()), Some("a"));
        }

        // Removing the first candidate promotes the second.
        let first = MockDescriptor { id: "a", suffix: "", magic: b"" };
        let removed = registry.remove_descriptor(&first);
        assert_eq!(removed.map(|d| d.id()), Some("a"));
        assert_eq!(registry.descriptor_for(&path).unwrap().map(|d| d.id()), Some("b"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn verify_tests_are_anded() {
        let path = temp_file("cdda-core-anded.flac", b"RIFF");

        let mut registry = Registry::new();
        registry.register_test(FileTest::Bytes { offset: 0, length: 4 });
        registry.register_test(FileTest::Name);
        // Accepts the bytes, but not the name.
        registry.add_descriptor(mock("riff", ".wav", b"RIFF"));
        // Accepts the name, but not the bytes.
        registry.add_descriptor(mock("flac", ".flac", b"fLaC"));

        assert!(registry.descriptor_for(&path).unwrap().is_none());
        assert!(registry.for_file(&path).unwrap().is_none());

        // Without the byte test, the name decides.
        assert!(registry.unregister_test(&FileTest::Bytes { offset: 0, length: 4 }));
        assert!(!registry.unregister_test(&FileTest::Bytes { offset: 0, length: 4 }));
        assert_eq!(registry.descriptor_for(&path).unwrap().map(|d| d.id()), Some("flac"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn verify_empty_filename_never_passes() {
        let file = FileUnderTest::new(Path::new(""));
        let desc = MockDescriptor { id: "any", suffix: "", magic: b"" };

        assert!(!FileTest::Name.passes(&file, &desc).unwrap());
        assert!(!FileTest::Bytes { offset: 0, length: 4 }.passes(&file, &desc).unwrap());
    }

    #[test]
    fn verify_unreadable_file_is_an_error() {
        let registry = {
            let mut registry = Registry::audio();
            registry.add_descriptor(mock("a", ".wav", b"RIFF"));
            registry
        };

        let result = registry.for_file(Path::new("/nonexistent/missing.wav"));
        assert!(matches!(result, Err(Error::ReadError { .. })));
    }

    #[test]
    fn verify_registry_bookkeeping() {
        let mut registry = Registry::audio();
        assert_eq!(registry.total_tests(), 1);
        assert!(!registry.register_test(FileTest::Bytes { offset: 0, length: AUDIO_TEST_LENGTH }));
        assert!(registry.register_test(FileTest::Name));
        assert_eq!(registry.total_tests(), 2);

        assert!(registry.is_empty());
        assert!(registry.add_descriptor(mock("a", ".a", b"A")));
        assert!(!registry.add_descriptor(mock("a", ".b", b"B")));
        assert_eq!(registry.size(), 1);

        assert!(registry
            .remove_descriptor(&MockDescriptor { id: "z", suffix: "", magic: b"" })
            .is_none());

        registry.remove_all_tests();
        assert_eq!(registry.total_tests(), 0);

        registry.register_test(FileTest::Name);
        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.total_tests(), 0);
    }

    #[test]
    fn verify_file_caches_windows() {
        let path = temp_file("cdda-core-file-cache.bin", b"fLaC\0\0\0\x22");
        let file = FileUnderTest::new(&path);

        assert_eq!(&*file.bytes(0, 4).unwrap(), b"fLaC");

        // The cached window survives the file being removed.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(&*file.bytes(0, 4).unwrap(), b"fLaC");
        assert!(file.bytes(4, 4).is_err());
    }
}
