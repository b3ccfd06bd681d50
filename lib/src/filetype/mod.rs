/*! File types and the registry used for recognizing them.

A [`FileType`] combines an optional pattern for the name of the file with an
optional pattern for its contents. How the verdicts of both patterns are
combined is determined by the type's recognition [`Policy`]. File types are
registered in a [`Registry`], which answers "what's the type of this file"
queries by trying every registered type in registration order.
*/

use std::fs::File;
use std::path::Path;

use indexmap::IndexMap;
#[cfg(feature = "logging")]
use log::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::bits::BitRange;
use crate::config::Config;
use crate::errors::{
    BuildError, ConsistencyError, ContentError, SelfCheckError,
};
use crate::mode::MatchMode;
use crate::patterns::{Domain, Kind, PatternId, PatternPool};

pub use format::{DataFormat, Operation};

pub(crate) mod builtin;
mod format;


/// How the name and contents verdicts of a file type are combined.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Only the name of the file is taken into account.
    Name,
    /// Only the contents of the file are taken into account.
    Contents,
    /// Both the name and the contents must match.
    #[default]
    NameAndContents,
    /// Either the name or the contents must match.
    NameOrContents,
}

/// A file type.
#[derive(Clone, Debug)]
pub struct FileType {
    name: String,
    doc: Option<String>,
    format: DataFormat,
    policy: Policy,
    name_pattern: Option<PatternId>,
    content_pattern: Option<PatternId>,
    ops: Vec<Operation>,
}

impl FileType {
    /// Returns a builder for a file type with the given name.
    pub fn builder<S: Into<String>>(name: S) -> FileTypeBuilder {
        FileTypeBuilder {
            name: name.into(),
            doc: None,
            format: DataFormat::Any,
            policy: Policy::default(),
            name_pattern: None,
            content_pattern: None,
            ops: Vec::new(),
        }
    }

    /// Name of the file type.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Documentation of the file type.
    #[inline]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Data format of the files of this type.
    #[inline]
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Recognition policy.
    #[inline]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Pattern for the name of the file.
    #[inline]
    pub fn name_pattern(&self) -> Option<PatternId> {
        self.name_pattern
    }

    /// Pattern for the contents of the file.
    #[inline]
    pub fn content_pattern(&self) -> Option<PatternId> {
        self.content_pattern
    }

    /// Operations supported by files of this type.
    #[inline]
    pub fn ops(&self) -> &[Operation] {
        self.ops.as_slice()
    }

    /// Returns `true` if the data format of this type is `format` or belongs
    /// to it.
    pub fn contains(&self, format: DataFormat) -> bool {
        format.contains(self.format)
    }

    /// Returns `true` for audio files.
    pub fn is_audio(&self) -> bool {
        self.format.is_audio()
    }

    /// Returns `true` for image files.
    pub fn is_image(&self) -> bool {
        self.format.is_image()
    }

    /// Returns `true` for video files.
    pub fn is_video(&self) -> bool {
        self.format.is_video()
    }

    fn patterns(&self) -> impl Iterator<Item = PatternId> {
        self.name_pattern.into_iter().chain(self.content_pattern)
    }
}

/// Builds a [`FileType`].
pub struct FileTypeBuilder {
    name: String,
    doc: Option<String>,
    format: DataFormat,
    policy: Policy,
    name_pattern: Option<PatternId>,
    content_pattern: Option<PatternId>,
    ops: Vec<Operation>,
}

impl FileTypeBuilder {
    /// Sets the documentation.
    pub fn doc<S: Into<String>>(mut self, doc: S) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Sets the data format.
    pub fn format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the recognition policy, [`Policy::NameAndContents`] by default.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the pattern for the name of the file.
    pub fn name_pattern(mut self, pattern: PatternId) -> Self {
        self.name_pattern = Some(pattern);
        self
    }

    /// Sets the pattern for the contents of the file.
    pub fn content_pattern(mut self, pattern: PatternId) -> Self {
        self.content_pattern = Some(pattern);
        self
    }

    /// Adds supported operations.
    pub fn ops<I>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = Operation>,
    {
        self.ops.extend(ops);
        self
    }

    /// Builds the file type.
    ///
    /// A file type that has only one of the patterns uses the policy that
    /// takes only that pattern into account, regardless of the policy set
    /// in the builder.
    pub fn build(self) -> Result<FileType, BuildError> {
        let policy = match (self.name_pattern, self.content_pattern) {
            (None, None) => {
                return Err(BuildError::MissingPatterns { name: self.name })
            }
            (Some(_), None) => Policy::Name,
            (None, Some(_)) => Policy::Contents,
            (Some(_), Some(_)) => self.policy,
        };
        Ok(FileType {
            name: self.name,
            doc: self.doc,
            format: self.format,
            policy,
            name_pattern: self.name_pattern,
            content_pattern: self.content_pattern,
            ops: self.ops,
        })
    }
}

/// Contents of the file being recognized.
#[derive(Clone, Copy, Debug, Default)]
pub enum Contents<'a> {
    /// Contents are not available.
    #[default]
    None,
    /// Contents held in memory.
    Bytes(&'a [u8]),
    /// Contents of an open file, with its size in bytes when known.
    File {
        /// The file.
        file: &'a File,
        /// Size of the file, obtained from the file metadata when `None`.
        size: Option<u64>,
    },
}

/// A file being recognized.
#[derive(Clone, Copy, Debug, Default)]
pub struct Subject<'a> {
    path: Option<&'a Path>,
    contents: Contents<'a>,
}

impl<'a> Subject<'a> {
    /// Creates a subject with neither path nor contents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path of the file.
    pub fn with_path<P: AsRef<Path> + ?Sized>(mut self, path: &'a P) -> Self {
        self.path = Some(path.as_ref());
        self
    }

    /// Sets the contents of the file.
    pub fn with_bytes(mut self, bytes: &'a [u8]) -> Self {
        self.contents = Contents::Bytes(bytes);
        self
    }

    /// Sets the open file that holds the contents.
    pub fn with_file(mut self, file: &'a File, size: Option<u64>) -> Self {
        self.contents = Contents::File { file, size };
        self
    }

    /// Path of the file.
    pub fn path(&self) -> Option<&'a Path> {
        self.path
    }

    /// Contents of the file.
    pub fn contents(&self) -> Contents<'a> {
        self.contents
    }

    /// The part of the path that patterns with the given domain apply to.
    fn name_bytes(&self, domain: Domain) -> Option<&'a [u8]> {
        let path = self.path?;
        let name = match domain {
            Domain::FilePath => path.as_os_str(),
            Domain::DirName => path.parent()?.file_name()?,
            _ => path.file_name()?,
        };
        Some(name.as_encoded_bytes())
    }
}

/// Identifies a file type within a [`Registry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileTypeId(u32);

/// A set of file types, together with the pool that owns their patterns.
pub struct Registry {
    pool: PatternPool,
    types: IndexMap<FileTypeId, FileType>,
    next_id: u32,
    config: Config,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty registry with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let mut pool = PatternPool::new();
        pool.set_growth_bits(config.self_check.growth_bits);
        Self { pool, types: IndexMap::new(), next_id: 0, config }
    }

    /// The pool that owns the patterns of the registered file types. New
    /// patterns are built in this pool before registering the file types
    /// that use them.
    #[inline]
    pub fn pool(&self) -> &PatternPool {
        &self.pool
    }

    /// Mutable access to the pattern pool.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut PatternPool {
        &mut self.pool
    }

    /// The registry's configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a file type.
    ///
    /// The name pattern is wrapped in a [`Domain::FileName`] context,
    /// unless it's already a context for a file path, file name or directory
    /// name. The content pattern is wrapped in a [`Domain::FileContents`]
    /// context. Both patterns are retained while the type is registered.
    pub fn register(
        &mut self,
        mut ty: FileType,
    ) -> Result<FileTypeId, BuildError> {
        // Nothing is retained unless both patterns exist.
        for pattern in ty.name_pattern.iter().chain(&ty.content_pattern) {
            self.pool.node(*pattern)?;
        }

        if let Some(pattern) = ty.name_pattern {
            let is_name = matches!(
                self.pool.node(pattern)?.kind,
                Kind::Ctx { domain, .. } if domain.is_name()
            );
            let pattern = if is_name {
                pattern
            } else {
                self.pool.ctx(Domain::FileName, pattern)?
            };
            self.pool.retain(pattern)?;
            ty.name_pattern = Some(pattern);
        }

        if let Some(pattern) = ty.content_pattern {
            let pattern = self.pool.ctx(Domain::FileContents, pattern)?;
            self.pool.retain(pattern)?;
            ty.content_pattern = Some(pattern);
        }

        let id = FileTypeId(self.next_id);
        self.next_id += 1;

        #[cfg(feature = "logging")]
        debug!("registered file type `{}` as {:?}", ty.name, id);

        self.types.insert(id, ty);

        Ok(id)
    }

    /// Removes a file type from the registry, releasing its patterns.
    /// Returns the removed type, if it was registered.
    pub fn unregister(
        &mut self,
        id: FileTypeId,
    ) -> Result<Option<FileType>, ConsistencyError> {
        let Some(ty) = self.types.shift_remove(&id) else {
            return Ok(None);
        };
        for pattern in ty.patterns() {
            self.pool.release(pattern)?;
        }
        Ok(Some(ty))
    }

    /// Returns a registered file type.
    pub fn get(&self, id: FileTypeId) -> Option<&FileType> {
        self.types.get(&id)
    }

    /// Returns the first registered file type with the given name.
    pub fn find(&self, name: &str) -> Option<FileTypeId> {
        self.types
            .iter()
            .find(|(_, ty)| ty.name == name)
            .map(|(id, _)| *id)
    }

    /// Iterator over the registered file types, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (FileTypeId, &FileType)> {
        self.types.iter().map(|(id, ty)| (*id, ty))
    }

    /// Number of registered file types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no file type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns `true` if `subject` is of the given type.
    ///
    /// The content pattern is matched within `region` of the contents. The
    /// policy of the file type can be replaced with `policy`. A side of the
    /// policy without pattern, or whose part of the subject is missing,
    /// never matches.
    pub fn matches(
        &self,
        id: FileTypeId,
        subject: &Subject,
        region: BitRange,
        policy: Option<Policy>,
    ) -> Result<bool, ContentError> {
        let Some(ty) = self.types.get(&id) else {
            return Ok(false);
        };

        let matched = match policy.unwrap_or(ty.policy) {
            Policy::Name => self.name_matches(ty, subject),
            Policy::Contents => self.contents_match(ty, subject, region)?,
            Policy::NameAndContents => {
                self.name_matches(ty, subject)
                    && self.contents_match(ty, subject, region)?
            }
            Policy::NameOrContents => {
                self.name_matches(ty, subject)
                    || self.contents_match(ty, subject, region)?
            }
        };

        Ok(matched)
    }

    /// Returns the first registered file type that `subject` is of.
    pub fn of(
        &self,
        subject: &Subject,
        region: BitRange,
        policy: Option<Policy>,
    ) -> Result<Option<FileTypeId>, ContentError> {
        for id in self.types.keys() {
            if self.matches(*id, subject, region, policy)? {
                return Ok(Some(*id));
            }
        }
        Ok(None)
    }

    /// Replaces the patterns of every file type with their canonical
    /// representatives. Returns the number of patterns that changed.
    pub fn canonicalize_all(&mut self) -> Result<usize, ConsistencyError> {
        let mut changed = 0;

        for ty in self.types.values_mut() {
            for slot in [&mut ty.name_pattern, &mut ty.content_pattern] {
                let Some(pattern) = *slot else {
                    continue;
                };
                let canonical = self.pool.canonicalize(pattern)?;
                if canonical != pattern {
                    self.pool.retain(canonical)?;
                    self.pool.release(pattern)?;
                    *slot = Some(canonical);
                    changed += 1;
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            "canonicalized {} patterns, {} patterns in the pool",
            changed,
            self.pool.len()
        );

        Ok(changed)
    }

    /// Checks that the patterns of every file type match their own random
    /// instances, as configured in [`Config::self_check`].
    pub fn self_check(&self) -> Result<(), SelfCheckError> {
        let mut rng = StdRng::seed_from_u64(self.config.self_check.seed);
        for ty in self.types.values() {
            for pattern in ty.patterns() {
                self.pool.self_check(
                    pattern,
                    self.config.self_check.instances,
                    &mut rng,
                )?;
            }
        }
        Ok(())
    }

    fn name_matches(&self, ty: &FileType, subject: &Subject) -> bool {
        let Some(pattern) = ty.name_pattern else {
            return false;
        };
        let domain = match self.pool.kind(pattern) {
            Some(Kind::Ctx { domain, .. }) => *domain,
            _ => Domain::FileName,
        };
        subject.name_bytes(domain).is_some_and(|name| {
            self.pool
                .match_in(pattern, name, BitRange::full(), MatchMode::Partial)
                .is_some()
        })
    }

    fn contents_match(
        &self,
        ty: &FileType,
        subject: &Subject,
        region: BitRange,
    ) -> Result<bool, ContentError> {
        let Some(pattern) = ty.content_pattern else {
            return Ok(false);
        };
        let mode = self.config.content.mode;
        let hit = match subject.contents {
            Contents::None => None,
            Contents::Bytes(bytes) => {
                self.pool.match_in(pattern, bytes, region, mode)
            }
            Contents::File { file, size } => self.pool.match_contents_of(
                pattern,
                file,
                size,
                region,
                mode,
                &self.config.content,
            )?,
        };
        Ok(hit.is_some())
    }
}
