//! Catalog of well-known file types.

use crate::errors::BuildError;
use crate::filetype::{DataFormat, FileType, Operation, Policy, Registry};
use crate::patterns::{Anchor, PatternId, PatternPool};

/// Creates a pattern that matches the given bytes at the beginning of the
/// contents, followed by the patterns in `rest`.
fn magic(
    pool: &mut PatternPool,
    bytes: &[u8],
    rest: &[PatternId],
) -> Result<PatternId, BuildError> {
    let bob = pool.anchor(Anchor::Bob);
    let lit = pool.lit(bytes)?;
    let mut subs = vec![bob, lit];
    subs.extend_from_slice(rest);
    pool.seq(&subs)
}

/// Creates a pattern that matches file names with any of the given
/// extensions.
fn extensions(
    pool: &mut PatternPool,
    exts: &[&str],
) -> Result<PatternId, BuildError> {
    let mut alts = Vec::with_capacity(exts.len());
    for ext in exts {
        alts.push(pool.suffix(format!(".{}", ext).as_bytes())?);
    }
    pool.alt(&alts)
}

/// Creates a pattern that matches any of the given file names, regardless
/// of case.
fn names_nocase(
    pool: &mut PatternPool,
    names: &[&str],
) -> Result<PatternId, BuildError> {
    let mut alts = Vec::with_capacity(names.len());
    for name in names {
        let bob = pool.anchor(Anchor::Bob);
        let lit = pool.lit_nocase(name.as_bytes())?;
        let eob = pool.anchor(Anchor::Eob);
        alts.push(pool.seq(&[bob, lit, eob])?);
    }
    pool.alt(&alts)
}

/// Creates a pattern that matches any of the given interpreter lines at the
/// beginning of the contents.
fn shebangs(
    pool: &mut PatternPool,
    lines: &[&str],
) -> Result<PatternId, BuildError> {
    let mut alts = Vec::with_capacity(lines.len());
    for line in lines {
        alts.push(magic(pool, format!("#!{}", line).as_bytes(), &[])?);
    }
    pool.alt(&alts)
}

/// Registers a file type whose contents start with a magic number.
fn register_magic(
    registry: &mut Registry,
    name: &str,
    doc: &str,
    format: DataFormat,
    pattern: PatternId,
    ops: &[Operation],
) -> Result<(), BuildError> {
    let pool = registry.pool_mut();
    pool.set_name(pattern, name)?;
    pool.set_format(pattern, format)?;
    registry.register(
        FileType::builder(name)
            .doc(doc)
            .format(format)
            .content_pattern(pattern)
            .ops(ops.iter().copied())
            .build()?,
    )?;
    Ok(())
}

/// Registers the builtin file types in `registry`.
///
/// Types recognized by their contents come first, so they take precedence
/// over the ones recognized by name.
pub fn register_all(registry: &mut Registry) -> Result<(), BuildError> {
    use DataFormat::*;
    use Operation::*;

    let pool = registry.pool_mut();

    let gzip = magic(pool, b"\x1f\x8b", &[])?;
    let compress = magic(pool, b"\x1f\x9d", &[])?;
    let level = pool.range(b'1', b'9')?;
    let bzip2 = magic(pool, b"BZh", &[level])?;
    let xz = magic(pool, b"\xfd7zXZ\x00", &[])?;
    let lzma = magic(pool, b"\x5d\x00\x00", &[])?;
    let zip = magic(pool, b"PK\x03\x04", &[])?;

    // The ustar magic of tar headers is at offset 257.
    let bob = pool.anchor(Anchor::Bob);
    let header = pool.any(257 * 8)?;
    let ustar = pool.lit(b"ustar")?;
    let posix = pool.lit(b"\x0000")?;
    let gnu = pool.lit(b"  \x00")?;
    let version = pool.alt(&[posix, gnu])?;
    let tar = pool.seq(&[bob, header, ustar, version])?;

    let png = magic(pool, b"\x89PNG\r\n\x1a\n", &[])?;
    let jpeg = magic(pool, b"\xff\xd8\xff", &[])?;
    let v87 = pool.lit(b"7a")?;
    let v89 = pool.lit(b"9a")?;
    let gif_version = pool.alt(&[v87, v89])?;
    let gif = magic(pool, b"GIF8", &[gif_version])?;

    // ELF magic, followed by the class (32 or 64 bits) and the data
    // encoding (little or big endian).
    let class = pool.range(1, 2)?;
    let encoding = pool.range(1, 2)?;
    let elf = magic(pool, b"\x7fELF", &[class, encoding])?;

    let magics: [(&str, &str, DataFormat, PatternId, &[Operation]); 11] = [
        ("gzip", "GNU zip compressed data", Gzip, gzip, &[Decompress]),
        ("compress", "Unix compress data", Compress, compress, &[Decompress]),
        ("bzip2", "bzip2 compressed data", Bzip2, bzip2, &[Decompress]),
        ("xz", "XZ compressed data", Xz, xz, &[Decompress]),
        ("lzma", "LZMA compressed data", Lzma, lzma, &[Decompress]),
        ("zip", "Zip archive", Zip, zip, &[Decompress, Extract]),
        ("tar", "POSIX tar archive", Tar, tar, &[Extract]),
        ("png", "Portable Network Graphics", Png, png, &[Show, Convert]),
        ("jpeg", "JPEG image", Jpeg, jpeg, &[Show, Convert]),
        ("gif", "Graphics Interchange Format", Gif, gif, &[Show, Convert]),
        ("elf", "Executable and Linkable Format", Elf, elf, &[Execute]),
    ];

    for (name, doc, format, pattern, ops) in magics {
        register_magic(registry, name, doc, format, pattern, ops)?;
    }

    let pool = registry.pool_mut();

    let c_names = extensions(pool, &["c", "h"])?;
    pool.set_name(c_names, "C file name")?;
    let cxx_names =
        extensions(pool, &["cc", "cpp", "cxx", "c++", "hh", "hpp", "hxx"])?;
    pool.set_name(cxx_names, "C++ file name")?;

    let python_names = extensions(pool, &["py"])?;
    let python_lines = shebangs(
        pool,
        &["/usr/bin/python", "/usr/bin/env python", "/usr/local/bin/python"],
    )?;

    let shell_names = extensions(pool, &["sh", "bash"])?;
    let shell_lines = shebangs(
        pool,
        &["/bin/sh", "/bin/bash", "/usr/bin/env sh", "/usr/bin/env bash"],
    )?;

    let make_names = names_nocase(pool, &["makefile", "gnumakefile"])?;
    pool.set_name(make_names, "Makefile name")?;

    registry.register(
        FileType::builder("c")
            .doc("C source code")
            .format(C)
            .name_pattern(c_names)
            .ops([Edit, Compile])
            .build()?,
    )?;

    registry.register(
        FileType::builder("c++")
            .doc("C++ source code")
            .format(Cxx)
            .name_pattern(cxx_names)
            .ops([Edit, Compile])
            .build()?,
    )?;

    registry.register(
        FileType::builder("python")
            .doc("Python script")
            .format(Python)
            .policy(Policy::NameOrContents)
            .name_pattern(python_names)
            .content_pattern(python_lines)
            .ops([Edit, Execute])
            .build()?,
    )?;

    registry.register(
        FileType::builder("shell")
            .doc("Shell script")
            .format(Shell)
            .policy(Policy::NameOrContents)
            .name_pattern(shell_names)
            .content_pattern(shell_lines)
            .ops([Edit, Execute])
            .build()?,
    )?;

    registry.register(
        FileType::builder("makefile")
            .doc("Makefile")
            .format(Makefile)
            .name_pattern(make_names)
            .ops([Edit, Execute])
            .build()?,
    )?;

    Ok(())
}

impl Registry {
    /// Creates a registry with the builtin file types.
    pub fn with_builtin_types() -> Result<Self, BuildError> {
        let mut registry = Registry::new();
        register_all(&mut registry)?;
        Ok(registry)
    }
}
